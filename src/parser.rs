//! Maps one raw export document into a flat record matching the target
//! schema: keys normalized, `$oid`/`$date` wrappers unwrapped, loosely typed
//! numerics coerced, embedded line items flattened.

use serde_json::Value;

use crate::error::{EtlError, Result};
use crate::normalize::{coerce_dates, coerce_floats, normalize_key, Record};
use crate::schema::{Entity, FieldType, ITEM_LIST_FIELD};

/// Parse one raw document for the given entity. The result's keys are
/// always a subset of the entity's schema field names.
pub fn parse(raw: Record, entity: Entity) -> Result<Record> {
    match entity {
        Entity::Users => parse_users(raw),
        Entity::Brands => parse_brands(raw),
        Entity::Receipts => parse_receipts(raw),
        Entity::Transactions => parse_transactions(raw),
    }
}

fn normalize_keys(raw: Record) -> Record {
    raw.into_iter().map(|(k, v)| (normalize_key(&k), v)).collect()
}

/// Unwrap the `{"$oid": "..."}` identifier into a plain string primary key.
/// A record without the wrapper is an error, never a silent default.
fn extract_id(record: &mut Record, entity: Entity) -> Result<String> {
    let id = record.remove("id").ok_or_else(|| EtlError::MissingField {
        entity: entity.table(),
        field: "id".to_string(),
    })?;
    let oid = id
        .get("$oid")
        .and_then(Value::as_str)
        .ok_or_else(|| EtlError::MissingField {
            entity: entity.table(),
            field: "id.$oid".to_string(),
        })?
        .to_string();
    record.insert("id".to_string(), Value::String(oid.clone()));
    Ok(oid)
}

/// Timestamp and float coercion driven by the schema's type declarations.
fn apply_coercions(record: &mut Record, entity: Entity) -> Result<()> {
    coerce_dates(record, &entity.fields_of_type(FieldType::Timestamp), true)?;
    coerce_floats(record, &entity.fields_of_type(FieldType::Float))?;
    Ok(())
}

fn retain_schema_fields(record: &mut Record, entity: Entity) {
    record.retain(|key, _| entity.has_field(key));
}

fn parse_users(raw: Record) -> Result<Record> {
    let mut record = normalize_keys(raw);
    extract_id(&mut record, Entity::Users)?;
    apply_coercions(&mut record, Entity::Users)?;
    retain_schema_fields(&mut record, Entity::Users);
    Ok(record)
}

fn parse_brands(raw: Record) -> Result<Record> {
    let mut record = normalize_keys(raw);
    extract_id(&mut record, Entity::Brands)?;

    // The CPG reference nests a second $oid plus the source collection name.
    if let Some(cpg) = record.remove("cpg") {
        let cpg_id = cpg
            .get("$id")
            .and_then(|id| id.get("$oid"))
            .and_then(Value::as_str)
            .ok_or_else(|| EtlError::MissingField {
                entity: Entity::Brands.table(),
                field: "cpg.$id.$oid".to_string(),
            })?;
        let cpg_ref = cpg
            .get("$ref")
            .and_then(Value::as_str)
            .ok_or_else(|| EtlError::MissingField {
                entity: Entity::Brands.table(),
                field: "cpg.$ref".to_string(),
            })?;
        record.insert("cpg_id".to_string(), Value::String(cpg_id.to_string()));
        record.insert("cpg_ref".to_string(), Value::String(cpg_ref.to_string()));
    }

    apply_coercions(&mut record, Entity::Brands)?;
    retain_schema_fields(&mut record, Entity::Brands);
    Ok(record)
}

fn parse_receipts(raw: Record) -> Result<Record> {
    let mut record = normalize_keys(raw);
    let receipt_id = extract_id(&mut record, Entity::Receipts)?;
    apply_coercions(&mut record, Entity::Receipts)?;

    // Stamp each embedded line item with the owning receipt's id, then parse
    // it as a transaction. Line items carry no $oid wrapper of their own.
    if let Some(items) = record.remove(ITEM_LIST_FIELD) {
        let items = match items {
            Value::Array(items) => items,
            other => {
                return Err(EtlError::NotAnObject {
                    entity: Entity::Transactions.table(),
                    value: other.to_string(),
                })
            }
        };
        let mut parsed_items = Vec::with_capacity(items.len());
        for item in items {
            let mut item = match item {
                Value::Object(map) => map,
                other => {
                    return Err(EtlError::NotAnObject {
                        entity: Entity::Transactions.table(),
                        value: other.to_string(),
                    })
                }
            };
            item.insert("receipt_id".to_string(), Value::String(receipt_id.clone()));
            parsed_items.push(Value::Object(parse_transactions(item)?));
        }
        record.insert(ITEM_LIST_FIELD.to_string(), Value::Array(parsed_items));
    }

    retain_schema_fields(&mut record, Entity::Receipts);
    Ok(record)
}

fn parse_transactions(raw: Record) -> Result<Record> {
    let mut record = normalize_keys(raw);
    apply_coercions(&mut record, Entity::Transactions)?;
    retain_schema_fields(&mut record, Entity::Transactions);
    Ok(record)
}
