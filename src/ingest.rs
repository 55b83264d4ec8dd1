//! Ingestion coordinator: streams each entity's newline-delimited JSON
//! export, parses every line, and commits each record in its own scoped
//! transaction. Line items ride along inside receipts and land in the
//! transactions table.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rusqlite::Connection;
use serde_json::Value;

use crate::db::ensure_table;
use crate::error::{EtlError, Result};
use crate::normalize::Record;
use crate::parser;
use crate::schema::{Entity, ITEM_LIST_FIELD};

pub struct IngestSummary {
    pub entity: Entity,
    pub inserted: usize,
    pub skipped: usize,
    /// Table already held rows, so the whole entity type was left alone.
    pub already_populated: bool,
}

/// Run the full batch over a source directory. Each of the four entity
/// types is skipped wholesale when its table is already populated; the
/// transactions table is only ever filled through receipts.
pub fn process_source_directory(conn: &mut Connection, dir: &Path) -> Result<Vec<IngestSummary>> {
    // All four tables must exist up front: receipts fan out into
    // transactions mid-file, and the FK target has to be there.
    let mut populated = Vec::with_capacity(Entity::ALL.len());
    for entity in Entity::ALL {
        populated.push(ensure_table(conn, entity)?);
    }

    let mut summaries = Vec::new();
    for (entity, already_populated) in Entity::ALL.into_iter().zip(populated) {
        if already_populated {
            summaries.push(IngestSummary {
                entity,
                inserted: 0,
                skipped: 0,
                already_populated: true,
            });
            continue;
        }
        if entity == Entity::Transactions {
            // Filled while receipts were streaming; report what landed.
            let inserted: i64 =
                conn.query_row("SELECT count(*) FROM transactions", [], |row| row.get(0))?;
            summaries.push(IngestSummary {
                entity,
                inserted: inserted as usize,
                skipped: 0,
                already_populated: false,
            });
            continue;
        }

        let path = dir.join(entity.source_file());
        let file = File::open(&path)?;
        let mut inserted = 0usize;
        let mut skipped = 0usize;
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let raw: Record = serde_json::from_str(&line)?;
            if insert_record(conn, entity, raw)? {
                inserted += 1;
            } else {
                skipped += 1;
            }
        }
        summaries.push(IngestSummary {
            entity,
            inserted,
            skipped,
            already_populated: false,
        });
    }
    Ok(summaries)
}

/// Parse and persist one raw record. Returns false for a duplicate user
/// (skipped, not an error). Any other failure rolls the record back and
/// aborts the run, carrying the raw record body for diagnosis.
pub fn insert_record(conn: &mut Connection, entity: Entity, raw: Record) -> Result<bool> {
    let raw_body = Value::Object(raw.clone());
    let mut parsed = parser::parse(raw, entity)?;

    if entity == Entity::Users {
        let id = parsed.get("id").and_then(Value::as_str).unwrap_or_default();
        let mut stmt = conn.prepare_cached("SELECT 1 FROM users WHERE id = ?1")?;
        if stmt.exists([id])? {
            return Ok(false);
        }
    }

    // The embedded item list never hits the parent's column list.
    let items = parsed.remove(ITEM_LIST_FIELD);

    insert_row(conn, entity, &parsed).map_err(|source| EtlError::InsertFailed {
        table: entity.table(),
        record: serde_json::to_string_pretty(&raw_body).unwrap_or_else(|_| raw_body.to_string()),
        source: Box::new(source),
    })?;

    if let Some(Value::Array(items)) = items {
        for item in items {
            if let Value::Object(item) = item {
                insert_record(conn, Entity::Transactions, item)?;
            }
        }
    }

    Ok(true)
}

/// One record, one transaction: rolled back on any failure before the
/// error propagates.
fn insert_row(conn: &mut Connection, entity: Entity, record: &Record) -> Result<()> {
    let columns: Vec<&str> = record.keys().map(String::as_str).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        entity.table(),
        columns.join(", "),
        placeholders.join(", ")
    );
    let params: Vec<rusqlite::types::Value> = record
        .values()
        .map(to_sql_value)
        .collect::<Result<Vec<_>>>()?;

    let tx = conn.transaction()?;
    tx.execute(&sql, rusqlite::params_from_iter(params))?;
    tx.commit()?;
    Ok(())
}

fn to_sql_value(value: &Value) -> Result<rusqlite::types::Value> {
    use rusqlite::types::Value as Sql;
    Ok(match value {
        Value::Null => Sql::Null,
        Value::Bool(b) => Sql::Integer(*b as i64),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Sql::Integer(i),
            None => Sql::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => Sql::Text(s.clone()),
        other => {
            return Err(EtlError::UnstorableValue {
                value: other.to_string(),
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::get_connection;
    use serde_json::json;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        for entity in Entity::ALL {
            ensure_table(&conn, entity).unwrap();
        }
        (dir, conn)
    }

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    fn sample_user(oid: &str) -> Record {
        record(json!({
            "_id": {"$oid": oid},
            "state": "WI",
            "createdDate": {"$date": 1609687444800i64},
            "active": true,
            "role": "consumer"
        }))
    }

    fn sample_receipt(oid: &str) -> Record {
        record(json!({
            "_id": {"$oid": oid},
            "dateScanned": {"$date": 1609687531000i64},
            "purchasedItemCount": 2,
            "rewardsReceiptStatus": "FINISHED",
            "totalSpent": "26.00",
            "userId": "u1",
            "rewardsReceiptItemList": [
                {"barcode": "4011", "itemPrice": "16.00", "quantityPurchased": 1},
                {"barcode": "4012", "brandCode": "DORITOS", "itemPrice": "10.00", "quantityPurchased": 1}
            ]
        }))
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_insert_user_then_duplicate_is_noop() {
        let (_dir, mut conn) = test_db();
        assert!(insert_record(&mut conn, Entity::Users, sample_user("u1")).unwrap());
        assert_eq!(count(&conn, "users"), 1);
        assert!(!insert_record(&mut conn, Entity::Users, sample_user("u1")).unwrap());
        assert_eq!(count(&conn, "users"), 1);
    }

    #[test]
    fn test_insert_receipt_creates_stamped_transactions() {
        let (_dir, mut conn) = test_db();
        assert!(insert_record(&mut conn, Entity::Receipts, sample_receipt("r1")).unwrap());
        assert_eq!(count(&conn, "receipts"), 1);
        assert_eq!(count(&conn, "transactions"), 2);
        let stamped: i64 = conn
            .query_row(
                "SELECT count(*) FROM transactions WHERE receipt_id = 'r1'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(stamped, 2);
    }

    #[test]
    fn test_insert_receipt_stores_coerced_values() {
        let (_dir, mut conn) = test_db();
        insert_record(&mut conn, Entity::Receipts, sample_receipt("r1")).unwrap();
        let (spent, scanned): (f64, String) = conn
            .query_row(
                "SELECT total_spent, date_scanned FROM receipts WHERE id = 'r1'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(spent, 26.0);
        assert_eq!(scanned, "2021-01-03 15:25:31");
    }

    #[test]
    fn test_insert_malformed_numeric_is_fatal() {
        let (_dir, mut conn) = test_db();
        let mut raw = sample_receipt("r1");
        raw.insert("totalSpent".to_string(), json!("not a price"));
        let err = insert_record(&mut conn, Entity::Receipts, raw).unwrap_err();
        assert!(err.to_string().contains("total_spent"), "got: {err}");
        assert_eq!(count(&conn, "receipts"), 0);
    }

    fn write_export(dir: &Path, name: &str, lines: &[Value]) {
        let body: Vec<String> = lines.iter().map(|v| v.to_string()).collect();
        std::fs::write(dir.join(name), body.join("\n")).unwrap();
    }

    fn seed_source_dir(dir: &Path) {
        write_export(dir, "users.json", &[
            Value::Object(sample_user("u1")),
            Value::Object(sample_user("u1")), // duplicate, skipped
            Value::Object(sample_user("u2")),
        ]);
        write_export(dir, "brands.json", &[json!({
            "_id": {"$oid": "b1"},
            "name": "Doritos",
            "brandCode": "DORITOS",
            "cpg": {"$id": {"$oid": "c1"}, "$ref": "Cogs"},
            "topBrand": true
        })]);
        write_export(dir, "receipts.json", &[Value::Object(sample_receipt("r1"))]);
    }

    #[test]
    fn test_process_source_directory_end_to_end() {
        let (dir, mut conn) = test_db();
        seed_source_dir(dir.path());

        let summaries = process_source_directory(&mut conn, dir.path()).unwrap();
        let by_table: Vec<(&str, usize, usize)> = summaries
            .iter()
            .map(|s| (s.entity.table(), s.inserted, s.skipped))
            .collect();
        assert_eq!(
            by_table,
            vec![
                ("users", 2, 1),
                ("brands", 1, 0),
                ("receipts", 1, 0),
                ("transactions", 2, 0),
            ]
        );
    }

    #[test]
    fn test_rerun_is_a_complete_noop() {
        let (dir, mut conn) = test_db();
        seed_source_dir(dir.path());
        process_source_directory(&mut conn, dir.path()).unwrap();

        let second = process_source_directory(&mut conn, dir.path()).unwrap();
        assert!(second.iter().all(|s| s.already_populated && s.inserted == 0));
        assert_eq!(count(&conn, "users"), 2);
        assert_eq!(count(&conn, "transactions"), 2);
    }

    #[test]
    fn test_missing_export_file_is_an_error() {
        let (dir, mut conn) = test_db();
        // No users.json at all.
        assert!(process_source_directory(&mut conn, dir.path()).is_err());
    }
}
