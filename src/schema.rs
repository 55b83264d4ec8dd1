//! Static declaration of the four target entity schemas. The CREATE TABLE
//! statements and the per-type coercion lists in the parser are both derived
//! from these tables, so there is a single source of truth for field names.

/// Semantic type of a schema field. `Embedded` fields (the receipt item
/// list) have no backing column and are flattened during ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Embedded,
}

impl FieldType {
    fn sql_type(&self) -> &'static str {
        match self {
            FieldType::Text => "TEXT",
            FieldType::Integer => "INTEGER",
            FieldType::Float => "REAL",
            FieldType::Boolean => "INTEGER",
            FieldType::Timestamp => "TEXT",
            FieldType::Embedded => unreachable!("embedded fields have no column"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Users,
    Brands,
    Receipts,
    Transactions,
}

/// Receipts embed their line items under this key (post-normalization).
pub const ITEM_LIST_FIELD: &str = "rewards_receipt_item_list";

const USER_FIELDS: &[(&str, FieldType)] = &[
    ("id", FieldType::Text),
    ("state", FieldType::Text),
    ("created_date", FieldType::Timestamp),
    ("last_login", FieldType::Timestamp),
    ("role", FieldType::Text),
    ("active", FieldType::Boolean),
    ("sign_up_source", FieldType::Text),
];

const BRAND_FIELDS: &[(&str, FieldType)] = &[
    ("id", FieldType::Text),
    ("brand_code", FieldType::Text),
    ("barcode", FieldType::Text),
    ("name", FieldType::Text),
    ("category", FieldType::Text),
    ("category_code", FieldType::Text),
    ("cpg_id", FieldType::Text),
    ("cpg_ref", FieldType::Text),
    ("top_brand", FieldType::Boolean),
];

const RECEIPT_FIELDS: &[(&str, FieldType)] = &[
    ("id", FieldType::Text),
    ("bonus_points_earned", FieldType::Float),
    ("bonus_points_earned_reason", FieldType::Text),
    ("create_date", FieldType::Timestamp),
    ("date_scanned", FieldType::Timestamp),
    ("finished_date", FieldType::Timestamp),
    ("modify_date", FieldType::Timestamp),
    ("points_awarded_date", FieldType::Timestamp),
    ("points_earned", FieldType::Float),
    ("purchase_date", FieldType::Timestamp),
    ("purchased_item_count", FieldType::Integer),
    ("rewards_receipt_status", FieldType::Text),
    ("total_spent", FieldType::Float),
    ("user_id", FieldType::Text),
    (ITEM_LIST_FIELD, FieldType::Embedded),
];

const TRANSACTION_FIELDS: &[(&str, FieldType)] = &[
    ("id", FieldType::Integer),
    ("receipt_id", FieldType::Text),
    ("barcode", FieldType::Text),
    ("brand_code", FieldType::Text),
    ("description", FieldType::Text),
    ("item_price", FieldType::Float),
    ("target_price", FieldType::Float),
    ("price_after_coupon", FieldType::Float),
    ("discounted_item_price", FieldType::Float),
    ("final_price", FieldType::Float),
    ("quantity_purchased", FieldType::Integer),
    ("needs_fetch_review", FieldType::Boolean),
    ("partner_item_id", FieldType::Text),
    ("prevent_target_gap_points", FieldType::Boolean),
    ("user_flagged_barcode", FieldType::Text),
    ("user_flagged_new_item", FieldType::Boolean),
    ("user_flagged_price", FieldType::Float),
    ("user_flagged_quantity", FieldType::Integer),
    ("needs_fetch_review_reason", FieldType::Text),
    ("points_earned", FieldType::Float),
    ("points_not_awarded_reason", FieldType::Text),
    ("points_payer_id", FieldType::Text),
    ("rewards_group", FieldType::Text),
    ("rewards_product_partner_id", FieldType::Text),
    ("user_flagged_description", FieldType::Text),
    ("metabrite_campaign_id", FieldType::Text),
    ("original_final_price", FieldType::Float),
    ("original_meta_brite_barcode", FieldType::Text),
    ("original_meta_brite_description", FieldType::Text),
    ("original_meta_brite_quantity_purchased", FieldType::Integer),
    ("original_meta_brite_item_price", FieldType::Float),
    ("original_receipt_item_text", FieldType::Text),
    ("item_number", FieldType::Text),
    ("competitive_product", FieldType::Boolean),
    ("competitor_rewards_group", FieldType::Text),
    ("deleted", FieldType::Boolean),
];

// Column defaults, kept explicit rather than scattered through parse code.
fn column_default(entity: Entity, field: &str) -> Option<&'static str> {
    match (entity, field) {
        (Entity::Users, "role") => Some("'CONSUMER'"),
        (Entity::Receipts, "bonus_points_earned") => Some("0"),
        (Entity::Transactions, "deleted") => Some("0"),
        _ => None,
    }
}

impl Entity {
    /// Ingestion order: referenced-by entities before referencing ones.
    pub const ALL: [Entity; 4] = [
        Entity::Users,
        Entity::Brands,
        Entity::Receipts,
        Entity::Transactions,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            Entity::Users => "users",
            Entity::Brands => "brands",
            Entity::Receipts => "receipts",
            Entity::Transactions => "transactions",
        }
    }

    /// Name of the newline-delimited JSON export file for this entity.
    /// Transactions have no export of their own; they arrive embedded in
    /// receipts.
    pub fn source_file(&self) -> String {
        format!("{}.json", self.table())
    }

    pub fn fields(&self) -> &'static [(&'static str, FieldType)] {
        match self {
            Entity::Users => USER_FIELDS,
            Entity::Brands => BRAND_FIELDS,
            Entity::Receipts => RECEIPT_FIELDS,
            Entity::Transactions => TRANSACTION_FIELDS,
        }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields().iter().any(|(f, _)| *f == name)
    }

    pub fn fields_of_type(&self, wanted: FieldType) -> Vec<&'static str> {
        self.fields()
            .iter()
            .filter(|(_, ty)| *ty == wanted)
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn create_table_sql(&self) -> String {
        let mut columns = Vec::new();
        for &(name, ty) in self.fields() {
            if ty == FieldType::Embedded {
                continue;
            }
            if name == "id" {
                columns.push(match self {
                    Entity::Transactions => "id INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
                    _ => "id TEXT PRIMARY KEY".to_string(),
                });
                continue;
            }
            let mut column = format!("{name} {}", ty.sql_type());
            if *self == Entity::Transactions && name == "receipt_id" {
                column.push_str(" NOT NULL");
            }
            if let Some(default) = column_default(*self, name) {
                column.push_str(&format!(" DEFAULT {default}"));
            }
            columns.push(column);
        }
        // Hard reference: every transaction belongs to exactly one receipt.
        // user_id and brand_code stay soft; the source data does not
        // guarantee referential completeness for them.
        if *self == Entity::Transactions {
            columns.push("FOREIGN KEY (receipt_id) REFERENCES receipts(id)".to_string());
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.table(),
            columns.join(",\n    ")
        )
    }
}
