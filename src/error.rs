use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{entity} record is missing required field '{field}'")]
    MissingField { entity: &'static str, field: String },

    #[error("{entity} record is not a JSON object: {value}")]
    NotAnObject { entity: &'static str, value: String },

    #[error("Field '{field}' does not hold a {{\"$date\": <epoch>}} value: {value}")]
    BadTimestamp { field: String, value: String },

    #[error("Field '{field}' is not convertible to a float: {value}")]
    BadNumber { field: String, value: String },

    #[error("Value is not storable as a column: {value}")]
    UnstorableValue { value: String },

    #[error("Failed to insert into {table}: {source}\nOffending record: {record}")]
    InsertFailed {
        table: &'static str,
        record: String,
        source: Box<EtlError>,
    },
}

pub type Result<T> = std::result::Result<T, EtlError>;
