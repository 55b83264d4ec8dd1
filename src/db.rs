use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;
use crate::schema::Entity;

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let mut stmt =
        conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
    Ok(stmt.exists([table])?)
}

/// Create the entity's backing table if it is absent. Returns whether the
/// table already existed and holds at least one row, which the ingestion
/// coordinator uses to skip re-ingestion of that entity type.
pub fn ensure_table(conn: &Connection, entity: Entity) -> Result<bool> {
    if !table_exists(conn, entity.table())? {
        conn.execute_batch(&entity.create_table_sql())?;
        return Ok(false);
    }
    let count: i64 = conn.query_row(
        &format!("SELECT count(*) FROM {}", entity.table()),
        [],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
