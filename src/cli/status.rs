use crate::db::{get_connection, table_exists};
use crate::error::Result;
use crate::schema::Entity;
use crate::settings::Settings;

pub fn run() -> Result<()> {
    let settings = Settings::from_env(None);
    println!("Data dir:   {}", settings.data_dir.display());
    println!("Database:   {}", settings.db_path.display());

    if !settings.db_path.exists() {
        println!();
        println!("Database not found. Run `rewards-etl ingest` to create it.");
        return Ok(());
    }

    let size = std::fs::metadata(&settings.db_path)?.len();
    println!("DB size:    {size} bytes");
    println!();

    let conn = get_connection(&settings.db_path)?;
    for entity in Entity::ALL {
        let count: i64 = if table_exists(&conn, entity.table())? {
            conn.query_row(
                &format!("SELECT count(*) FROM {}", entity.table()),
                [],
                |row| row.get(0),
            )?
        } else {
            0
        };
        println!("{:<14}{count}", format!("{}:", entity.table()));
    }
    Ok(())
}
