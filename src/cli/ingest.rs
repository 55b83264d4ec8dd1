use crate::db::get_connection;
use crate::error::Result;
use crate::ingest::process_source_directory;
use crate::settings::Settings;

pub fn run(data_dir: Option<String>) -> Result<()> {
    let settings = Settings::from_env(data_dir);
    let mut conn = get_connection(&settings.db_path)?;

    let summaries = process_source_directory(&mut conn, &settings.data_dir)?;
    for summary in &summaries {
        let table = summary.entity.table();
        if summary.already_populated {
            println!("{table}: already populated, skipped");
        } else if summary.skipped > 0 {
            println!(
                "{table}: inserted {} new entries ({} duplicates skipped)",
                summary.inserted, summary.skipped
            );
        } else {
            println!("{table}: inserted {} new entries", summary.inserted);
        }
    }
    Ok(())
}
