use std::path::PathBuf;

pub const DATA_DIR_VAR: &str = "REWARDS_DATA_DIR";
pub const DB_PATH_VAR: &str = "REWARDS_DB";

#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
}

impl Settings {
    /// Resolution order: explicit value, then environment, then default.
    /// The database defaults to `rewards.db` inside the data directory.
    pub fn resolve(data_dir: Option<String>, db_path: Option<String>) -> Settings {
        let data_dir = PathBuf::from(data_dir.unwrap_or_else(|| "data".to_string()));
        let db_path = db_path
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("rewards.db"));
        Settings { data_dir, db_path }
    }

    pub fn from_env(data_dir_flag: Option<String>) -> Settings {
        Self::resolve(
            data_dir_flag.or_else(|| std::env::var(DATA_DIR_VAR).ok()),
            std::env::var(DB_PATH_VAR).ok(),
        )
    }
}
