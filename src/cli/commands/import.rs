//! CSV import command handler

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::db::Store;
use crate::import;

pub async fn cmd_import_csv(config: &Config, dir: Option<PathBuf>) -> anyhow::Result<()> {
    let dir = dir.unwrap_or_else(|| PathBuf::from(&config.import.data_dir));

    if !dir.is_dir() {
        println!("Directory does not exist: {}", dir.display());
        return Ok(());
    }

    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    println!("Importing CSV data from {}", display(&dir));
    println!("{:-<60}", "");

    let report = import::import_dir(&store, &dir).await?;

    println!("{report}");
    Ok(())
}

fn display(dir: &Path) -> String {
    dir.canonicalize()
        .unwrap_or_else(|_| dir.to_path_buf())
        .display()
        .to_string()
}
