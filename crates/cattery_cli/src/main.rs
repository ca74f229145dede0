//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `cattery_core` linkage and store bootstrap from `CATTERY_*`
//!   environment configuration.
//! - Keep output deterministic for quick local sanity checks.

use cattery_core::db::migrations::latest_version;
use cattery_core::db::open_db_with_config;
use cattery_core::logging::init_logging_from_config;
use cattery_core::{CatService, CoreConfig, SqliteCatRepository, SqliteToyRepository};
use log::info;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("cattery_cli error={message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let config = CoreConfig::from_env().map_err(|err| err.to_string())?;
    init_logging_from_config(&config)?;

    println!("cattery_core ping={}", cattery_core::ping());
    println!("cattery_core version={}", cattery_core::core_version());

    let conn = open_db_with_config(&config).map_err(|err| err.to_string())?;
    let cats = SqliteCatRepository::try_new(&conn).map_err(|err| err.to_string())?;
    let toys = SqliteToyRepository::try_new(&conn).map_err(|err| err.to_string())?;
    let service = CatService::new(cats, toys);

    let cat_count = service
        .list_cats(None, 0)
        .map_err(|err| err.to_string())?
        .len();
    let toy_count = service.list_toys().map_err(|err| err.to_string())?.len();

    println!("cattery_core schema_version={}", latest_version());
    println!("cattery_core cats={cat_count} toys={toy_count}");
    info!("event=cli_probe module=cli status=ok cats={cat_count} toys={toy_count}");
    Ok(())
}
