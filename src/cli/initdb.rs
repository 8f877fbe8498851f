use crate::cli::commands::InitDbArgs;
use crate::config::Settings;
use crate::db::Database;
use crate::errors::SiftError;

pub async fn handle_initdb(args: InitDbArgs) -> Result<(), SiftError> {
    let settings = Settings::from_env()?;
    let path = args.db_path.unwrap_or(settings.database.path);

    // Opening creates the schema; idempotent on an existing database
    Database::new(&path)?;
    println!("Database ready at {}", path);
    Ok(())
}
