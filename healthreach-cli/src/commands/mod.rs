pub mod batch;
pub mod info;
pub mod list;
pub mod nearby;
pub mod nearest;
pub mod network;
pub mod population;
pub mod route;

use anyhow::{Context, Result};
use healthreach::{AccessService, AccessServiceBuilder, Config};
use serde::Serialize;
use std::path::PathBuf;

/// Build the service from the environment, with `--dataset` taking
/// precedence over `HEALTHREACH_DATASET` and the `DB_*` variables.
pub fn connect(dataset: Option<PathBuf>) -> Result<AccessService> {
    let config = Config::from_lookup(|key| match (key, &dataset) {
        ("HEALTHREACH_DATASET", Some(path)) => Some(path.to_string_lossy().into_owned()),
        _ => std::env::var(key).ok(),
    })
    .context("Invalid environment configuration")?;
    if config.dataset.is_none() && config.database.is_none() {
        anyhow::bail!(
            "No data source configured. Use --dataset, set HEALTHREACH_DATASET, or set DB_HOST/DB_NAME/DB_USERNAME/DB_PASSWORD"
        );
    }

    AccessServiceBuilder::from_config(&config)
        .and_then(|builder| builder.build())
        .context("Failed to create accessibility service")
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn optional(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}
