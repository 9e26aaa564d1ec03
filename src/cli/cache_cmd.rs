use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::usage_cmd::{open_manager, resolve_providers};
use influence_tracker::core::config::AppConfig;
use influence_tracker::core::providers::Provider;

#[derive(Serialize)]
struct CacheStats {
    provider: String,
    entries: usize,
    path: PathBuf,
}

pub fn stats(provider_filter: Option<String>, opts: &OutputOptions) -> Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;

    let mut rows = Vec::new();
    for provider in resolve_providers(provider_filter.as_deref())? {
        let manager = open_manager(&config, provider)?;
        rows.push(CacheStats {
            provider: provider.display_name().to_string(),
            entries: manager.cached_entries(),
            path: config.manager_config(provider).cache_path,
        });
    }

    match opts.format {
        OutputFormat::Text => {
            for row in &rows {
                println!("{:<10} {:>7} entries  {}", row.provider, row.entries, row.path.display());
            }
        }
        OutputFormat::Json => println!("{}", opts.to_json(&rows)?),
    }
    Ok(())
}

pub fn get(provider_id: &str, key: &str, opts: &OutputOptions) -> Result<()> {
    let Some(provider) = Provider::from_id(provider_id) else {
        bail!("Unknown provider: '{}'", provider_id);
    };
    let config = AppConfig::load().context("Failed to load config")?;
    let manager = open_manager(&config, provider)?;

    match manager.cache_get(key) {
        Some(value) => println!("{}", opts.to_json(value)?),
        None => {
            eprintln!("No cached {} entry for '{}'", provider.display_name(), key);
            std::process::exit(1);
        }
    }
    Ok(())
}
