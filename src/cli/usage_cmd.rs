use anyhow::{bail, Context, Result};

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::renderer;
use influence_tracker::core::config::AppConfig;
use influence_tracker::core::providers::Provider;
use influence_tracker::core::quota::{local_now, QuotaManager, UsageSummary};

/// Providers named by `--provider`, or all of them.
pub fn resolve_providers(filter: Option<&str>) -> Result<Vec<Provider>> {
    match filter {
        None | Some("all") => Ok(Provider::all().to_vec()),
        Some(id) => match Provider::from_id(id) {
            Some(p) => Ok(vec![p]),
            None => bail!("Unknown provider: '{}'", id),
        },
    }
}

/// Open a provider's manager without knowing its record type.
/// Loading reconciles elapsed periods, so the usage read back is current.
pub fn open_manager(
    config: &AppConfig,
    provider: Provider,
) -> Result<QuotaManager<serde_json::Value>> {
    let costs = provider.cost_table()?;
    Ok(QuotaManager::open(config.manager_config(provider), costs))
}

pub fn run(provider_filter: Option<String>, opts: &OutputOptions) -> Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;
    let providers = resolve_providers(provider_filter.as_deref())?;

    let summaries: Vec<UsageSummary> = providers
        .into_iter()
        .map(|provider| open_manager(&config, provider).map(|m| m.usage_summary()))
        .collect::<Result<_>>()?;

    match opts.format {
        OutputFormat::Text => {
            let now = local_now();
            let sections: Vec<String> = summaries
                .iter()
                .map(|summary| renderer::render_usage(summary, now, opts.use_color))
                .collect();
            println!("{}", sections.join("\n\n"));
        }
        OutputFormat::Json => println!("{}", opts.to_json(&summaries)?),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn resolve_providers_filters() {
        assert_eq!(resolve_providers(None).unwrap().len(), 2);
        assert_eq!(resolve_providers(Some("all")).unwrap().len(), 2);
        assert_eq!(resolve_providers(Some("yt")).unwrap(), vec![Provider::YouTube]);
        assert!(resolve_providers(Some("spotify")).is_err());
    }

    #[test]
    fn open_manager_reads_existing_ledger() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.settings.cache_dir = Some(dir.path().to_path_buf());

        let mut manager = open_manager(&config, Provider::YouTube).unwrap();
        manager.record_call("channel search", "search");
        drop(manager);

        let summary = open_manager(&config, Provider::YouTube)
            .unwrap()
            .usage_summary();
        assert_eq!(summary.provider, "YouTube");
        assert_eq!(summary.total_calls_lifetime, 1);
        assert_eq!(summary.usage.describe(), "100/10000 units today");
    }
}
