use anyhow::{Context, Result};
use log::warn;
use std::path::Path;
use std::sync::atomic::Ordering;

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::renderer;
use influence_tracker::core::batch::{BatchDriver, BatchOutcome, BatchReport};
use influence_tracker::core::config::AppConfig;
use influence_tracker::core::quota::local_now;
use influence_tracker::core::subject::Subject;

/// Score the subjects listed in a JSON file with the offline scorers.
///
/// Networked scorers need a data source linked in by the embedding program;
/// their configured weight contributes nothing here.
pub async fn run(input: &Path, opts: &OutputOptions) -> Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let subjects: Vec<Subject> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse subjects from {}", input.display()))?;

    let mut driver = BatchDriver::from_config(&config)?;
    for (id, weight) in config.scorers.enabled() {
        if id != "heuristics" {
            warn!("{} (weight {}) has no data source in this build, scoring 0", id, weight);
        }
    }

    let flag = driver.interrupt_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current subject");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let report = driver.run(&subjects).await?;
    match opts.format {
        OutputFormat::Text => println!("{}", render_report(&report, opts.use_color)),
        OutputFormat::Json => println!("{}", opts.to_json(&report)?),
    }
    Ok(())
}

fn render_report(report: &BatchReport, use_color: bool) -> String {
    let mut lines: Vec<String> = report
        .results
        .iter()
        .map(|result| {
            format!(
                "{:>6.2}  {:<8} {}",
                result.influence_score,
                result.subject.subject_type.id(),
                result.subject.clean_name()
            )
        })
        .collect();
    let outcome = match &report.outcome {
        BatchOutcome::Completed => "completed".to_string(),
        BatchOutcome::LimitReached { provider, usage } => {
            format!("stopped: {} limit reached ({})", provider, usage)
        }
        BatchOutcome::Interrupted => "interrupted".to_string(),
    };
    lines.push(format!("\n{}/{} subjects, {}", report.processed, report.total, outcome));

    let now = local_now();
    for summary in &report.usage {
        lines.push(String::new());
        lines.push(renderer::render_usage(summary, now, use_color));
    }
    lines.join("\n")
}
