use chrono::NaiveDateTime;
use colored::{control, ColoredString, Colorize};

use influence_tracker::core::formatter::{
    format_count, format_headroom, format_reset_countdown, format_usage_bar, format_used_percent,
    next_reset,
};
use influence_tracker::core::quota::{UsageSnapshot, UsageStatus, UsageSummary};

const BAR_WIDTH: usize = 12;

/// Render one provider's usage block as a colored (or plain) string.
///
/// Layout:
/// ```text
///  YouTube (daily quota)
///   Usage     12.0% used [█░░░░░░░░░░░]
///             Resets in 5h 12m
///   Left      8,800 units left today
///   Status    good
///   Calls     1,234 lifetime
///   Cache     56 entries
/// ```
pub fn render_usage(summary: &UsageSummary, now: NaiveDateTime, use_color: bool) -> String {
    control::set_override(use_color);

    let mut lines: Vec<String> = Vec::new();
    let regime = match summary.usage {
        UsageSnapshot::Quota { .. } => "daily quota",
        UsageSnapshot::Rate { .. } => "hourly rate",
    };
    lines.push(format!(" {} ({})", summary.provider, regime).bold().to_string());

    let percent = summary.usage.usage_percent();
    let status = summary.usage.status();
    lines.push(format!(
        "  {}     {} {}",
        "Usage".cyan(),
        color_by_status(status, &format_used_percent(percent)),
        format_usage_bar(percent, BAR_WIDTH).magenta()
    ));
    // 12 spaces to align under the percent/bar values
    lines.push(format!(
        "            {}",
        format_reset_countdown(next_reset(&summary.usage), now).dimmed()
    ));
    lines.push(format!("  {}      {}", "Left".cyan(), format_headroom(&summary.usage)));
    lines.push(format!(
        "  {}    {}",
        "Status".cyan(),
        color_by_status(status, status.as_str())
    ));
    lines.push(format!(
        "  {}     {} lifetime",
        "Calls".cyan(),
        format_count(summary.total_calls_lifetime)
    ));
    lines.push(format!(
        "  {}     {} entries",
        "Cache".cyan(),
        format_count(summary.cached_entries as u64)
    ));

    lines.join("\n")
}

fn color_by_status(status: UsageStatus, text: &str) -> ColoredString {
    match status {
        UsageStatus::Good => text.green(),
        UsageStatus::Warning => text.yellow(),
        UsageStatus::Critical => text.red(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(18, 48, 0)
            .unwrap()
    }

    fn quota_summary() -> UsageSummary {
        UsageSummary {
            provider: "YouTube".to_string(),
            total_calls_lifetime: 1_234,
            cached_entries: 56,
            usage: UsageSnapshot::Quota {
                units_used: 9_600,
                daily_quota_limit: 10_000,
                usage_percent: 96.0,
                status: UsageStatus::Critical,
                reset_date: now().date(),
            },
        }
    }

    #[test]
    fn render_quota_block() {
        let output = render_usage(&quota_summary(), now(), false);
        assert!(output.contains("YouTube (daily quota)"));
        assert!(output.contains("96.0% used"));
        assert!(output.contains("Resets in 5h 12m"));
        assert!(output.contains("400 units left today"));
        assert!(output.contains("critical"));
        assert!(output.contains("1,234 lifetime"));
        assert!(output.contains("56 entries"));
    }

    #[test]
    fn render_rate_block() {
        let summary = UsageSummary {
            provider: "Wikipedia".to_string(),
            total_calls_lifetime: 10,
            cached_entries: 0,
            usage: UsageSnapshot::Rate {
                calls_this_hour: 10,
                hourly_call_limit: 500,
                usage_percent: 2.0,
                status: UsageStatus::Good,
                hour_started: NaiveDate::from_ymd_opt(2024, 3, 10)
                    .unwrap()
                    .and_hms_opt(18, 0, 0)
                    .unwrap(),
            },
        };
        let output = render_usage(&summary, now(), false);
        assert!(output.contains("Wikipedia (hourly rate)"));
        assert!(output.contains("490 calls left this hour"));
        assert!(output.contains("Resets in 12m"));
    }

    #[test]
    fn render_no_ansi_when_color_false() {
        let output = render_usage(&quota_summary(), now(), false);
        assert!(!output.contains('\x1b'), "output should not contain ANSI codes");
    }
}
