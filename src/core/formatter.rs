use chrono::{Duration, NaiveDateTime, NaiveTime};

use crate::core::quota::UsageSnapshot;

/// Returns "{pct}% used", one decimal place.
pub fn format_used_percent(used_percent: f64) -> String {
    format!("{:.1}% used", used_percent.max(0.0))
}

/// Returns "[████░░░░░░░░]" where █ = used portion, ░ = headroom.
/// Width is the number of block characters inside the brackets.
pub fn format_usage_bar(used_percent: f64, width: usize) -> String {
    let used_percent = used_percent.clamp(0.0, 100.0);
    let used_blocks = ((used_percent / 100.0) * width as f64).round() as usize;
    let free_blocks = width.saturating_sub(used_blocks);

    format!("[{}{}]", "█".repeat(used_blocks), "░".repeat(free_blocks))
}

/// Groups digits by thousands: 1234567 -> "1,234,567".
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// "8,800 units left today" or "420 calls left this hour".
pub fn format_headroom(usage: &UsageSnapshot) -> String {
    match usage {
        UsageSnapshot::Quota {
            units_used,
            daily_quota_limit,
            ..
        } => format!(
            "{} units left today",
            format_count(daily_quota_limit.saturating_sub(*units_used))
        ),
        UsageSnapshot::Rate {
            calls_this_hour,
            hourly_call_limit,
            ..
        } => format!(
            "{} calls left this hour",
            format_count(hourly_call_limit.saturating_sub(*calls_this_hour))
        ),
    }
}

/// When the counter in `usage` next returns to zero.
pub fn next_reset(usage: &UsageSnapshot) -> NaiveDateTime {
    match usage {
        UsageSnapshot::Quota { reset_date, .. } => {
            (*reset_date + Duration::days(1)).and_time(NaiveTime::MIN)
        }
        UsageSnapshot::Rate { hour_started, .. } => *hour_started + Duration::hours(1),
    }
}

/// Returns "Resets in Xh Ym" relative to `now`. If past, returns "Resets now".
pub fn format_reset_countdown(resets_at: NaiveDateTime, now: NaiveDateTime) -> String {
    let total_seconds = (resets_at - now).num_seconds();
    if total_seconds <= 0 {
        return "Resets now".to_string();
    }

    let total_minutes = total_seconds / 60;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours > 0 {
        format!("Resets in {}h {}m", hours, minutes)
    } else {
        format!("Resets in {}m", total_minutes.max(1))
    }
}
