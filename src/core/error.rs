use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Enabled scorer weights must sum to 100, got {0}")]
    WeightSum(u32),
    #[error("Prominence scores cannot exceed 100, found {0}")]
    ScoreOutOfRange(u32),
    #[error("Invalid thresholds: warning {warning} and stop {stop} must satisfy 0 < warning < stop < 1")]
    Thresholds { warning: f64, stop: f64 },
    #[error("Unknown provider ID: '{0}'")]
    UnknownProvider(String),
}

/// Errors surfaced by the quota layer to provider clients and the driver.
#[derive(Error, Debug)]
pub enum QuotaError {
    /// Raised by a provider client when the next call would cross the stop threshold.
    #[error("{provider}: stop threshold reached ({usage})")]
    LimitReached { provider: String, usage: String },

    #[error("{provider}: invalid cost table: {reason}")]
    InvalidCostTable { provider: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_reached_display_names_provider() {
        let err = QuotaError::LimitReached {
            provider: "YouTube".to_string(),
            usage: "9500/10000 units".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "YouTube: stop threshold reached (9500/10000 units)"
        );
    }

    #[test]
    fn weight_sum_display() {
        assert_eq!(
            ConfigError::WeightSum(90).to_string(),
            "Enabled scorer weights must sum to 100, got 90"
        );
    }
}
