//! Range checks on a loaded configuration
//!
//! Every violated setting is reported at once so a single edit of the TOML
//! file can fix them all.

use crate::{ConfigError, ConfigResult, VoxatlasConfig};

/// One offending setting
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("{field} must be set")]
    MissingRequired { field: String },
    #[error("{field} {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Default)]
struct Violations(Vec<ConfigValidationError>);

impl Violations {
    fn check(&mut self, ok: bool, field: &str, reason: impl FnOnce() -> String) {
        if !ok {
            self.0.push(ConfigValidationError::InvalidValue {
                field: field.to_string(),
                reason: reason(),
            });
        }
    }

    fn require(&mut self, present: bool, field: &str) {
        if !present {
            self.0.push(ConfigValidationError::MissingRequired {
                field: field.to_string(),
            });
        }
    }
}

/// Check all sections, failing with a `ValidationError` that lists each violation
pub fn validate_config(config: &VoxatlasConfig) -> ConfigResult<()> {
    let mut violations = Violations::default();
    let fetch = &config.fetch;
    let assignment = &config.assignment;

    violations.check(
        fetch.max_gib.is_finite() && fetch.max_gib > 0.0,
        "fetch.max_gib",
        || format!("must be a positive number, got {}", fetch.max_gib),
    );
    violations.check(fetch.http_timeout_secs > 0, "fetch.http_timeout_secs", || {
        "must be at least 1 second".to_string()
    });

    violations.check(assignment.min_size_voxel > 0, "assignment.min_size_voxel", || {
        "must be at least 1".to_string()
    });
    violations.check(
        assignment.lower_threshold >= 0.0,
        "assignment.lower_threshold",
        || format!("must not be negative, got {}", assignment.lower_threshold),
    );
    violations.check(
        assignment.voxel_precision_cutoff > 0.0,
        "assignment.voxel_precision_cutoff",
        || format!("must be positive, got {}", assignment.voxel_precision_cutoff),
    );
    violations.check(
        assignment.kernel_sigma_points >= 1.0,
        "assignment.kernel_sigma_points",
        || format!("must be at least 1, got {}", assignment.kernel_sigma_points),
    );

    violations.require(!config.logging.level.trim().is_empty(), "logging.level");

    if violations.0.is_empty() {
        return Ok(());
    }
    let listing: String = violations.0.iter().map(|v| format!("\n  {}", v)).collect();
    Err(ConfigError::ValidationError(format!(
        "invalid voxatlas configuration:{}",
        listing
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_violations_are_collected() {
        let mut config = VoxatlasConfig::default();
        config.fetch.max_gib = 0.0;
        config.assignment.min_size_voxel = 0;
        config.assignment.lower_threshold = -0.5;

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("fetch.max_gib"));
        assert!(err.contains("assignment.min_size_voxel"));
        assert!(err.contains("assignment.lower_threshold"));
        assert!(!err.contains("http_timeout_secs"));
    }

    #[test]
    fn test_nan_budget_and_blank_level_are_rejected() {
        let mut config = VoxatlasConfig::default();
        config.fetch.max_gib = f64::NAN;
        config.logging.level = "  ".to_string();

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("fetch.max_gib must be a positive number"));
        assert!(err.contains("logging.level must be set"));
    }
}
