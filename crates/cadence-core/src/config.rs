use anyhow::Result;
use config::Config;
use serde::Deserialize;

use crate::constants::PRODUCT_ID;
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    pub recurrence: RecurrenceConfig,
    pub calendar: CalendarConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecurrenceConfig {
    /// How far past "now" an unbounded series is expanded when its last
    /// occurrence has to be estimated.
    pub horizon_months: u32,
    /// Upper bound on candidates produced by a single rule expansion.
    pub max_iterations: usize,
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        Self {
            horizon_months: 12,
            max_iterations: 100_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarConfig {
    pub product_id: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            product_id: PRODUCT_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// ## Summary
    /// Loads configuration from environment variables and an optional
    /// `cadence.toml` into a `Settings`.
    ///
    /// ## Errors
    /// Returns an error if building the configuration or deserializing it fails.
    pub fn load() -> Result<Self> {
        let defaults = Self::default();

        let settings = Config::builder()
            .set_default(
                "recurrence.horizon_months",
                i64::from(defaults.recurrence.horizon_months),
            )?
            .set_default(
                "recurrence.max_iterations",
                u64::try_from(defaults.recurrence.max_iterations)?,
            )?
            .set_default("calendar.product_id", defaults.calendar.product_id)?
            .set_default("logging.level", defaults.logging.level)?
            // Env file
            .add_source(
                config::Environment::default()
                    .convert_case(config::Case::Snake)
                    .separator("_")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            // TOML file
            .add_source(config::File::with_name("cadence.toml").required(false))
            .build()?
            .try_deserialize::<Settings>()?;
        settings.validate()?;

        tracing::debug!(
            horizon_months = settings.recurrence.horizon_months,
            product_id = %settings.calendar.product_id,
            "Loaded settings"
        );
        Ok(settings)
    }

    /// ## Summary
    /// Rejects settings no expansion could work with.
    ///
    /// ## Errors
    /// `CoreError::ConfigError` for a zero horizon or iteration limit, or an
    /// empty product id.
    pub fn validate(&self) -> CoreResult<()> {
        if self.recurrence.horizon_months == 0 {
            return Err(CoreError::ConfigError(
                "recurrence.horizon_months must be positive".to_string(),
            ));
        }
        if self.recurrence.max_iterations == 0 {
            return Err(CoreError::ConfigError(
                "recurrence.max_iterations must be positive".to_string(),
            ));
        }
        if self.calendar.product_id.trim().is_empty() {
            return Err(CoreError::ConfigError(
                "calendar.product_id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// ## Summary
/// Loads configuration from environment variables and `.env` file.
///
/// ## Errors
/// Returns an error if loading or deserializing the configuration fails.
pub fn load_config() -> Result<Settings> {
    dotenvy::dotenv().ok();

    Settings::load()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.recurrence.horizon_months, 12);
        assert_eq!(settings.recurrence.max_iterations, 100_000);
        assert_eq!(settings.calendar.product_id, PRODUCT_ID);
        assert_eq!(settings.logging.level, "info");
    }

    #[test_log::test]
    fn validation_rejects_unusable_limits() {
        assert!(Settings::default().validate().is_ok());

        let mut settings = Settings::default();
        settings.recurrence.horizon_months = 0;
        assert!(matches!(settings.validate(), Err(CoreError::ConfigError(_))));

        let mut settings = Settings::default();
        settings.calendar.product_id = " ".to_string();
        assert!(settings.validate().is_err());
    }

    #[test_log::test]
    fn load_falls_back_to_defaults() {
        let settings = Settings::load().expect("settings should load without a config file");
        assert!(settings.recurrence.horizon_months > 0);
        assert!(!settings.calendar.product_id.is_empty());
    }
}
