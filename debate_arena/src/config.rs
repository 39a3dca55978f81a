//! Engine configuration loaded from environment variables.
//!
//! Belt-specific policy lives in [`crate::belt::BeltSettings`] and is passed
//! explicitly into every policy call; this module only covers the global
//! economy switches read once at startup.

use crate::economy::TournamentBeltCosts;

/// Default number of rounds for King of the Hill events
pub const DEFAULT_KOTH_ROUNDS: u32 = 3;

/// Global economy configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EconomyConfig {
    /// When false, the free-challenge and coin gates are skipped entirely
    pub require_coins_for_challenge: bool,
    /// Belt cost per tournament size tier
    pub tournament_belt_costs: TournamentBeltCosts,
    /// Round count used when a King of the Hill event does not set one
    pub koth_default_rounds: u32,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            require_coins_for_challenge: true,
            tournament_belt_costs: TournamentBeltCosts::default(),
            koth_default_rounds: DEFAULT_KOTH_ROUNDS,
        }
    }
}

impl EconomyConfig {
    /// Load configuration from environment variables
    ///
    /// Recognised variables:
    /// - `REQUIRE_COINS_FOR_CHALLENGE` (default: true)
    /// - `TOURNAMENT_BELT_COST_SMALL` (default: 500)
    /// - `TOURNAMENT_BELT_COST_MEDIUM` (default: 1000)
    /// - `TOURNAMENT_BELT_COST_LARGE` (default: 2500)
    /// - `KOTH_DEFAULT_ROUNDS` (default: 3)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when a variable is set but cannot be
    /// parsed, or when the loaded values fail [`EconomyConfig::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            require_coins_for_challenge: parse_env(
                "REQUIRE_COINS_FOR_CHALLENGE",
                defaults.require_coins_for_challenge,
            )?,
            tournament_belt_costs: TournamentBeltCosts {
                small: parse_env(
                    "TOURNAMENT_BELT_COST_SMALL",
                    defaults.tournament_belt_costs.small,
                )?,
                medium: parse_env(
                    "TOURNAMENT_BELT_COST_MEDIUM",
                    defaults.tournament_belt_costs.medium,
                )?,
                large: parse_env(
                    "TOURNAMENT_BELT_COST_LARGE",
                    defaults.tournament_belt_costs.large,
                )?,
            },
            koth_default_rounds: parse_env("KOTH_DEFAULT_ROUNDS", defaults.koth_default_rounds)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        let costs = &self.tournament_belt_costs;
        for (var, cost) in [
            ("TOURNAMENT_BELT_COST_SMALL", costs.small),
            ("TOURNAMENT_BELT_COST_MEDIUM", costs.medium),
            ("TOURNAMENT_BELT_COST_LARGE", costs.large),
        ] {
            if cost < 0 {
                return Err(ConfigError::Invalid {
                    var: var.to_string(),
                    reason: "Must not be negative".to_string(),
                });
            }
        }

        if self.koth_default_rounds == 0 {
            return Err(ConfigError::Invalid {
                var: "KOTH_DEFAULT_ROUNDS".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Parse an environment variable, falling back to `default` when unset
pub(crate) fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("Cannot parse '{raw}'"),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 5] = [
        "REQUIRE_COINS_FOR_CHALLENGE",
        "TOURNAMENT_BELT_COST_SMALL",
        "TOURNAMENT_BELT_COST_MEDIUM",
        "TOURNAMENT_BELT_COST_LARGE",
        "KOTH_DEFAULT_ROUNDS",
    ];

    fn clear_env() {
        for var in VARS {
            // SAFETY: tests touching the environment are serialized
            unsafe { std::env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        let config = EconomyConfig::from_env().unwrap();
        assert_eq!(config, EconomyConfig::default());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        unsafe {
            std::env::set_var("REQUIRE_COINS_FOR_CHALLENGE", "false");
            std::env::set_var("TOURNAMENT_BELT_COST_LARGE", "9000");
        }

        let config = EconomyConfig::from_env().unwrap();
        assert!(!config.require_coins_for_challenge);
        assert_eq!(config.tournament_belt_costs.large, 9000);
        assert_eq!(config.tournament_belt_costs.small, 500);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_garbage() {
        clear_env();
        unsafe { std::env::set_var("KOTH_DEFAULT_ROUNDS", "three") };

        let err = EconomyConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("KOTH_DEFAULT_ROUNDS"));
        clear_env();
    }

    #[test]
    fn test_validate_negative_cost() {
        let mut config = EconomyConfig::default();
        config.tournament_belt_costs.medium = -1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { ref var, .. }) if var == "TOURNAMENT_BELT_COST_MEDIUM"
        ));
    }
}
