//! Runtime tuning configuration.
//!
//! The core carries only the knobs it consumes itself: the session mailbox
//! capacity and the five predefined rate classes. File discovery,
//! validation policy and everything connection-related belong to the
//! embedding server.

use serde::Deserialize;

use crate::security::rate_limit::RateClass;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

/// Session limits configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Session mailbox capacity (default: 1000). A recipient that falls
    /// this many messages behind is presumed dead and disconnected.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
    /// The five rate classes handed to every session at sign-on,
    /// indexed by class id 1..=5.
    #[serde(default = "default_rate_classes")]
    pub rate_classes: [RateClass; 5],
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
            rate_classes: default_rate_classes(),
        }
    }
}

fn default_mailbox_capacity() -> usize {
    1000
}

/// The stock AOL rate-class table. Class 1 covers the bulk of client
/// traffic; class 3 is the ICBM class with the tightest window.
pub fn default_rate_classes() -> [RateClass; 5] {
    [
        RateClass {
            id: 1,
            window_size: 80,
            clear_level: 2500,
            alert_level: 2000,
            limit_level: 1500,
            disconnect_level: 800,
            max_level: 6000,
        },
        RateClass {
            id: 2,
            window_size: 80,
            clear_level: 3000,
            alert_level: 2000,
            limit_level: 1500,
            disconnect_level: 1000,
            max_level: 6000,
        },
        RateClass {
            id: 3,
            window_size: 20,
            clear_level: 5100,
            alert_level: 5000,
            limit_level: 4000,
            disconnect_level: 3000,
            max_level: 6000,
        },
        RateClass {
            id: 4,
            window_size: 20,
            clear_level: 5500,
            alert_level: 5300,
            limit_level: 4200,
            disconnect_level: 3000,
            max_level: 8000,
        },
        RateClass {
            id: 5,
            window_size: 10,
            clear_level: 5500,
            alert_level: 5300,
            limit_level: 4200,
            disconnect_level: 3000,
            max_level: 8000,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.limits.mailbox_capacity, 1000);
        let ids: Vec<u16> = config.limits.rate_classes.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn thresholds_are_ordered_in_every_class() {
        for class in default_rate_classes() {
            assert!(class.disconnect_level < class.limit_level);
            assert!(class.limit_level < class.alert_level);
            assert!(class.alert_level < class.clear_level);
            assert!(class.clear_level < class.max_level);
        }
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [limits]
            mailbox_capacity = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.limits.mailbox_capacity, 250);
        assert_eq!(config.limits.rate_classes[2].window_size, 20);
    }
}
