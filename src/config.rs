//! Runtime configuration, read from `MINDDIGIT_*` environment variables with built-in defaults.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::warn;

use crate::game::CodeRules;
use crate::room::cleanup_task::CleanupConfig;
use crate::room::store::StoreConfig;

/// How differing digit-count selections are reconciled once both players have chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DigitCountPolicy {
    /// The host's (position 1) selection wins
    HostChoice,
    /// Both selections must be equal; a mismatching second selection is rejected
    RequireMatch,
}

/// Who takes the first guess when a game starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FirstTurnPolicy {
    Random,
    HostFirst,
}

/// Game rules consumed by the room service
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub code_rules: CodeRules,
    pub digit_policy: DigitCountPolicy,
    pub first_turn: FirstTurnPolicy,
    /// A connected player whose last status poll is older than this is marked disconnected
    pub heartbeat_timeout: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            code_rules: CodeRules::default(),
            digit_policy: DigitCountPolicy::HostChoice,
            first_turn: FirstTurnPolicy::Random,
            heartbeat_timeout: Duration::from_secs(5 * 60), // 5 minutes
        }
    }
}

impl GameConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let code_rules = CodeRules {
            min_digits: env_or("MINDDIGIT_MIN_DIGITS", defaults.code_rules.min_digits),
            max_digits: env_or("MINDDIGIT_MAX_DIGITS", defaults.code_rules.max_digits),
            duplicate_digit_counts: std::env::var("MINDDIGIT_DUPLICATE_DIGIT_COUNTS")
                .map(|raw| parse_digit_counts(&raw))
                .unwrap_or(defaults.code_rules.duplicate_digit_counts),
        };

        Self {
            code_rules,
            digit_policy: env_or("MINDDIGIT_DIGIT_POLICY", defaults.digit_policy),
            first_turn: env_or("MINDDIGIT_FIRST_TURN", defaults.first_turn),
            heartbeat_timeout: Duration::from_secs(env_or(
                "MINDDIGIT_HEARTBEAT_TIMEOUT_SECS",
                defaults.heartbeat_timeout.as_secs(),
            )),
        }
    }
}

/// Process-level configuration for the server binary
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub game: GameConfig,
    pub store: StoreConfig,
    pub cleanup: CleanupConfig,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let store_defaults = StoreConfig::default();
        let cleanup_defaults = CleanupConfig::default();

        let store = StoreConfig {
            call_timeout: Duration::from_millis(env_or(
                "MINDDIGIT_STORE_TIMEOUT_MS",
                store_defaults.call_timeout.as_millis() as u64,
            )),
            room_ttl: Duration::from_secs(env_or(
                "MINDDIGIT_ROOM_TTL_SECS",
                store_defaults.room_ttl.as_secs(),
            )),
            player_ttl: Duration::from_secs(env_or(
                "MINDDIGIT_PLAYER_TTL_SECS",
                store_defaults.player_ttl.as_secs(),
            )),
            recovery_digits: env_or("MINDDIGIT_RECOVERY_DIGITS", store_defaults.recovery_digits),
        };

        let cleanup = CleanupConfig {
            cleanup_interval: Duration::from_secs(env_or(
                "MINDDIGIT_CLEANUP_INTERVAL_SECS",
                cleanup_defaults.cleanup_interval.as_secs(),
            )),
        };

        Self {
            bind_addr: std::env::var("MINDDIGIT_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            game: GameConfig::from_env(),
            store,
            cleanup,
        }
    }
}

/// Reads and parses an environment variable, keeping `default` when unset or malformed
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key = %key, value = %raw, "Ignoring malformed configuration value");
                default
            }
        },
        Err(_) => default,
    }
}

/// Parses a comma separated list such as `"2,3"`; malformed entries are skipped
fn parse_digit_counts(raw: &str) -> BTreeSet<usize> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| match part.parse() {
            Ok(count) => Some(count),
            Err(_) => {
                warn!(value = %part, "Ignoring malformed duplicate digit count");
                None
            }
        })
        .collect()
}
