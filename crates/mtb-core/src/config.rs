use std::{env, fs, path::Path, time::Duration};

use crate::{
    errors::Error,
    formatting::{Dialect, EscapePolicy},
    messaging::{delivery::RetryPolicy, throttled::ThrottleConfig},
    streaming::StreamingConfig,
    Result,
};

/// Typed configuration.
///
/// Every key is optional; see [`Config::default`] for the fallbacks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    // Formatting
    pub dialect: Dialect,
    pub protect_formatting: bool,

    // Telegram limits
    pub telegram_message_limit: usize,
    pub telegram_safe_limit: usize,

    // Streaming
    pub streaming_enabled: bool,
    pub streaming_threshold: usize,
    pub streaming_update_interval: Duration,

    // Flood control
    pub throttle_global: Duration,
    pub throttle_per_chat: Duration,
    pub retry_max_attempts: u32,
    pub retry_extra_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dialect: Dialect::MarkdownV2,
            protect_formatting: true,
            telegram_message_limit: 4096,
            telegram_safe_limit: 4000,
            streaming_enabled: true,
            streaming_threshold: 100,
            streaming_update_interval: Duration::from_millis(1000),
            throttle_global: Duration::from_millis(40),
            throttle_per_chat: Duration::from_millis(1050),
            retry_max_attempts: 3,
            retry_extra_delay: Duration::from_millis(500),
        }
    }
}

impl Config {
    /// Process environment, after an optional `.env` in the working directory.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let d = Self::default();

        let dialect = match get("TELEGRAM_PARSE_MODE").and_then(non_empty) {
            Some(s) => s.parse::<Dialect>()?,
            None => d.dialect,
        };

        let cfg = Self {
            dialect,
            protect_formatting: parse_bool(get("PROTECT_FORMATTING"))
                .unwrap_or(d.protect_formatting),
            telegram_message_limit: parse_num(get("TELEGRAM_MESSAGE_LIMIT"))
                .unwrap_or(d.telegram_message_limit),
            telegram_safe_limit: parse_num(get("TELEGRAM_SAFE_LIMIT"))
                .unwrap_or(d.telegram_safe_limit),
            streaming_enabled: parse_bool(get("ENABLE_STREAMING")).unwrap_or(d.streaming_enabled),
            streaming_threshold: parse_num(get("STREAMING_THRESHOLD"))
                .unwrap_or(d.streaming_threshold),
            streaming_update_interval: parse_millis(get("STREAMING_UPDATE_INTERVAL_MS"))
                .unwrap_or(d.streaming_update_interval),
            throttle_global: parse_millis(get("THROTTLE_GLOBAL_MS")).unwrap_or(d.throttle_global),
            throttle_per_chat: parse_millis(get("THROTTLE_PER_CHAT_MS"))
                .unwrap_or(d.throttle_per_chat),
            retry_max_attempts: parse_num(get("RETRY_MAX_ATTEMPTS"))
                .unwrap_or(d.retry_max_attempts)
                .max(1),
            retry_extra_delay: parse_millis(get("RETRY_EXTRA_DELAY_MS"))
                .unwrap_or(d.retry_extra_delay),
        };

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.telegram_safe_limit == 0 {
            return Err(Error::Config(
                "TELEGRAM_SAFE_LIMIT must be greater than zero".to_string(),
            ));
        }
        if self.telegram_safe_limit > self.telegram_message_limit {
            return Err(Error::Config(format!(
                "TELEGRAM_SAFE_LIMIT ({}) exceeds TELEGRAM_MESSAGE_LIMIT ({})",
                self.telegram_safe_limit, self.telegram_message_limit
            )));
        }
        Ok(())
    }

    /// Escape rules for the configured dialect. `protect_formatting` is
    /// passed separately to [`EscapePolicy::escape`].
    pub fn escape_policy(&self) -> EscapePolicy {
        EscapePolicy::from(self.dialect)
    }

    pub fn streaming_config(&self) -> StreamingConfig {
        StreamingConfig {
            enabled: self.streaming_enabled,
            threshold: self.streaming_threshold,
            update_interval: self.streaming_update_interval,
            safe_message_len: self.telegram_safe_limit,
        }
    }

    pub fn throttle_config(&self) -> ThrottleConfig {
        ThrottleConfig {
            global_min_interval: self.throttle_global,
            per_chat_min_interval: self.throttle_per_chat,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            extra_delay: self.retry_extra_delay,
        }
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim().trim_start_matches("export ").trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn parse_bool(v: Option<String>) -> Option<bool> {
    let v = v?;
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_num<T: std::str::FromStr>(v: Option<String>) -> Option<T> {
    v.and_then(|s| s.trim().parse::<T>().ok())
}

fn parse_millis(v: Option<String>) -> Option<Duration> {
    parse_num::<u64>(v).map(Duration::from_millis)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(from_pairs(&[]).unwrap(), Config::default());
    }

    #[test]
    fn reads_overrides() {
        let cfg = from_pairs(&[
            ("TELEGRAM_PARSE_MODE", "Markdown"),
            ("PROTECT_FORMATTING", "no"),
            ("ENABLE_STREAMING", "0"),
            ("STREAMING_THRESHOLD", " 250 "),
            ("STREAMING_UPDATE_INTERVAL_MS", "2000"),
            ("RETRY_MAX_ATTEMPTS", "5"),
        ])
        .unwrap();

        assert_eq!(cfg.dialect, Dialect::Legacy);
        assert!(!cfg.protect_formatting);
        assert!(!cfg.streaming_enabled);
        assert_eq!(cfg.streaming_threshold, 250);
        assert_eq!(cfg.streaming_update_interval, Duration::from_secs(2));
        assert_eq!(cfg.retry_policy().max_attempts, 5);
    }

    #[test]
    fn unparsable_numbers_fall_back_to_defaults() {
        let cfg = from_pairs(&[
            ("STREAMING_THRESHOLD", "lots"),
            ("ENABLE_STREAMING", "maybe"),
        ])
        .unwrap();
        assert_eq!(cfg.streaming_threshold, 100);
        assert!(cfg.streaming_enabled);
    }

    #[test]
    fn invalid_parse_mode_is_an_error() {
        let err = from_pairs(&[("TELEGRAM_PARSE_MODE", "HTML")]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn safe_limit_must_fit_message_limit() {
        let err = from_pairs(&[("TELEGRAM_SAFE_LIMIT", "5000")]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(from_pairs(&[("TELEGRAM_SAFE_LIMIT", "0")]).is_err());
    }

    #[test]
    fn views_follow_fields() {
        let cfg = Config {
            dialect: Dialect::Legacy,
            telegram_safe_limit: 3000,
            ..Config::default()
        };

        assert_eq!(cfg.escape_policy(), EscapePolicy::legacy());

        let s = cfg.streaming_config();
        assert_eq!(s.safe_message_len, 3000);
        assert_eq!(s.threshold, 100);

        let t = cfg.throttle_config();
        assert_eq!(t, ThrottleConfig::default());
    }

    #[test]
    fn dotenv_lines() {
        let parsed = parse_dotenv(
            "# comment\n\nexport TELEGRAM_PARSE_MODE=\"MarkdownV2\"\nNOVALUE\nSTREAMING_THRESHOLD = '50'\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("TELEGRAM_PARSE_MODE".to_string(), "MarkdownV2".to_string()),
                ("STREAMING_THRESHOLD".to_string(), "50".to_string()),
            ]
        );
    }
}
