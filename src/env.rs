//! Process-wide configuration read from environment variables.
//!
//! None of this is re-read after the first access: the layer reads its
//! environment once, at the point the first `Device` context is created,
//! the same way a builder is consumed once into an immutable settings
//! value.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::registry::HandleKind;

fn parse_bool(var: &str, default: bool) -> bool {
    match env::var(var) {
        Ok(v) => matches!(v.as_str(), "1" | "true" | "TRUE" | "yes"),
        Err(_) => default,
    }
}

fn parse_level(var: &str, default: log::LevelFilter) -> log::LevelFilter {
    env::var(var)
        .ok()
        .and_then(|v| log::LevelFilter::from_str(&v).ok())
        .unwrap_or(default)
}

/// Parsed `VIL_*` environment configuration.
///
/// Fields correspond 1:1 to the `VIL_*` environment variables below.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub wrap: bool,
    pub wrap_overrides: HashMap<HandleKind, bool>,
    pub bump_api_version: bool,
    pub timeline_semaphores: bool,
    pub transform_feedback: bool,
    pub device_fault: bool,
    pub break_on_error: bool,
    pub min_log_level: log::LevelFilter,
    pub skip_ext_check: bool,
}

impl Default for EnvConfig {
    fn default() -> Self {
        EnvConfig {
            wrap: true,
            wrap_overrides: HashMap::new(),
            bump_api_version: false,
            timeline_semaphores: true,
            transform_feedback: true,
            device_fault: false,
            break_on_error: false,
            min_log_level: log::LevelFilter::Warn,
            skip_ext_check: false,
        }
    }
}

impl EnvConfig {
    fn from_environment() -> Self {
        let mut cfg = EnvConfig {
            wrap: parse_bool("VIL_WRAP", true),
            bump_api_version: parse_bool("VIL_BUMP_API_VERSION", false),
            timeline_semaphores: parse_bool("VIL_TIMELINE_SEMAPHORES", true),
            transform_feedback: parse_bool("VIL_TRANSFORM_FEEDBACK", true),
            device_fault: parse_bool("VIL_DEVICE_FAULT", false),
            break_on_error: parse_bool("VIL_BREAK_ON_ERROR", false),
            min_log_level: parse_level("VIL_MIN_LOG_LEVEL", log::LevelFilter::Warn),
            skip_ext_check: parse_bool("VIL_SKIP_EXT_CHECK", false),
            wrap_overrides: HashMap::new(),
        };

        for kind in HandleKind::ALL {
            let var = format!("VIL_WRAP_{}", kind.env_suffix());
            if let Ok(v) = env::var(&var) {
                let enabled = matches!(v.as_str(), "1" | "true" | "TRUE" | "yes");
                cfg.wrap_overrides.insert(*kind, enabled);
            }
        }

        cfg
    }

    /// Whether handles of `kind` should be wrapped, taking the per-kind
    /// override into account. The hook engine's snapshot path requires
    /// wrapping to be sound, so callers that need to read descriptor
    /// contents after submission should assert this is `true` for the
    /// kinds they care about.
    pub fn wraps(&self, kind: HandleKind) -> bool {
        *self.wrap_overrides.get(&kind).unwrap_or(&self.wrap)
    }

    /// Returns the process-wide config, parsing the environment on first
    /// access and reusing the parsed value afterwards.
    pub fn get() -> &'static EnvConfig {
        static CONFIG: OnceLock<EnvConfig> = OnceLock::new();
        CONFIG.get_or_init(EnvConfig::from_environment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_permissive() {
        let cfg = EnvConfig::default();
        assert!(cfg.wrap);
        assert!(!cfg.bump_api_version);
        assert!(!cfg.device_fault);
        assert_eq!(cfg.min_log_level, log::LevelFilter::Warn);
    }

    #[test]
    fn wrap_override_falls_back_to_global() {
        let mut cfg = EnvConfig::default();
        cfg.wrap = false;
        assert!(!cfg.wraps(HandleKind::Image));
        cfg.wrap_overrides.insert(HandleKind::Image, true);
        assert!(cfg.wraps(HandleKind::Image));
    }
}
