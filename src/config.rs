use std::str::FromStr;

use log::warn;

/// How the reader reacts to structural problems in a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
    /// Abort graph construction with a [`LoadError`](crate::error::LoadError).
    #[default]
    Strict,
    /// Log a warning and carry on: unknown types are dropped, dangling
    /// successors become absent.
    Permissive,
}

impl LoadPolicy {
    pub fn is_strict(self) -> bool {
        self == LoadPolicy::Strict
    }
}

impl FromStr for LoadPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(LoadPolicy::Strict),
            "permissive" => Ok(LoadPolicy::Permissive),
            other => Err(format!("unknown load policy '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Reader configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    pub policy: LoadPolicy,
    /// Namespace holding the display names of speakers.
    pub names_namespace: String,
    /// Seed for choice shuffling. `None` draws from OS entropy.
    pub shuffle_seed: Option<u64>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            policy: LoadPolicy::Strict,
            names_namespace: "names".into(),
            shuffle_seed: None,
        }
    }
}

impl ReaderConfig {
    /// Defaults overridden by `DIALOG_POLICY` and `DIALOG_SEED`.
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var("DIALOG_POLICY").ok().as_deref(),
            std::env::var("DIALOG_SEED").ok().as_deref(),
        )
    }

    fn from_vars(policy: Option<&str>, seed: Option<&str>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = policy {
            match raw.parse() {
                Ok(policy) => config.policy = policy,
                Err(e) => warn!("Ignoring DIALOG_POLICY: {e}"),
            }
        }

        if let Some(raw) = seed {
            match raw.trim().parse() {
                Ok(seed) => config.shuffle_seed = Some(seed),
                Err(e) => warn!("Ignoring DIALOG_SEED '{raw}': {e}"),
            }
        }

        config
    }

    pub fn with_policy(mut self, policy: LoadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parse() {
        assert_eq!("Strict".parse::<LoadPolicy>(), Ok(LoadPolicy::Strict));
        assert_eq!(" permissive ".parse::<LoadPolicy>(), Ok(LoadPolicy::Permissive));
        assert!("lenient".parse::<LoadPolicy>().is_err());
    }

    #[test]
    fn test_from_vars_overrides_defaults() {
        let config = ReaderConfig::from_vars(Some("permissive"), Some("42"));
        assert_eq!(config.policy, LoadPolicy::Permissive);
        assert_eq!(config.shuffle_seed, Some(42));
        assert_eq!(config.names_namespace, "names");
    }

    #[test]
    fn test_from_vars_ignores_garbage() {
        let config = ReaderConfig::from_vars(Some("sloppy"), Some("not-a-number"));
        assert_eq!(config, ReaderConfig::default());
    }
}
