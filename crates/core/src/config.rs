//! Runtime configuration for providers that spawn helper threads.

use serde::Deserialize;

use crate::error::{EmitterError, EmitterResult};

pub const ENV_ASYNC_THREAD_NAME: &str = "HERALD_ASYNC_THREAD_NAME";
pub const ENV_ASYNC_STACK_SIZE: &str = "HERALD_ASYNC_STACK_SIZE";

const DEFAULT_ASYNC_THREAD_NAME: &str = "herald-async";

/// Settings applied to every thread a threaded provider starts
/// (`async_wait`, `async_on`, `async_once`).
///
/// All fields are defaulted, so the struct can be embedded in a larger
/// application config and deserialized from a partial document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Name given to spawned helper threads.
    pub async_thread_name: String,

    /// Stack size in bytes for helper threads; platform default when unset.
    pub async_stack_size: Option<usize>,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            async_thread_name: DEFAULT_ASYNC_THREAD_NAME.to_string(),
            async_stack_size: None,
        }
    }
}

impl EmitterConfig {
    /// Defaults overridden by `HERALD_ASYNC_THREAD_NAME` and
    /// `HERALD_ASYNC_STACK_SIZE`.
    pub fn from_env() -> EmitterResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> EmitterResult<Self> {
        let mut cfg = Self::default();

        if let Some(name) = lookup(ENV_ASYNC_THREAD_NAME) {
            if name.trim().is_empty() {
                return Err(EmitterError::invalid_config(format!(
                    "{ENV_ASYNC_THREAD_NAME} must not be empty"
                )));
            }
            cfg.async_thread_name = name;
        }

        if let Some(raw) = lookup(ENV_ASYNC_STACK_SIZE) {
            let size = raw.trim().parse::<usize>().map_err(|e| {
                EmitterError::invalid_config(format!("{ENV_ASYNC_STACK_SIZE}: {e}"))
            })?;
            cfg.async_stack_size = Some(size);
        }

        tracing::debug!(
            thread_name = %cfg.async_thread_name,
            stack_size = ?cfg.async_stack_size,
            "emitter config loaded"
        );
        Ok(cfg)
    }

    /// A thread builder carrying these settings.
    pub fn thread_builder(&self) -> std::thread::Builder {
        let builder = std::thread::Builder::new().name(self.async_thread_name.clone());
        match self.async_stack_size {
            Some(size) => builder.stack_size(size),
            None => builder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_overrides() {
        let cfg = EmitterConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg, EmitterConfig::default());
        assert_eq!(cfg.async_thread_name, "herald-async");
    }

    #[test]
    fn env_overrides_apply() {
        let cfg = EmitterConfig::from_lookup(lookup_from(&[
            (ENV_ASYNC_THREAD_NAME, "bus-worker"),
            (ENV_ASYNC_STACK_SIZE, "65536"),
        ]))
        .unwrap();
        assert_eq!(cfg.async_thread_name, "bus-worker");
        assert_eq!(cfg.async_stack_size, Some(65536));
    }

    #[test]
    fn bad_stack_size_is_rejected() {
        let err = EmitterConfig::from_lookup(lookup_from(&[(ENV_ASYNC_STACK_SIZE, "lots")]))
            .unwrap_err();
        match err {
            EmitterError::InvalidConfig(msg) if msg.contains(ENV_ASYNC_STACK_SIZE) => {}
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn empty_thread_name_is_rejected() {
        assert!(EmitterConfig::from_lookup(lookup_from(&[(ENV_ASYNC_THREAD_NAME, "  ")])).is_err());
    }

    #[test]
    fn deserializes_partial_document() {
        let cfg: EmitterConfig = serde_json::from_str(r#"{ "async_stack_size": 131072 }"#).unwrap();
        assert_eq!(cfg.async_thread_name, "herald-async");
        assert_eq!(cfg.async_stack_size, Some(131072));
    }
}
