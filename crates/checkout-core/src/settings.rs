//! # Provider Settings
//!
//! Providers describe the settings they need with [`SettingField`] and read
//! them through a [`SettingsStore`] when they are initialized.

use crate::error::{CheckoutError, CheckoutResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

/// Input widget used to edit a setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKind {
    Text,
    Password,
    Checkbox,
}

/// Describes one setting a provider reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingField {
    pub key: &'static str,
    pub label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<&'static str>,
    pub kind: SettingKind,
}

impl SettingField {
    pub fn text(key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            comment: None,
            kind: SettingKind::Text,
        }
    }

    pub fn password(key: &'static str, label: &'static str) -> Self {
        Self {
            kind: SettingKind::Password,
            ..Self::text(key, label)
        }
    }

    pub fn checkbox(key: &'static str, label: &'static str) -> Self {
        Self {
            kind: SettingKind::Checkbox,
            ..Self::text(key, label)
        }
    }

    pub fn with_comment(mut self, comment: &'static str) -> Self {
        self.comment = Some(comment);
        self
    }
}

/// Read-only source of provider settings
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Setting value, or a configuration error naming the missing key
    fn require(&self, key: &str) -> CheckoutResult<String> {
        self.get(key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| CheckoutError::Configuration(format!("Setting '{}' is not set", key)))
    }

    /// Checkbox settings: `1`, `true`, `on` and `yes` are enabled
    fn flag(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "on" | "yes"))
            .unwrap_or(false)
    }
}

/// Settings read from environment variables.
///
/// `stripe_api_key` is looked up as `STRIPE_API_KEY`.
#[derive(Debug, Clone, Default)]
pub struct EnvSettings {
    prefix: Option<String>,
}

impl EnvSettings {
    /// Load `.env` if present and read from the process environment
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::default()
    }

    /// Builder: prepend `PREFIX_` to every variable name
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn var_name(&self, key: &str) -> String {
        let key = key.replace(['.', '-'], "_").to_uppercase();
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.to_uppercase(), key),
            None => key,
        }
    }
}

impl SettingsStore for EnvSettings {
    fn get(&self, key: &str) -> Option<String> {
        env::var(self.var_name(key)).ok()
    }
}

/// Settings held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    values: HashMap<String, String>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}
