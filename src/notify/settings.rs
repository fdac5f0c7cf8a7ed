//! User notification preferences.

use crate::common::persistence::SettingsStorage;
use crate::common::types::HookType;
use crate::error::{require_boolean, require_object, require_string, OrchestratorError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Default sound profile
pub const DEFAULT_SOUND: &str = "chime";

/// Default alert lifetime before the sweep removes it
pub const DEFAULT_AUTO_DELETE_MINUTES: i64 = 30;

/// Which hook types raise alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnabledHooks {
    pub bash: bool,
    pub edit: bool,
    pub plan: bool,
    pub question: bool,
}

impl Default for EnabledHooks {
    fn default() -> Self {
        Self {
            bash: true,
            edit: true,
            plan: true,
            question: true,
        }
    }
}

impl EnabledHooks {
    pub fn is_enabled(&self, hook: HookType) -> bool {
        match hook {
            HookType::Bash => self.bash,
            HookType::Edit => self.edit,
            HookType::Plan => self.plan,
            HookType::Question => self.question,
        }
    }

    pub fn set(&mut self, hook: HookType, enabled: bool) {
        match hook {
            HookType::Bash => self.bash = enabled,
            HookType::Edit => self.edit = enabled,
            HookType::Plan => self.plan = enabled,
            HookType::Question => self.question = enabled,
        }
    }
}

/// Persisted notification preferences.
///
/// Missing keys take their defaults on load, so state written by an older
/// version keeps working when new settings are introduced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationSettings {
    pub sound_enabled: bool,
    pub sound_type: String,
    pub browser_notifications: bool,
    /// Non-positive disables the age sweep
    pub auto_delete_minutes: i64,
    pub enabled_hooks: EnabledHooks,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            sound_type: DEFAULT_SOUND.to_string(),
            browser_notifications: false,
            auto_delete_minutes: DEFAULT_AUTO_DELETE_MINUTES,
            enabled_hooks: EnabledHooks::default(),
        }
    }
}

impl NotificationSettings {
    /// Load persisted settings merged over defaults. Never fails.
    pub fn load(storage: &dyn SettingsStorage) -> (Self, Option<serde_json::Error>) {
        match storage.load() {
            None => (Self::default(), None),
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(settings) => (settings, None),
                Err(e) => (Self::default(), Some(e)),
            },
        }
    }

    /// Serialize and write through to storage
    pub fn persist(&self, storage: &dyn SettingsStorage) -> Result<(), OrchestratorError> {
        let raw = serde_json::to_string(self)
            .map_err(|e| OrchestratorError::other(e.to_string(), "SERIALIZATION_ERROR"))?;
        storage.save(&raw)
    }

    /// Shallow merge: every field present in the patch replaces the current one
    pub fn merge(&mut self, patch: SettingsPatch) {
        if let Some(v) = patch.sound_enabled {
            self.sound_enabled = v;
        }
        if let Some(v) = patch.sound_type {
            self.sound_type = v;
        }
        if let Some(v) = patch.browser_notifications {
            self.browser_notifications = v;
        }
        if let Some(v) = patch.auto_delete_minutes {
            self.auto_delete_minutes = v;
        }
        if let Some(v) = patch.enabled_hooks {
            self.enabled_hooks = v;
        }
    }
}

/// Partial settings update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub sound_enabled: Option<bool>,
    pub sound_type: Option<String>,
    pub browser_notifications: Option<bool>,
    pub auto_delete_minutes: Option<i64>,
    pub enabled_hooks: Option<EnabledHooks>,
}

impl SettingsPatch {
    /// Validate an untyped patch such as `{"soundEnabled": false}`
    pub fn from_json(value: &Value) -> Result<Self, OrchestratorError> {
        let object = require_object(Some(value), "settings")?;
        let mut patch = SettingsPatch::default();

        for (key, field) in object {
            match key.as_str() {
                "soundEnabled" => patch.sound_enabled = Some(require_boolean(Some(field), key)?),
                "soundType" => patch.sound_type = Some(require_string(Some(field), key)?.to_string()),
                "browserNotifications" => {
                    patch.browser_notifications = Some(require_boolean(Some(field), key)?)
                }
                "autoDeleteMinutes" => {
                    let minutes = field.as_i64().ok_or_else(|| {
                        OrchestratorError::validation("autoDeleteMinutes must be an integer")
                            .with_details(json!({ "field": key }))
                    })?;
                    patch.auto_delete_minutes = Some(minutes);
                }
                "enabledHooks" => {
                    let hooks = require_object(Some(field), key)?;
                    let mut enabled = EnabledHooks::default();
                    for hook in HookType::ALL {
                        if let Some(flag) = hooks.get(hook.label()) {
                            let path = format!("enabledHooks.{}", hook.label());
                            enabled.set(hook, require_boolean(Some(flag), &path)?);
                        }
                    }
                    patch.enabled_hooks = Some(enabled);
                }
                other => {
                    return Err(OrchestratorError::validation(format!("unknown setting '{}'", other))
                        .with_details(json!({ "field": other })))
                }
            }
        }

        Ok(patch)
    }
}
