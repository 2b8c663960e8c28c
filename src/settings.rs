// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! The user's persistent preferences.

use crate::{
    actions::{Action, MouseSensitivity},
    mapper::MappingError,
    presets::PresetLibrary,
    session::Session,
};
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};

/// Binds an [Action] to a [Preset](crate::presets::Preset) by name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Binding {
    #[allow(missing_docs)]
    pub action: Action,
    #[allow(missing_docs)]
    pub preset: String,
}
impl Binding {
    /// Creates a [Binding].
    pub fn new_with(action: Action, preset: &str) -> Self {
        Self {
            action,
            preset: preset.to_string(),
        }
    }
}

/// Global preferences.
#[derive(Debug, Derivative, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    /// Pixels of pointer travel per unit of action value.
    #[derivative(Default(value = "MouseSensitivity::DEFAULT_VALUE"))]
    #[serde(default = "Settings::default_mouse_sensitivity")]
    pub mouse_sensitivity: i32,

    /// Bindings to install at startup, in order.
    #[serde(default)]
    pub bindings: Vec<Binding>,

    /// Presets to offer instead of the built-in ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presets: Option<PresetLibrary>,
}
impl Settings {
    fn default_mouse_sensitivity() -> i32 {
        MouseSensitivity::DEFAULT_VALUE
    }

    /// Reads settings from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        log::info!("Loading settings from {path:?}");
        let mut contents = String::new();
        let mut file = File::open(path)
            .map_err(|e| anyhow::format_err!("Couldn't open {path:?}: {}", e))?;
        file.read_to_string(&mut contents)
            .map_err(|e| anyhow::format_err!("Couldn't read {path:?}: {}", e))?;
        serde_json::from_str(&contents)
            .map_err(|e| anyhow::format_err!("Couldn't parse {path:?}: {}", e))
    }

    /// Writes settings to a JSON file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self)
            .map_err(|_| anyhow::format_err!("Unable to serialize settings JSON"))?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| {
                anyhow::format_err!("Unable to create {path:?} parent directories: {}", e)
            })?;
        }
        let mut file = File::create(path)
            .map_err(|e| anyhow::format_err!("Unable to create {path:?}: {}", e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| anyhow::format_err!("Unable to write {path:?}: {}", e))?;
        Ok(())
    }

    #[allow(missing_docs)]
    pub fn mouse_sensitivity(&self) -> MouseSensitivity {
        MouseSensitivity(self.mouse_sensitivity)
    }

    /// The configured presets, or the built-in ones.
    pub fn preset_library(&self) -> PresetLibrary {
        self.presets.clone().unwrap_or_default()
    }

    /// Installs every binding into `session`. A binding that names an
    /// unknown preset is skipped with a warning.
    pub fn apply_bindings(&self, session: &mut Session) -> Result<(), MappingError> {
        let library = self.preset_library();
        for binding in self.bindings.iter() {
            if let Some(transformer) = library.instantiate(&binding.preset) {
                session.create_mapping(binding.action, transformer)?;
            } else {
                log::warn!(
                    "{} is bound to unknown preset {:?}",
                    binding.action,
                    binding.preset
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::LoggingActuator;

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert_eq!(settings.mouse_sensitivity(), MouseSensitivity(10));
        assert!(settings.bindings.is_empty());
        assert!(settings.presets.is_none());
        assert_eq!(
            settings.preset_library().presets().len(),
            PresetLibrary::default().presets().len()
        );
    }

    #[test]
    fn missing_fields_take_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"bindings":[{"action":"ARROW_UP","preset":"Head Up"}]}"#)
                .unwrap();
        assert_eq!(settings.mouse_sensitivity, 10);
        assert_eq!(
            settings.bindings,
            vec![Binding::new_with(Action::ArrowUp, "Head Up")]
        );
    }

    #[test]
    fn keys_are_kebab_case() {
        let settings = Settings {
            mouse_sensitivity: 4,
            ..Default::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains("\"mouse-sensitivity\":4"), "{json}");
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join(format!("grimace-settings-{}", std::process::id()));
        let path = dir.join("nested").join("settings.json");
        let settings = Settings {
            mouse_sensitivity: 25,
            bindings: vec![
                Binding::new_with(Action::ArrowUp, "Head Up"),
                Binding::new_with(Action::PressW, "Mouth Open"),
            ],
            presets: None,
        };
        settings.save(&path).unwrap();
        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.mouse_sensitivity, 25);
        assert_eq!(loaded.bindings, settings.bindings);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_reports_missing_file() {
        let e = Settings::load(Path::new("/this/path/does/not/exist.json")).unwrap_err();
        assert!(e.to_string().starts_with("Couldn't open"));
    }

    #[test]
    fn bindings_install_known_presets() {
        let settings = Settings {
            bindings: vec![
                Binding::new_with(Action::ArrowUp, "Head Up"),
                Binding::new_with(Action::ArrowDown, "No Such Preset"),
            ],
            ..Default::default()
        };
        let mut session = Session::new_with(
            Box::<LoggingActuator>::default(),
            settings.mouse_sensitivity(),
        );
        settings.apply_bindings(&mut session).unwrap();
        assert_eq!(session.mapper().bound_actions(), vec![Action::ArrowUp]);
    }
}
