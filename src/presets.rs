// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! Named, ready-made transformers to choose from when rebinding an action.

use crate::{
    params::ParamName,
    transform::{ParameterTransformer, Transform},
};
use serde::{Deserialize, Serialize};

/// A named [ParameterTransformer] recipe.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Preset {
    /// What a menu shows, e.g. "Head Up".
    pub name: String,
    /// The recipe. Each [PresetLibrary::instantiate()] hands out a fresh
    /// copy.
    pub transformer: ParameterTransformer,
}
impl Preset {
    /// Creates a [Preset].
    pub fn new_with(name: &str, transform: Transform, parameters: &[ParamName]) -> Self {
        Self {
            name: name.to_string(),
            transformer: ParameterTransformer::new_with(transform, parameters),
        }
    }
}

/// An ordered collection of [Preset]s.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PresetLibrary {
    presets: Vec<Preset>,
}
impl Default for PresetLibrary {
    fn default() -> Self {
        let head = 15.0;
        let body = 5.0;
        Self {
            presets: vec![
                Preset::new_with(
                    "Head Up",
                    Transform::threshold(Transform::Single, head, 1.0, 0.0),
                    &[ParamName::AngleY],
                ),
                Preset::new_with(
                    "Head Down",
                    Transform::threshold(Transform::Single, -head, 0.0, -1.0),
                    &[ParamName::AngleY],
                ),
                Preset::new_with(
                    "Head Right",
                    Transform::threshold(Transform::Single, head, 1.0, 0.0),
                    &[ParamName::AngleX],
                ),
                Preset::new_with(
                    "Head Left",
                    Transform::threshold(Transform::Single, -head, 0.0, -1.0),
                    &[ParamName::AngleX],
                ),
                Preset::new_with(
                    "Body Up",
                    Transform::threshold(Transform::Single, body, 1.0, 0.0),
                    &[ParamName::BodyAngleY],
                ),
                Preset::new_with(
                    "Body Down",
                    Transform::threshold(Transform::Single, -body, 0.0, -1.0),
                    &[ParamName::BodyAngleY],
                ),
                // The body's x translation grows toward the camera's right,
                // which is the user's left.
                Preset::new_with(
                    "Body Right",
                    Transform::threshold(Transform::Single, -body, 0.0, -1.0),
                    &[ParamName::BodyAngleX],
                ),
                Preset::new_with(
                    "Body Left",
                    Transform::threshold(Transform::Single, body, 1.0, 0.0),
                    &[ParamName::BodyAngleX],
                ),
                Preset::new_with(
                    "Mouth Open",
                    Transform::threshold(Transform::Single, 0.6, 1.0, 0.0),
                    &[ParamName::MouthOpenY],
                ),
                Preset::new_with(
                    "Mouth Closed",
                    Transform::threshold(Transform::Single, 0.3, 0.0, 1.0),
                    &[ParamName::MouthOpenY],
                ),
            ],
        }
    }
}
impl PresetLibrary {
    /// Creates a library from the given presets.
    pub fn new_with(presets: Vec<Preset>) -> Self {
        Self { presets }
    }

    /// All presets, in menu order.
    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    /// Finds a preset by name, ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<&Preset> {
        self.presets
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Builds a new transformer from the named preset. Its parameters are
    /// fresh, so binding it never shares state with the library.
    pub fn instantiate(&self, name: &str) -> Option<ParameterTransformer> {
        self.get(name).map(|preset| {
            ParameterTransformer::new_with(
                preset.transformer.transform().clone(),
                &preset.transformer.parameter_names(),
            )
        })
    }

    /// Adds a preset, replacing any with the same name.
    pub fn insert(&mut self, preset: Preset) {
        if let Some(existing) = self
            .presets
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(&preset.name))
        {
            *existing = preset;
        } else {
            self.presets.push(preset);
        }
    }
}
