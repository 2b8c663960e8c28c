// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! Parameters are the named, normalized signals that the
//! [SignalNormalizer](crate::normalizer::SignalNormalizer) derives from each
//! tracking frame, and that [Transforms](crate::transform::Transform) read to
//! compute action values.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use strum_macros::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

/// The underlying primitive of every parameter and action value.
pub type ParameterType = f64;

/// Identifies one semantic signal. The set is fixed; the normalizer knows how
/// to produce each of them.
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    EnumCount,
    EnumIter,
    EnumString,
    Eq,
    Hash,
    IntoStaticStr,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum ParamName {
    BodyAngleX,
    BodyAngleY,
    BodyAngleZ,
    AngleX,
    AngleY,
    AngleZ,
    MouthX,
    MouthOpenY,
    MouthForm,
    #[strum(serialize = "BROW_L_Y")]
    #[serde(rename = "BROW_L_Y")]
    BrowLY,
    #[strum(serialize = "BROW_R_Y")]
    #[serde(rename = "BROW_R_Y")]
    BrowRY,
    EyeBallX,
    EyeBallY,
    EyeROpen,
    EyeLOpen,
}

/// The current value of one [ParamName].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Which signal this is.
    pub name: ParamName,
    /// Its most recent value. Zero until the normalizer first writes it.
    pub value: ParameterType,
}
impl Parameter {
    /// Creates a [Parameter] with the given value.
    pub fn new_with(name: ParamName, value: ParameterType) -> Self {
        Self { name, value }
    }

    /// Wraps the [Parameter] so that it can be shared among transformers.
    pub fn into_shared(self) -> SharedParameter {
        Arc::new(RwLock::new(self))
    }
}
impl From<ParamName> for Parameter {
    fn from(name: ParamName) -> Self {
        Self::new_with(name, ParameterType::default())
    }
}

/// A [Parameter] that many transformers can read and the normalizer can
/// update in place. Two [SharedParameter]s refer to the same signal instance
/// only if [Arc::ptr_eq] says so.
pub type SharedParameter = Arc<RwLock<Parameter>>;

/// Creates a fresh, unshared parameter reference with a zero value.
pub fn shared(name: ParamName) -> SharedParameter {
    Parameter::from(name).into_shared()
}

/// Returns the name of a shared parameter.
pub fn name_of(parameter: &SharedParameter) -> Option<ParamName> {
    parameter.read().ok().map(|p| p.name)
}

/// Returns the value of a shared parameter. A poisoned lock reads as zero.
pub fn value_of(parameter: &SharedParameter) -> ParameterType {
    if let Ok(p) = parameter.read() {
        p.value
    } else {
        ParameterType::default()
    }
}
