// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! A [Transform] reduces an ordered list of parameters to a single action
//! value. Transforms are plain data, so they can be saved in presets,
//! inspected, and composed: [Transform::threshold()] and
//! [Transform::piecewise()] wrap another transform and quantize its output.

use crate::params::{name_of, value_of, ParamName, ParameterType, SharedParameter};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Things that can go wrong when evaluating or building a [Transform].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransformError {
    /// The transform needs at least one parameter but was given none.
    #[error("{transform} transform has no parameters to read")]
    NoParameters {
        /// The transform that was starved.
        transform: &'static str,
    },

    /// A piecewise band whose upper edge is below its lower edge.
    #[error("piecewise band is inverted: max {max} < min {min}")]
    InvertedBand {
        #[allow(missing_docs)]
        max: ParameterType,
        #[allow(missing_docs)]
        min: ParameterType,
    },
}

/// The reduction a [ParameterTransformer] applies to its parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Transform {
    /// The value of the first parameter. Others are ignored.
    Single,

    /// The arithmetic mean of all parameters.
    Average,

    /// `above` if the inner transform's value is at least `threshold`,
    /// otherwise `below`.
    Threshold {
        #[allow(missing_docs)]
        inner: Box<Transform>,
        #[allow(missing_docs)]
        threshold: ParameterType,
        #[allow(missing_docs)]
        above: ParameterType,
        #[allow(missing_docs)]
        below: ParameterType,
    },

    /// A three-band step: `above` at or over `max`, `below` at or under `min`,
    /// `inside` in between.
    Piecewise {
        #[allow(missing_docs)]
        inner: Box<Transform>,
        #[allow(missing_docs)]
        max: ParameterType,
        #[allow(missing_docs)]
        min: ParameterType,
        #[allow(missing_docs)]
        above: ParameterType,
        #[allow(missing_docs)]
        below: ParameterType,
        #[serde(default)]
        #[allow(missing_docs)]
        inside: ParameterType,
    },
}
impl Transform {
    /// Wraps `inner` so that it produces a two-state output. The boundary is
    /// inclusive: a value exactly at `threshold` yields `above`.
    pub fn threshold(
        inner: Transform,
        threshold: ParameterType,
        above: ParameterType,
        below: ParameterType,
    ) -> Self {
        Self::Threshold {
            inner: Box::new(inner),
            threshold,
            above,
            below,
        }
    }

    /// Wraps `inner` in a three-band step function. Fails if `max < min`.
    pub fn piecewise(
        inner: Transform,
        max: ParameterType,
        min: ParameterType,
        above: ParameterType,
        below: ParameterType,
        inside: ParameterType,
    ) -> Result<Self, TransformError> {
        if max < min {
            return Err(TransformError::InvertedBand { max, min });
        }
        Ok(Self::Piecewise {
            inner: Box::new(inner),
            max,
            min,
            above,
            below,
            inside,
        })
    }

    /// The smallest number of parameters this transform can be evaluated
    /// over.
    pub fn required_parameters(&self) -> usize {
        match self {
            Transform::Single | Transform::Average => 1,
            Transform::Threshold { inner, .. } | Transform::Piecewise { inner, .. } => {
                inner.required_parameters()
            }
        }
    }

    /// Checks invariants that deserialization can't enforce.
    pub fn validate(&self) -> Result<(), TransformError> {
        match self {
            Transform::Single | Transform::Average => Ok(()),
            Transform::Threshold { inner, .. } => inner.validate(),
            Transform::Piecewise { inner, max, min, .. } => {
                if max < min {
                    Err(TransformError::InvertedBand {
                        max: *max,
                        min: *min,
                    })
                } else {
                    inner.validate()
                }
            }
        }
    }

    /// Computes the transform's output over the current parameter values.
    pub fn evaluate(&self, parameters: &[SharedParameter]) -> Result<ParameterType, TransformError> {
        match self {
            Transform::Single => parameters
                .first()
                .map(value_of)
                .ok_or(TransformError::NoParameters { transform: "single" }),
            Transform::Average => {
                if parameters.is_empty() {
                    return Err(TransformError::NoParameters {
                        transform: "average",
                    });
                }
                let sum: ParameterType = parameters.iter().map(value_of).sum();
                Ok(sum / parameters.len() as ParameterType)
            }
            Transform::Threshold {
                inner,
                threshold,
                above,
                below,
            } => {
                let value = inner.evaluate(parameters)?;
                Ok(if value >= *threshold { *above } else { *below })
            }
            Transform::Piecewise {
                inner,
                max,
                min,
                above,
                below,
                inside,
            } => {
                let value = inner.evaluate(parameters)?;
                Ok(if value >= *max {
                    *above
                } else if value <= *min {
                    *below
                } else {
                    *inside
                })
            }
        }
    }
}

/// A [Transform] together with the ordered parameters it reads. Order
/// matters: [Transform::Single] reads only the first.
///
/// Cloning a [ParameterTransformer] shares its parameter instances rather than
/// copying them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterTransformer {
    transform: Transform,
    #[serde(with = "parameter_names")]
    parameters: Vec<SharedParameter>,
}
impl ParameterTransformer {
    /// Creates a transformer that reads fresh, zero-valued parameters with the
    /// given names. An
    /// [ActionParameterMapper](crate::mapper::ActionParameterMapper) replaces
    /// them with its shared instances when the transformer is bound.
    pub fn new_with(transform: Transform, names: &[ParamName]) -> Self {
        Self {
            transform,
            parameters: names.iter().map(|name| crate::params::shared(*name)).collect(),
        }
    }

    /// Creates a transformer over existing parameter references.
    pub fn new_with_parameters(transform: Transform, parameters: Vec<SharedParameter>) -> Self {
        Self {
            transform,
            parameters,
        }
    }

    /// The reduction applied by this transformer.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// The parameter references, in order.
    pub fn parameters(&self) -> &[SharedParameter] {
        &self.parameters
    }

    pub(crate) fn parameters_mut(&mut self) -> &mut Vec<SharedParameter> {
        &mut self.parameters
    }

    /// The names of the referenced parameters, in order.
    pub fn parameter_names(&self) -> Vec<ParamName> {
        self.parameters.iter().filter_map(name_of).collect()
    }

    /// Evaluates the transform over the current parameter values.
    pub fn action_value(&self) -> Result<ParameterType, TransformError> {
        self.transform.evaluate(&self.parameters)
    }
}

// Parameter references go to disk as bare names. Values are live data, not
// configuration.
mod parameter_names {
    use crate::params::{name_of, shared, ParamName, SharedParameter};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &[SharedParameter], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let names: Vec<ParamName> = value.iter().filter_map(name_of).collect();
        names.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<SharedParameter>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let names = Vec::<ParamName>::deserialize(deserializer)?;
        Ok(names.into_iter().map(shared).collect())
    }
}
