// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! The [ActionParameterMapper] binds [Action]s to [ParameterTransformer]s and
//! owns the one shared instance of each parameter those transformers read.

use crate::{
    actions::{Action, Actuator, MouseSensitivity},
    params::{name_of, shared, ParamName, ParameterType, SharedParameter},
    transform::{ParameterTransformer, Transform, TransformError},
};
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;

/// Caller errors reported by the [ActionParameterMapper].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MappingError {
    /// Nothing is bound to the action.
    #[error("no transformer is bound to {0}")]
    Unbound(Action),

    /// The transformer reads fewer parameters than its transform needs.
    #[error("{action} needs at least {expected} parameter(s) but its transformer has {actual}")]
    Arity {
        #[allow(missing_docs)]
        action: Action,
        #[allow(missing_docs)]
        expected: usize,
        #[allow(missing_docs)]
        actual: usize,
    },

    /// The transform itself is malformed.
    #[error("{action} has an invalid transform: {source}")]
    Invalid {
        #[allow(missing_docs)]
        action: Action,
        #[allow(missing_docs)]
        source: TransformError,
    },

    /// The bound transformer couldn't produce a value.
    #[error("couldn't evaluate {action}: {source}")]
    Evaluation {
        #[allow(missing_docs)]
        action: Action,
        #[allow(missing_docs)]
        source: TransformError,
    },
}

/// Routes parameter values to actions.
///
/// Each [Action] has at most one [ParameterTransformer]. Binding a new one
/// replaces the old one in place, so iteration order is the order in which
/// actions were first bound. Every transformer that reads a given
/// [ParamName] reads the same [SharedParameter], so one call to
/// [ActionParameterMapper::set_parameter_value()] is visible to all of them.
#[derive(Debug, Default)]
pub struct ActionParameterMapper {
    bindings: Vec<(Action, ParameterTransformer)>,
    parameters: HashMap<ParamName, SharedParameter>,
}
impl ActionParameterMapper {
    fn binding_index(&self, action: Action) -> Option<usize> {
        self.bindings.iter().position(|(a, _)| *a == action)
    }

    /// Returns the transformer bound to `action`, if any.
    pub fn binding(&self, action: Action) -> Option<&ParameterTransformer> {
        self.bindings
            .iter()
            .find(|(a, _)| *a == action)
            .map(|(_, transformer)| transformer)
    }

    /// Returns whether `action` has a transformer.
    pub fn is_bound(&self, action: Action) -> bool {
        self.binding_index(action).is_some()
    }

    /// The bound actions, in binding order.
    pub fn bound_actions(&self) -> Vec<Action> {
        self.bindings.iter().map(|(action, _)| *action).collect()
    }

    /// Returns the shared instance for `name`, if any transformer has ever
    /// referenced it.
    pub fn parameter(&self, name: ParamName) -> Option<&SharedParameter> {
        self.parameters.get(&name)
    }

    /// Binds `transformer` to `action`, replacing any previous binding, and
    /// reconciles the transformer's parameter references with the shared
    /// instances.
    pub fn create_mapping(
        &mut self,
        action: Action,
        transformer: ParameterTransformer,
    ) -> Result<(), MappingError> {
        transformer
            .transform()
            .validate()
            .map_err(|source| MappingError::Invalid { action, source })?;
        let expected = transformer.transform().required_parameters();
        let actual = transformer.parameters().len();
        if actual < expected {
            return Err(MappingError::Arity {
                action,
                expected,
                actual,
            });
        }

        let references: Vec<SharedParameter> = transformer.parameters().to_vec();
        self.install(action, transformer);
        for parameter in references {
            self.set_parameter(parameter, action);
        }
        log::debug!(
            "bound {action} to {:?} over {:?}",
            self.binding(action).map(|t| t.transform()),
            self.binding(action).map(|t| t.parameter_names())
        );
        Ok(())
    }

    /// Binds `action` to a transform with no parameters yet. Add them with
    /// [ActionParameterMapper::add_parameter()]; until then, evaluating the
    /// action fails.
    pub fn create_empty_mapping(
        &mut self,
        action: Action,
        transform: Transform,
    ) -> Result<(), MappingError> {
        transform
            .validate()
            .map_err(|source| MappingError::Invalid { action, source })?;
        self.install(
            action,
            ParameterTransformer::new_with_parameters(transform, Vec::default()),
        );
        Ok(())
    }

    fn install(&mut self, action: Action, transformer: ParameterTransformer) {
        if let Some(index) = self.binding_index(action) {
            self.bindings[index].1 = transformer;
        } else {
            self.bindings.push((action, transformer));
        }
    }

    /// Unbinds `action`, returning its transformer. The parameters it read
    /// stay registered.
    pub fn remove_mapping(&mut self, action: Action) -> Option<ParameterTransformer> {
        let index = self.binding_index(action)?;
        log::debug!("unbound {action}");
        Some(self.bindings.remove(index).1)
    }

    /// Reconciles one of `action`'s parameter references with the shared
    /// instance for its name. If the name is already known, the first
    /// reference in `action`'s transformer with that name that isn't already
    /// the shared instance is replaced by it. Otherwise `parameter` becomes
    /// the shared instance. Does nothing if `action` is unbound.
    pub fn set_parameter(&mut self, parameter: SharedParameter, action: Action) {
        let Some(index) = self.binding_index(action) else {
            return;
        };
        let Some(name) = name_of(&parameter) else {
            return;
        };
        if let Some(canonical) = self.parameters.get(&name) {
            let references = self.bindings[index].1.parameters_mut();
            if let Some(slot) = references
                .iter_mut()
                .find(|p| !Arc::ptr_eq(&**p, canonical) && name_of(&**p) == Some(name))
            {
                *slot = Arc::clone(canonical);
            }
        } else {
            log::debug!("registered parameter {name}");
            self.parameters.insert(name, parameter);
        }
    }

    /// Appends a reference to `name` to `action`'s transformer, creating the
    /// shared instance if this is the first reference to it. Does nothing if
    /// `action` is unbound.
    pub fn add_parameter(&mut self, name: ParamName, action: Action) {
        let Some(index) = self.binding_index(action) else {
            return;
        };
        let parameter = Arc::clone(
            self.parameters
                .entry(name)
                .or_insert_with(|| shared(name)),
        );
        self.bindings[index].1.parameters_mut().push(parameter);
    }

    /// Updates the shared parameter for `name`. Names that no transformer has
    /// ever referenced are ignored.
    pub fn set_parameter_value(&mut self, name: ParamName, value: ParameterType) {
        if let Some(parameter) = self.parameters.get(&name) {
            if let Ok(mut parameter) = parameter.write() {
                parameter.value = value;
            }
        }
    }

    /// Sets every known parameter back to zero.
    pub fn reset_parameters(&mut self) {
        for name in self.parameters.keys().copied().collect::<Vec<_>>() {
            self.set_parameter_value(name, ParameterType::default());
        }
    }

    /// Evaluates the transformer bound to `action`.
    pub fn get_action_value(&self, action: Action) -> Result<ParameterType, MappingError> {
        self.binding(action)
            .ok_or(MappingError::Unbound(action))?
            .action_value()
            .map_err(|source| MappingError::Evaluation { action, source })
    }

    /// The current value of every bound action, in binding order.
    pub fn action_values(&self) -> Result<Vec<(Action, ParameterType)>, MappingError> {
        self.bindings
            .iter()
            .map(|(action, transformer)| {
                transformer
                    .action_value()
                    .map(|value| (*action, value))
                    .map_err(|source| MappingError::Evaluation {
                        action: *action,
                        source,
                    })
            })
            .collect()
    }

    /// Evaluates every binding and triggers its action with the result, in
    /// binding order. A binding that fails to evaluate is skipped; the first
    /// such failure is returned after all the others have fired.
    pub fn trigger_actions(
        &self,
        sensitivity: MouseSensitivity,
        actuator: &mut dyn Actuator,
    ) -> Result<(), MappingError> {
        let mut first_error = None;
        for (action, transformer) in self.bindings.iter() {
            match transformer.action_value() {
                Ok(value) => action.trigger(value, sensitivity, actuator),
                Err(source) => {
                    if first_error.is_none() {
                        first_error = Some(MappingError::Evaluation {
                            action: *action,
                            source,
                        });
                    }
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        actions::{ActuatorEffect, Key, RecordingActuator},
        params::value_of,
    };

    fn head_up() -> ParameterTransformer {
        ParameterTransformer::new_with(
            Transform::threshold(Transform::Single, 15.0, 1.0, 0.0),
            &[ParamName::AngleY],
        )
    }

    #[test]
    fn unbound_lookup_fails() {
        let mapper = ActionParameterMapper::default();
        assert_eq!(
            mapper.get_action_value(Action::ArrowUp),
            Err(MappingError::Unbound(Action::ArrowUp))
        );
    }

    #[test]
    fn parameters_default_to_zero() {
        let mut mapper = ActionParameterMapper::default();
        mapper
            .create_mapping(
                Action::MouseUp,
                ParameterTransformer::new_with(Transform::Single, &[ParamName::EyeBallY]),
            )
            .unwrap();
        assert_eq!(mapper.get_action_value(Action::MouseUp), Ok(0.0));
    }

    #[test]
    fn shared_parameter_is_reconciled_across_actions() {
        let mut mapper = ActionParameterMapper::default();
        mapper.create_mapping(Action::ArrowUp, head_up()).unwrap();
        mapper
            .create_mapping(
                Action::MouseDown,
                ParameterTransformer::new_with(Transform::Single, &[ParamName::AngleY]),
            )
            .unwrap();

        let a = &mapper.binding(Action::ArrowUp).unwrap().parameters()[0];
        let b = &mapper.binding(Action::MouseDown).unwrap().parameters()[0];
        assert!(Arc::ptr_eq(a, b), "both actions should read one instance");
        assert!(Arc::ptr_eq(a, mapper.parameter(ParamName::AngleY).unwrap()));

        mapper.set_parameter_value(ParamName::AngleY, 20.0);
        assert_eq!(mapper.get_action_value(Action::ArrowUp), Ok(1.0));
        assert_eq!(mapper.get_action_value(Action::MouseDown), Ok(20.0));
    }

    #[test]
    fn binding_the_same_transformer_twice_shares_its_parameters() {
        let mut mapper = ActionParameterMapper::default();
        let preset = head_up();
        mapper.create_mapping(Action::ArrowUp, preset.clone()).unwrap();
        mapper.create_mapping(Action::PressW, preset).unwrap();
        mapper.set_parameter_value(ParamName::AngleY, 16.0);
        assert_eq!(mapper.get_action_value(Action::ArrowUp), Ok(1.0));
        assert_eq!(mapper.get_action_value(Action::PressW), Ok(1.0));
    }

    #[test]
    fn rebinding_an_action_over_the_same_name_keeps_the_shared_instance() {
        let mut mapper = ActionParameterMapper::default();
        let single = || ParameterTransformer::new_with(Transform::Single, &[ParamName::AngleY]);
        mapper.create_mapping(Action::ArrowUp, single()).unwrap();
        let canonical = Arc::clone(mapper.parameter(ParamName::AngleY).unwrap());

        let replacement = single();
        assert!(!Arc::ptr_eq(&replacement.parameters()[0], &canonical));
        mapper.create_mapping(Action::ArrowUp, replacement).unwrap();

        assert_eq!(mapper.bound_actions(), vec![Action::ArrowUp]);
        assert!(Arc::ptr_eq(
            &mapper.binding(Action::ArrowUp).unwrap().parameters()[0],
            &canonical
        ));
        assert!(Arc::ptr_eq(
            mapper.parameter(ParamName::AngleY).unwrap(),
            &canonical
        ));

        mapper.set_parameter_value(ParamName::AngleY, 3.0);
        assert_eq!(value_of(&canonical), 3.0);
        assert_eq!(mapper.get_action_value(Action::ArrowUp), Ok(3.0));
    }

    #[test]
    fn duplicate_references_in_one_transformer_converge() {
        let mut mapper = ActionParameterMapper::default();
        mapper
            .create_mapping(
                Action::MouseLeft,
                ParameterTransformer::new_with(
                    Transform::Average,
                    &[ParamName::MouthX, ParamName::MouthX, ParamName::EyeBallX],
                ),
            )
            .unwrap();
        let refs = mapper.binding(Action::MouseLeft).unwrap().parameters();
        assert!(Arc::ptr_eq(&refs[0], &refs[1]));

        mapper.set_parameter_value(ParamName::MouthX, 0.6);
        mapper.set_parameter_value(ParamName::EyeBallX, 0.3);
        assert_eq!(mapper.get_action_value(Action::MouseLeft), Ok(0.5));
    }

    #[test]
    fn rebinding_replaces_rather_than_merges() {
        let mut mapper = ActionParameterMapper::default();
        mapper.create_mapping(Action::ArrowUp, head_up()).unwrap();
        mapper
            .create_mapping(
                Action::ArrowUp,
                ParameterTransformer::new_with(
                    Transform::threshold(Transform::Single, 0.6, 1.0, 0.0),
                    &[ParamName::MouthOpenY],
                ),
            )
            .unwrap();
        assert_eq!(mapper.bound_actions(), vec![Action::ArrowUp]);
        assert_eq!(
            mapper.binding(Action::ArrowUp).unwrap().parameter_names(),
            vec![ParamName::MouthOpenY]
        );

        // The old head angle no longer drives the action.
        mapper.set_parameter_value(ParamName::AngleY, 25.0);
        let mut actuator = RecordingActuator::default();
        mapper
            .trigger_actions(MouseSensitivity::default(), &mut actuator)
            .unwrap();
        assert!(actuator.effects().is_empty());

        mapper.set_parameter_value(ParamName::MouthOpenY, 0.7);
        mapper
            .trigger_actions(MouseSensitivity::default(), &mut actuator)
            .unwrap();
        assert_eq!(actuator.effects(), vec![ActuatorEffect::Tapped(Key::Up)]);
    }

    #[test]
    fn rebinding_keeps_original_order() {
        let mut mapper = ActionParameterMapper::default();
        for action in [Action::ArrowUp, Action::ArrowDown, Action::PressQ] {
            mapper.create_mapping(action, head_up()).unwrap();
        }
        mapper.create_mapping(Action::ArrowDown, head_up()).unwrap();
        assert_eq!(
            mapper.bound_actions(),
            vec![Action::ArrowUp, Action::ArrowDown, Action::PressQ]
        );
    }

    #[test]
    fn unknown_parameter_writes_are_ignored() {
        let mut mapper = ActionParameterMapper::default();
        mapper.create_mapping(Action::ArrowUp, head_up()).unwrap();
        mapper.set_parameter_value(ParamName::BrowLY, 100.0);
        assert!(mapper.parameter(ParamName::BrowLY).is_none());

        let mut actuator = RecordingActuator::default();
        mapper
            .trigger_actions(MouseSensitivity::default(), &mut actuator)
            .unwrap();
        assert!(actuator.effects().is_empty());
    }

    #[test]
    fn arity_is_checked_at_bind_time() {
        let mut mapper = ActionParameterMapper::default();
        assert_eq!(
            mapper.create_mapping(
                Action::MouseUp,
                ParameterTransformer::new_with(Transform::Average, &[])
            ),
            Err(MappingError::Arity {
                action: Action::MouseUp,
                expected: 1,
                actual: 0
            })
        );
        assert!(!mapper.is_bound(Action::MouseUp));
    }

    #[test]
    fn empty_mapping_fills_in_with_add_parameter() {
        let mut mapper = ActionParameterMapper::default();
        mapper
            .create_empty_mapping(Action::MouseRight, Transform::Average)
            .unwrap();
        assert!(matches!(
            mapper.get_action_value(Action::MouseRight),
            Err(MappingError::Evaluation { .. })
        ));

        mapper.add_parameter(ParamName::EyeBallX, Action::MouseRight);
        mapper.add_parameter(ParamName::MouthX, Action::MouseRight);
        mapper.set_parameter_value(ParamName::EyeBallX, 1.0);
        assert_eq!(mapper.get_action_value(Action::MouseRight), Ok(0.5));

        // Adding to an unbound action does nothing.
        mapper.add_parameter(ParamName::AngleZ, Action::MouseLeft);
        assert!(mapper.parameter(ParamName::AngleZ).is_none());
    }

    #[test]
    fn add_parameter_reuses_shared_instance() {
        let mut mapper = ActionParameterMapper::default();
        mapper.create_mapping(Action::ArrowUp, head_up()).unwrap();
        mapper
            .create_empty_mapping(Action::MouseUp, Transform::Single)
            .unwrap();
        mapper.add_parameter(ParamName::AngleY, Action::MouseUp);
        assert!(Arc::ptr_eq(
            &mapper.binding(Action::MouseUp).unwrap().parameters()[0],
            &mapper.binding(Action::ArrowUp).unwrap().parameters()[0],
        ));
    }

    #[test]
    fn set_parameter_on_unbound_action_does_nothing() {
        let mut mapper = ActionParameterMapper::default();
        mapper.set_parameter(shared(ParamName::AngleX), Action::ArrowLeft);
        assert!(mapper.parameter(ParamName::AngleX).is_none());
    }

    #[test]
    fn failing_binding_does_not_block_the_others() {
        let mut mapper = ActionParameterMapper::default();
        mapper
            .create_empty_mapping(Action::MouseUp, Transform::Single)
            .unwrap();
        mapper.create_mapping(Action::ArrowUp, head_up()).unwrap();
        mapper.set_parameter_value(ParamName::AngleY, 30.0);

        let mut actuator = RecordingActuator::default();
        let result = mapper.trigger_actions(MouseSensitivity::default(), &mut actuator);
        assert!(matches!(
            result,
            Err(MappingError::Evaluation {
                action: Action::MouseUp,
                ..
            })
        ));
        assert_eq!(actuator.effects(), vec![ActuatorEffect::Tapped(Key::Up)]);
    }

    #[test]
    fn remove_and_reset() {
        let mut mapper = ActionParameterMapper::default();
        mapper.create_mapping(Action::ArrowUp, head_up()).unwrap();
        mapper.set_parameter_value(ParamName::AngleY, 18.0);
        assert!(mapper.remove_mapping(Action::ArrowUp).is_some());
        assert!(mapper.remove_mapping(Action::ArrowUp).is_none());
        assert_eq!(
            value_of(mapper.parameter(ParamName::AngleY).unwrap()),
            18.0,
            "unbinding should leave the parameter registered"
        );
        mapper.reset_parameters();
        assert_eq!(value_of(mapper.parameter(ParamName::AngleY).unwrap()), 0.0);
    }
}
