// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! A [Session] owns everything that one face-to-input pipeline needs: the
//! bindings, the per-frame blendshape history, the mouse sensitivity, and the
//! [Actuator] that performs the resulting effects.

use crate::{
    actions::{Action, Actuator, MouseSensitivity},
    detection::Frame,
    mapper::{ActionParameterMapper, MappingError},
    normalizer::SignalNormalizer,
    params::ParameterType,
    transform::{ParameterTransformer, Transform},
};

/// What [Session::process_frame()] did with a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was normalized and its actions triggered.
    Processed,
    /// The detector produced nothing, so nothing happened.
    Skipped,
}

/// The mapping pipeline's state. Frames go in through
/// [Session::process_frame()]; effects come out through the [Actuator].
#[derive(Debug)]
pub struct Session {
    mapper: ActionParameterMapper,
    normalizer: SignalNormalizer,
    sensitivity: MouseSensitivity,
    actuator: Box<dyn Actuator>,
}
impl Session {
    /// Creates a [Session] with no bindings.
    pub fn new_with(actuator: Box<dyn Actuator>, sensitivity: MouseSensitivity) -> Self {
        Self {
            mapper: Default::default(),
            normalizer: Default::default(),
            sensitivity,
            actuator,
        }
    }

    #[allow(missing_docs)]
    pub fn mapper(&self) -> &ActionParameterMapper {
        &self.mapper
    }

    #[allow(missing_docs)]
    pub fn mapper_mut(&mut self) -> &mut ActionParameterMapper {
        &mut self.mapper
    }

    #[allow(missing_docs)]
    pub fn sensitivity(&self) -> MouseSensitivity {
        self.sensitivity
    }

    /// See [ActionParameterMapper::create_mapping()].
    pub fn create_mapping(
        &mut self,
        action: Action,
        transformer: ParameterTransformer,
    ) -> Result<(), MappingError> {
        self.mapper.create_mapping(action, transformer)
    }

    /// See [ActionParameterMapper::create_empty_mapping()].
    pub fn create_empty_mapping(
        &mut self,
        action: Action,
        transform: Transform,
    ) -> Result<(), MappingError> {
        self.mapper.create_empty_mapping(action, transform)
    }

    /// See [ActionParameterMapper::remove_mapping()].
    pub fn remove_mapping(&mut self, action: Action) -> Option<ParameterTransformer> {
        self.mapper.remove_mapping(action)
    }

    /// See [ActionParameterMapper::action_values()].
    pub fn action_values(&self) -> Result<Vec<(Action, ParameterType)>, MappingError> {
        self.mapper.action_values()
    }

    /// Handles exactly one frame: records its blendshapes, runs every
    /// normalizer pass into the shared parameters, triggers every bound
    /// action, and then forgets the frame's blendshapes.
    ///
    /// A binding that can't be evaluated is logged and skipped. The frame's
    /// other bindings still fire.
    pub fn process_frame(&mut self, frame: &Frame) -> FrameOutcome {
        let Frame::Detected(result) = frame else {
            log::trace!("skipping a frame with no detector result");
            return FrameOutcome::Skipped;
        };

        self.normalizer.observe(&result.blendshapes);
        let mapper = &mut self.mapper;
        self.normalizer.normalize(result, &mut |name, value| {
            mapper.set_parameter_value(name, value);
        });
        if let Err(e) = self
            .mapper
            .trigger_actions(self.sensitivity, self.actuator.as_mut())
        {
            log::error!("{e}");
        }
        self.normalizer.end_frame();
        FrameOutcome::Processed
    }
}
