// Copyright (c) 2023 Mike Tsao. All rights reserved.

#![warn(missing_docs)]

//! The `grimace` crate turns facial expressions and head movement into
//! mouse and keyboard input.
//!
//! A face-landmark detector describes each video frame as a set of
//! blendshape scores plus face and body transformation matrices
//! ([detection::DetectorResult]). The [normalizer::SignalNormalizer] converts
//! those into a fixed set of named, calibrated [params::Parameter]s. Each
//! [actions::Action] is bound to a [transform::ParameterTransformer] that
//! reduces some of those parameters to one action value, and the
//! [mapper::ActionParameterMapper] evaluates every binding once per frame
//! and hands the results to an [actions::Actuator].
//!
//! [session::Session] ties a frame's worth of that together.
//! [service::MappingService] runs a session on background threads and
//! accepts rebinding commands while it runs.
//!
//! ```
//! use grimace::prelude::*;
//!
//! let actuator = RecordingActuator::default();
//! let mut session = Session::new_with(Box::new(actuator.clone()), MouseSensitivity::default());
//! session
//!     .create_mapping(
//!         Action::ArrowUp,
//!         PresetLibrary::default().instantiate("Head Up").unwrap(),
//!     )
//!     .unwrap();
//! session.process_frame(&Frame::Missed);
//! assert!(actuator.effects().is_empty());
//! ```

pub mod actions;
pub mod detection;
pub mod mapper;
pub mod normalizer;
pub mod params;
pub mod presets;
pub mod service;
pub mod session;
pub mod settings;
pub mod transform;

/// The most commonly used imports.
pub mod prelude {
    pub use crate::{
        actions::{
            Action, ActionKind, Actuator, ActuatorEffect, Key, LoggingActuator, MouseSensitivity,
            RecordingActuator,
        },
        detection::{Blendshape, DetectorResult, Frame, FrameSource, ReplaySource, TransformMatrix},
        mapper::{ActionParameterMapper, MappingError},
        normalizer::SignalNormalizer,
        params::{ParamName, Parameter, ParameterType, SharedParameter},
        presets::{Preset, PresetLibrary},
        service::{MappingService, MappingServiceEvent, MappingServiceInput},
        session::{FrameOutcome, Session},
        settings::{Binding, Settings},
        transform::{ParameterTransformer, Transform, TransformError},
    };

    #[cfg(feature = "enigo")]
    pub use crate::actions::EnigoActuator;
}
