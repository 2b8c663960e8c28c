// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! [Action]s are the input effects that a face can drive. Each one knows how
//! to turn an action value into a call on an [Actuator], which is the only
//! thing in the crate that touches the operating system's input queue.

use crate::params::ParameterType;
use convert_case::{Case, Casing};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use strum_macros::{EnumCount, EnumIter, EnumString, IntoStaticStr};

/// A discrete input effect. Mouse actions move the pointer every frame by an
/// amount proportional to the action value; the others tap a key on every
/// frame that the value is nonzero.
#[derive(
    Clone,
    Copy,
    Debug,
    strum_macros::Display,
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
pub enum Action {
    MouseUp,
    MouseDown,
    MouseLeft,
    MouseRight,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    PressQ,
    PressW,
    PressE,
    PressR,
    PressA,
    PressS,
    PressD,
    PressF,
    PressY,
    PressX,
    PressC,
}

/// How an [Action] reaches the [Actuator].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ActionKind {
    /// Moves the pointer along (`x`, `y`), each component -1, 0, or 1, scaled
    /// by the action value and the [MouseSensitivity]. Screen y grows
    /// downward.
    Pointer {
        #[allow(missing_docs)]
        x: ParameterType,
        #[allow(missing_docs)]
        y: ParameterType,
    },
    /// Taps the key when the action value is nonzero.
    Tap(Key),
}

/// A key that an [Action] can tap.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    #[allow(missing_docs)]
    Up,
    #[allow(missing_docs)]
    Down,
    #[allow(missing_docs)]
    Left,
    #[allow(missing_docs)]
    Right,
    /// A character key, lowercase.
    #[display(fmt = "'{}'", _0)]
    Char(char),
}

impl Action {
    /// The dispatch table from variant to effect.
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::MouseUp => ActionKind::Pointer { x: 0.0, y: -1.0 },
            Action::MouseDown => ActionKind::Pointer { x: 0.0, y: 1.0 },
            Action::MouseLeft => ActionKind::Pointer { x: -1.0, y: 0.0 },
            Action::MouseRight => ActionKind::Pointer { x: 1.0, y: 0.0 },
            Action::ArrowUp => ActionKind::Tap(Key::Up),
            Action::ArrowDown => ActionKind::Tap(Key::Down),
            Action::ArrowLeft => ActionKind::Tap(Key::Left),
            Action::ArrowRight => ActionKind::Tap(Key::Right),
            Action::PressQ
            | Action::PressW
            | Action::PressE
            | Action::PressR
            | Action::PressA
            | Action::PressS
            | Action::PressD
            | Action::PressF
            | Action::PressY
            | Action::PressX
            | Action::PressC => ActionKind::Tap(Key::Char(self.name_key())),
        }
    }

    // PRESS_Q taps 'q'.
    fn name_key(&self) -> char {
        let name: &'static str = self.into();
        name.rsplit('_')
            .next()
            .and_then(|suffix| suffix.chars().next())
            .map(|c| c.to_ascii_lowercase())
            .unwrap_or_default()
    }

    /// A title-case name suitable for menus, e.g. "Arrow Up".
    pub fn label(&self) -> String {
        self.to_string().to_case(Case::Title)
    }

    /// Performs this action's effect for one frame. Only the magnitude of
    /// `value` matters.
    pub fn trigger(
        &self,
        value: ParameterType,
        sensitivity: MouseSensitivity,
        actuator: &mut dyn Actuator,
    ) {
        let value = value.abs();
        match self.kind() {
            ActionKind::Pointer { x, y } => {
                let distance = value * sensitivity.as_factor();
                actuator.move_pointer(x * distance, y * distance);
            }
            ActionKind::Tap(key) => {
                if value > 0.0 {
                    actuator.tap(key);
                }
            }
        }
    }
}

/// Pixels of pointer travel per unit of action value.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseSensitivity(pub i32);
impl Default for MouseSensitivity {
    fn default() -> Self {
        Self(Self::DEFAULT_VALUE)
    }
}
impl From<i32> for MouseSensitivity {
    fn from(value: i32) -> Self {
        Self(value)
    }
}
impl MouseSensitivity {
    /// The sensitivity used when none is configured.
    pub const DEFAULT_VALUE: i32 = 10;

    /// Parses a command-line value. Only plain decimal digits are accepted, so
    /// signs, fractions, and garbage all yield `None`.
    pub fn parse_decimal(s: &str) -> Option<Self> {
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        s.parse::<i32>().ok().map(Self)
    }

    /// The sensitivity as a multiplier.
    pub fn as_factor(&self) -> ParameterType {
        self.0 as ParameterType
    }
}

/// The sink for input effects. Implementations report no failures back to the
/// caller.
pub trait Actuator: Send + std::fmt::Debug {
    /// Moves the pointer relative to its current position.
    fn move_pointer(&mut self, dx: ParameterType, dy: ParameterType);

    /// Presses and releases a key.
    fn tap(&mut self, key: Key);
}

/// An effect an [Actuator] was asked to perform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ActuatorEffect {
    /// The pointer moved by (`dx`, `dy`).
    PointerMoved {
        #[allow(missing_docs)]
        dx: ParameterType,
        #[allow(missing_docs)]
        dy: ParameterType,
    },
    /// A key was tapped.
    Tapped(Key),
}

/// An [Actuator] that writes each effect to the log instead of performing it.
#[derive(Debug, Default)]
pub struct LoggingActuator {}
impl Actuator for LoggingActuator {
    fn move_pointer(&mut self, dx: ParameterType, dy: ParameterType) {
        if dx == 0.0 && dy == 0.0 {
            log::trace!("pointer holds still");
        } else {
            log::info!("pointer moves by ({dx:.2}, {dy:.2})");
        }
    }

    fn tap(&mut self, key: Key) {
        log::info!("tap {key}");
    }
}

/// An [Actuator] that remembers what it was asked to do. Clones share the
/// same record, so a caller can keep one and hand the other to a
/// [Session](crate::session::Session).
#[derive(Clone, Debug, Default)]
pub struct RecordingActuator {
    effects: Arc<RwLock<Vec<ActuatorEffect>>>,
}
impl RecordingActuator {
    /// Everything recorded so far, oldest first.
    pub fn effects(&self) -> Vec<ActuatorEffect> {
        if let Ok(effects) = self.effects.read() {
            effects.clone()
        } else {
            Vec::default()
        }
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        if let Ok(mut effects) = self.effects.write() {
            effects.clear();
        }
    }

    fn record(&self, effect: ActuatorEffect) {
        if let Ok(mut effects) = self.effects.write() {
            effects.push(effect);
        }
    }
}
impl Actuator for RecordingActuator {
    fn move_pointer(&mut self, dx: ParameterType, dy: ParameterType) {
        self.record(ActuatorEffect::PointerMoved { dx, dy });
    }

    fn tap(&mut self, key: Key) {
        self.record(ActuatorEffect::Tapped(key));
    }
}

#[cfg(feature = "enigo")]
pub use os::EnigoActuator;

#[cfg(feature = "enigo")]
mod os {
    use super::{Actuator, ActuatorEffect, Key};
    use crate::params::ParameterType;
    use crossbeam_channel::Sender;
    use enigo::{Coordinate, Direction, Enigo, Keyboard, Mouse, Settings};

    /// An [Actuator] that injects real input events through [enigo].
    ///
    /// The OS connection lives on its own thread, which owns it for its whole
    /// life; this struct only holds the sending half of that thread's queue.
    #[derive(Debug)]
    pub struct EnigoActuator {
        sender: Sender<ActuatorEffect>,
    }
    impl EnigoActuator {
        /// Connects to the OS input system. Fails if no connection is
        /// available (e.g. no display server).
        pub fn new() -> anyhow::Result<Self> {
            let (sender, receiver) = crossbeam_channel::unbounded::<ActuatorEffect>();
            let (ready_sender, ready_receiver) = crossbeam_channel::bounded(1);
            std::thread::spawn(move || {
                let mut enigo = match Enigo::new(&Settings::default()) {
                    Ok(enigo) => {
                        let _ = ready_sender.send(Ok(()));
                        enigo
                    }
                    Err(e) => {
                        let _ = ready_sender.send(Err(anyhow::format_err!(
                            "Couldn't connect to the input system: {e:?}"
                        )));
                        return;
                    }
                };
                // Sub-pixel remainders carry over so slow movement still moves.
                let mut carry: (ParameterType, ParameterType) = (0.0, 0.0);
                while let Ok(effect) = receiver.recv() {
                    let result = match effect {
                        ActuatorEffect::PointerMoved { dx, dy } => {
                            let x = dx + carry.0;
                            let y = dy + carry.1;
                            let (whole_x, whole_y) = (x.trunc(), y.trunc());
                            carry = (x - whole_x, y - whole_y);
                            if whole_x == 0.0 && whole_y == 0.0 {
                                Ok(())
                            } else {
                                enigo.move_mouse(whole_x as i32, whole_y as i32, Coordinate::Rel)
                            }
                        }
                        ActuatorEffect::Tapped(key) => {
                            enigo.key(Self::enigo_key(key), Direction::Click)
                        }
                    };
                    if let Err(e) = result {
                        log::warn!("input injection failed: {e:?}");
                    }
                }
            });
            ready_receiver
                .recv()
                .map_err(|e| anyhow::format_err!("Input thread died during startup: {e:?}"))??;
            Ok(Self { sender })
        }

        fn enigo_key(key: Key) -> enigo::Key {
            match key {
                Key::Up => enigo::Key::UpArrow,
                Key::Down => enigo::Key::DownArrow,
                Key::Left => enigo::Key::LeftArrow,
                Key::Right => enigo::Key::RightArrow,
                Key::Char(c) => enigo::Key::Unicode(c),
            }
        }
    }
    impl Actuator for EnigoActuator {
        fn move_pointer(&mut self, dx: ParameterType, dy: ParameterType) {
            let _ = self.sender.send(ActuatorEffect::PointerMoved { dx, dy });
        }

        fn tap(&mut self, key: Key) {
            let _ = self.sender.send(ActuatorEffect::Tapped(key));
        }
    }
}
