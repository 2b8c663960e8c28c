// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! [MappingService] runs a [Session] against a [FrameSource] on background
//! threads.
//!
//! A producer thread pulls frames from the source, but only after the
//! previous frame has been fully processed, so at most one frame is ever in
//! flight. A processing thread owns the [Session]. It handles each frame and
//! applies [MappingServiceInput] commands between frames, so a rebinding is
//! never visible halfway through one.
//!
//! Callers should drain [MappingService::receiver()]. Once
//! [MappingService::EVENT_BACKLOG] events are waiting, per-frame events are
//! dropped until the backlog shrinks. Mapping and exhaustion events are
//! always delivered.

use crate::{
    actions::Action,
    detection::{Frame, FrameSource},
    mapper::MappingError,
    params::ParameterType,
    session::{FrameOutcome, Session},
    transform::{ParameterTransformer, Transform},
};
use crossbeam_channel::{Receiver, Select, Sender};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};
use strum_macros::FromRepr;

/// Both halves of a [crossbeam_channel], created together.
#[derive(Debug)]
pub struct ChannelPair<T> {
    #[allow(missing_docs)]
    pub sender: Sender<T>,
    #[allow(missing_docs)]
    pub receiver: Receiver<T>,
}
impl<T> Default for ChannelPair<T> {
    fn default() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }
}

/// Commands to the [MappingService].
#[derive(Debug)]
pub enum MappingServiceInput {
    /// Binds the transformer to the action, replacing any previous binding.
    CreateMapping(Action, ParameterTransformer),
    /// Binds the action to a transform with no parameters yet.
    CreateEmptyMapping(Action, Transform),
    /// Unbinds the action.
    RemoveMapping(Action),
    /// Stops processing. The [Session] is handed back by
    /// [MappingService::join()].
    Quit,
}

/// What the [MappingService] reports.
#[derive(Clone, Debug, PartialEq)]
pub enum MappingServiceEvent {
    /// A frame went through the pipeline. Carries every bound action's value
    /// afterward, in binding order, omitting any that couldn't be evaluated.
    FrameProcessed {
        #[allow(missing_docs)]
        action_values: Vec<(Action, ParameterType)>,
    },
    /// The detector had nothing for a frame.
    FrameSkipped,
    /// A command changed the binding for this action.
    MappingChanged(Action),
    /// A command was rejected.
    MappingRejected(MappingError),
    /// The source ran dry. No more events will follow.
    SourceExhausted,
}

/// Counts frames and reports the rate about once a second.
#[derive(Debug)]
pub struct FrameRateCounter {
    frames: usize,
    window_start: Instant,
}
impl Default for FrameRateCounter {
    fn default() -> Self {
        Self::new_at(Instant::now())
    }
}
impl FrameRateCounter {
    const WINDOW: Duration = Duration::from_secs(1);

    /// Starts counting at `now`.
    pub fn new_at(now: Instant) -> Self {
        Self {
            frames: 0,
            window_start: now,
        }
    }

    /// Counts one frame. Returns the frames per second once a full window has
    /// elapsed, and starts a new window.
    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < Self::WINDOW {
            return None;
        }
        let rate = self.frames as f64 / elapsed.as_secs_f64();
        self.frames = 0;
        self.window_start = now;
        Some(rate)
    }
}

/// Runs a [Session] on its own threads. See the module docs.
#[derive(Debug)]
pub struct MappingService {
    input_channel: ChannelPair<MappingServiceInput>,
    event_channel: ChannelPair<MappingServiceEvent>,
    quit: Arc<AtomicBool>,
    handle: Option<JoinHandle<Session>>,
}
impl MappingService {
    /// How many undrained events the service lets pile up before it starts
    /// dropping per-frame events.
    pub const EVENT_BACKLOG: usize = 256;

    /// Starts processing frames from `source`.
    pub fn new_with(session: Session, source: impl FrameSource + 'static) -> Self {
        Self::new_with_debug(session, source, false)
    }

    /// Like [MappingService::new_with()], and if `debug` is set, logs each
    /// frame's action values and the frame rate.
    pub fn new_with_debug(
        session: Session,
        source: impl FrameSource + 'static,
        debug: bool,
    ) -> Self {
        let mut r = Self {
            input_channel: Default::default(),
            event_channel: Default::default(),
            quit: Default::default(),
            handle: None,
        };
        r.handle = Some(r.spawn_threads(session, source, debug));
        r
    }

    fn spawn_threads(
        &self,
        mut session: Session,
        mut source: impl FrameSource + 'static,
        debug: bool,
    ) -> JoinHandle<Session> {
        let frame_done = Arc::new(AtomicBool::new(true));
        let (frame_sender, frame_receiver) = crossbeam_channel::bounded::<Frame>(1);

        let producer = {
            let frame_done = Arc::clone(&frame_done);
            let quit = Arc::clone(&self.quit);
            std::thread::spawn(move || loop {
                while !frame_done.load(Ordering::Acquire) {
                    if quit.load(Ordering::Relaxed) {
                        return;
                    }
                    std::thread::park();
                }
                if quit.load(Ordering::Relaxed) {
                    return;
                }
                let Some(frame) = source.next_frame() else {
                    log::debug!("frame source is exhausted");
                    return;
                };
                frame_done.store(false, Ordering::Release);
                if frame_sender.send(frame).is_err() {
                    return;
                }
            })
        };
        let producer = producer.thread().clone();

        let input_receiver = self.input_channel.receiver.clone();
        let event_sender = self.event_channel.sender.clone();
        let quit = Arc::clone(&self.quit);
        std::thread::spawn(move || {
            #[derive(FromRepr)]
            enum SelectIndex {
                Frame,
                Input,
            }

            let mut sel = Select::new();
            let r = sel.recv(&frame_receiver);
            debug_assert_eq!(r, SelectIndex::Frame as usize);
            let r = sel.recv(&input_receiver);
            debug_assert_eq!(r, SelectIndex::Input as usize);

            let mut frame_rate = FrameRateCounter::default();
            loop {
                let operation = sel.select();
                match SelectIndex::from_repr(operation.index()) {
                    Some(SelectIndex::Frame) => {
                        let Ok(frame) = operation.recv(&frame_receiver) else {
                            let _ = event_sender.send(MappingServiceEvent::SourceExhausted);
                            break;
                        };
                        let event = match session.process_frame(&frame) {
                            FrameOutcome::Processed => MappingServiceEvent::FrameProcessed {
                                action_values: Self::evaluable_values(&session),
                            },
                            FrameOutcome::Skipped => MappingServiceEvent::FrameSkipped,
                        };
                        if debug {
                            if let MappingServiceEvent::FrameProcessed { action_values } = &event
                            {
                                log::info!("{action_values:?}");
                            }
                            if let Some(fps) = frame_rate.tick(Instant::now()) {
                                log::info!("{fps:.1} frames/sec");
                            }
                        }
                        frame_done.store(true, Ordering::Release);
                        producer.unpark();
                        if event_sender.len() < Self::EVENT_BACKLOG {
                            let _ = event_sender.send(event);
                        } else {
                            log::trace!("event backlog is full; dropped {event:?}");
                        }
                    }
                    Some(SelectIndex::Input) => {
                        let Ok(input) = operation.recv(&input_receiver) else {
                            break;
                        };
                        if let Some(event) = Self::handle_input(&mut session, input) {
                            let _ = event_sender.send(event);
                        } else {
                            break;
                        }
                    }
                    None => panic!("missing case for a new receiver"),
                }
            }
            quit.store(true, Ordering::Relaxed);
            producer.unpark();
            session
        })
    }

    // Returns None for Quit.
    fn handle_input(
        session: &mut Session,
        input: MappingServiceInput,
    ) -> Option<MappingServiceEvent> {
        let (action, result) = match input {
            MappingServiceInput::CreateMapping(action, transformer) => {
                (action, session.create_mapping(action, transformer))
            }
            MappingServiceInput::CreateEmptyMapping(action, transform) => {
                (action, session.create_empty_mapping(action, transform))
            }
            MappingServiceInput::RemoveMapping(action) => {
                session.remove_mapping(action);
                (action, Ok(()))
            }
            MappingServiceInput::Quit => return None,
        };
        Some(match result {
            Ok(()) => MappingServiceEvent::MappingChanged(action),
            Err(e) => {
                log::warn!("{e}");
                MappingServiceEvent::MappingRejected(e)
            }
        })
    }

    fn evaluable_values(session: &Session) -> Vec<(Action, ParameterType)> {
        session
            .mapper()
            .bound_actions()
            .into_iter()
            .filter_map(|action| {
                session
                    .mapper()
                    .get_action_value(action)
                    .ok()
                    .map(|value| (action, value))
            })
            .collect()
    }

    /// Sends a [MappingServiceInput] to the service.
    pub fn send(&self, input: MappingServiceInput) {
        let _ = self.input_channel.sender.send(input);
    }

    /// Asks the service to bind `transformer` to `action` before the next
    /// frame.
    pub fn create_mapping(&self, action: Action, transformer: ParameterTransformer) {
        self.send(MappingServiceInput::CreateMapping(action, transformer));
    }

    /// Asks the service to unbind `action` before the next frame.
    pub fn remove_mapping(&self, action: Action) {
        self.send(MappingServiceInput::RemoveMapping(action));
    }

    /// The sending side of the [MappingServiceInput] channel.
    pub fn sender(&self) -> &Sender<MappingServiceInput> {
        &self.input_channel.sender
    }

    /// The receiving side of the [MappingServiceEvent] channel. Per-frame
    /// events are dropped while [MappingService::EVENT_BACKLOG] of them go
    /// unread.
    pub fn receiver(&self) -> &Receiver<MappingServiceEvent> {
        &self.event_channel.receiver
    }

    /// Stops processing after the current frame.
    pub fn quit(&self) {
        self.send(MappingServiceInput::Quit);
    }

    /// Waits for processing to end, either by [MappingService::quit()] or by
    /// the source running dry, and returns the [Session].
    pub fn join(mut self) -> anyhow::Result<Session> {
        self.handle
            .take()
            .ok_or_else(|| anyhow::format_err!("Mapping service was already joined"))?
            .join()
            .map_err(|_| anyhow::format_err!("Mapping thread panicked"))
    }
}
