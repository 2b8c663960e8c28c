// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! Drives the mouse and keyboard from recorded face-tracking output.

use clap::Parser;
use grimace::prelude::*;
use std::{
    io::BufReader,
    path::{Path, PathBuf},
    str::FromStr,
};
use strum::IntoEnumIterator;

#[derive(Parser, Debug, Default)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// JSON-lines file of detector results, one frame per line. Reads stdin
    /// if absent.
    replay: Option<PathBuf>,

    /// Mouse sensitivity, in pixels per unit of action value. Falls back to
    /// 10 if it isn't a non-negative integer.
    #[clap(
        short = 's',
        long,
        allow_hyphen_values = true,
        num_args = 0..=1,
        default_missing_value = ""
    )]
    sensitivity: Option<String>,

    /// Log action values every frame, and the frame rate every second
    #[clap(short = 'd', long, value_parser)]
    debug: bool,

    /// Settings file to load
    #[clap(long)]
    settings: Option<PathBuf>,

    /// Bind an action to a preset, e.g. ARROW_UP="Head Up". Repeatable.
    #[clap(long = "bind", value_name = "ACTION=PRESET")]
    bindings: Vec<String>,

    /// Print the available actions and presets, then exit
    #[clap(long, value_parser)]
    list: bool,

    /// Log input effects instead of performing them
    #[cfg(feature = "enigo")]
    #[clap(long, value_parser)]
    dry_run: bool,
}

fn parse_binding(s: &str) -> anyhow::Result<Binding> {
    let (action, preset) = s
        .split_once('=')
        .ok_or_else(|| anyhow::format_err!("Expected ACTION=PRESET, got {s:?}"))?;
    let action = Action::from_str(action.trim())
        .map_err(|_| anyhow::format_err!("Unknown action {action:?}"))?;
    Ok(Binding::new_with(action, preset.trim()))
}

// Anything that isn't a plain non-negative integer falls back to the
// default.
fn resolve_sensitivity(arg: Option<&str>, settings: &Settings) -> MouseSensitivity {
    match arg {
        Some(s) => MouseSensitivity::parse_decimal(s).unwrap_or_else(|| {
            log::warn!(
                "Ignoring sensitivity {s:?}; using {}",
                MouseSensitivity::DEFAULT_VALUE
            );
            MouseSensitivity::default()
        }),
        None => settings.mouse_sensitivity(),
    }
}

fn print_catalog(library: &PresetLibrary) {
    println!("Actions:");
    for action in Action::iter() {
        println!("  {:<12} {}", action.to_string(), action.label());
    }
    println!("Presets:");
    for preset in library.presets() {
        println!(
            "  {:<12} {:?} over {:?}",
            preset.name,
            preset.transformer.transform(),
            preset.transformer.parameter_names()
        );
    }
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    match path {
        Some(path) => Settings::load(path),
        None => Ok(Settings::default()),
    }
}

#[cfg(feature = "enigo")]
fn actuator(args: &Args) -> anyhow::Result<Box<dyn Actuator>> {
    if args.dry_run {
        Ok(Box::<LoggingActuator>::default())
    } else {
        Ok(Box::new(EnigoActuator::new()?))
    }
}

#[cfg(not(feature = "enigo"))]
fn actuator(_args: &Args) -> anyhow::Result<Box<dyn Actuator>> {
    Ok(Box::<LoggingActuator>::default())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut settings = load_settings(args.settings.as_deref())?;
    if args.list {
        print_catalog(&settings.preset_library());
        return Ok(());
    }

    // Command-line bindings override same-action bindings from settings.
    for binding in args.bindings.iter() {
        let binding = parse_binding(binding)?;
        settings.bindings.retain(|b| b.action != binding.action);
        settings.bindings.push(binding);
    }

    let sensitivity = resolve_sensitivity(args.sensitivity.as_deref(), &settings);
    let mut session = Session::new_with(actuator(&args)?, sensitivity);
    settings.apply_bindings(&mut session)?;
    log::info!(
        "Sensitivity {sensitivity}; bound {:?}",
        session.mapper().bound_actions()
    );

    let service = match args.replay.as_deref() {
        Some(path) => MappingService::new_with_debug(session, ReplaySource::open(path)?, args.debug),
        None => MappingService::new_with_debug(
            session,
            ReplaySource::new_with(BufReader::new(std::io::stdin())),
            args.debug,
        ),
    };

    let mut processed = 0;
    let mut skipped = 0;
    while let Ok(event) = service.receiver().recv() {
        match event {
            MappingServiceEvent::FrameProcessed { .. } => processed += 1,
            MappingServiceEvent::FrameSkipped => skipped += 1,
            MappingServiceEvent::MappingChanged(action) => log::debug!("rebound {action}"),
            MappingServiceEvent::MappingRejected(e) => log::warn!("{e}"),
            MappingServiceEvent::SourceExhausted => break,
        }
    }
    service.join()?;
    log::info!("Processed {processed} frame(s), skipped {skipped}");
    Ok(())
}
