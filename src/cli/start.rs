use crate::cli::{
    actions::Action,
    commands::{self, ARG_VERBOSITY},
    dispatch::handler,
    telemetry,
};
use anyhow::Result;
use tracing::Level;

fn get_verbosity_level(matches: &clap::ArgMatches) -> Option<Level> {
    match matches.get_one::<u8>(ARG_VERBOSITY).copied() {
        None | Some(0) => None,
        Some(1) => Some(Level::WARN),
        Some(2) => Some(Level::INFO),
        Some(3) => Some(Level::DEBUG),
        Some(_) => Some(Level::TRACE),
    }
}

/// Parse the command line, set up logging and return the action to run.
///
/// # Errors
/// Returns an error if logging cannot be initialized or arguments are invalid.
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    telemetry::init(get_verbosity_level(&matches))?;

    handler(&matches)
}
