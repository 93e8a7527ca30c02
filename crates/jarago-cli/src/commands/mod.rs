pub mod completions;
pub mod config;
pub mod goal;
pub mod notify;
pub mod records;
pub mod sleep;
pub mod stats;

use std::error::Error;
use std::rc::Rc;

use jarago_core::storage::Database;
use jarago_core::{Config, Event, SleepController, StoredNotifier, SystemClock};
use serde::Serialize;

pub type CliResult = Result<(), Box<dyn Error>>;

/// A command's return value plus every event it raised.
#[derive(Serialize)]
struct Report<T> {
    result: T,
    events: Vec<Event>,
}

/// Open the controller over the default data directory.
pub fn open_controller() -> Result<SleepController, Box<dyn Error>> {
    let db = Rc::new(Database::open()?);
    let config = Config::load_or_default();
    tracing::debug!("opened database and configuration");
    let controller = SleepController::new(
        Rc::clone(&db),
        Box::new(StoredNotifier::new(db)),
        Box::new(SystemClock),
        config,
    )?;
    Ok(controller)
}

/// Run one controller command and print its result with the events it
/// produced. Delayed signals are delivered before printing, since the
/// process will not be around when they come due.
pub fn run_command<T, F>(f: F) -> CliResult
where
    T: Serialize,
    F: FnOnce(&mut SleepController) -> jarago_core::error::Result<T>,
{
    let mut controller = open_controller()?;
    let mut rx = controller.subscribe();
    let result = f(&mut controller)?;
    controller.flush_events();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    tracing::debug!(events = events.len(), "command finished");
    print_json(&Report { result, events })
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
