use clap::Subcommand;
use jarago_core::storage::Database;
use jarago_core::StoredNotifier;

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum NotifyAction {
    /// Print the pending wake notification, or null
    Status,
}

pub fn run(action: NotifyAction) -> CliResult {
    let db = Database::open()?;

    match action {
        NotifyAction::Status => print_json(&StoredNotifier::pending(&db)?),
    }
}
