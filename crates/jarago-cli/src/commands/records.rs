use clap::Subcommand;
use uuid::Uuid;

use super::{open_controller, print_json, run_command, CliResult};

#[derive(Subcommand)]
pub enum RecordsAction {
    /// All records
    List,
    /// The most recent records, newest first
    Recent,
    /// Records from the last N days
    Last { days: u32 },
    /// Show one record
    Show { id: Uuid },
    /// Open one record in the detail view
    Open { id: Uuid },
    /// Write or overwrite the review of a record
    Review { id: Uuid, text: String },
    /// Delete one record
    Delete { id: Uuid },
    /// Delete every record and reset settings
    DeleteAll {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

pub fn run(action: RecordsAction) -> CliResult {
    match action {
        RecordsAction::List => print_json(open_controller()?.records()),
        RecordsAction::Recent => print_json(&open_controller()?.recent_records()),
        RecordsAction::Last { days } => {
            print_json(&open_controller()?.records_in_last_n_days(days))
        }
        RecordsAction::Show { id } => {
            let controller = open_controller()?;
            match controller.record(id) {
                Some(record) => print_json(record),
                None => Err(format!("record not found: {id}").into()),
            }
        }
        RecordsAction::Open { id } => run_command(|c| Ok(c.open_record(id))),
        RecordsAction::Review { id, text } => run_command(|c| c.add_sleep_review(id, &text)),
        RecordsAction::Delete { id } => run_command(|c| c.delete_record(id)),
        RecordsAction::DeleteAll { yes } => {
            if !yes {
                return Err("refusing to delete all records without --yes".into());
            }
            run_command(|c| c.delete_all_records())
        }
    }
}
