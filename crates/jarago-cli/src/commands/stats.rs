use clap::Subcommand;
use serde_json::json;

use super::{open_controller, print_json, CliResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Counts, averages and the last seven days
    Summary,
    /// Average sleep duration in hours
    Average,
}

pub fn run(action: StatsAction) -> CliResult {
    let controller = open_controller()?;

    match action {
        StatsAction::Summary => print_json(&controller.stats()),
        StatsAction::Average => print_json(&json!({
            "average_hours": controller.average_sleep_duration_hours(),
            "record_count": controller.records().len(),
        })),
    }
}
