use clap::Subcommand;
use serde_json::json;

use super::{open_controller, print_json, run_command, CliResult};

#[derive(Subcommand)]
pub enum GoalAction {
    /// Print the current sleep goal
    Get,
    /// Set the sleep goal
    Set {
        /// Hours per night, e.g. 7.5
        #[arg(allow_negative_numbers = true)]
        hours: f64,
    },
}

pub fn run(action: GoalAction) -> CliResult {
    match action {
        GoalAction::Get => {
            let controller = open_controller()?;
            print_json(&json!({ "hours": controller.current_sleep_goal() }))
        }
        GoalAction::Set { hours } => run_command(|c| {
            c.update_sleep_goal(hours)?;
            Ok(c.current_sleep_goal())
        }),
    }
}
