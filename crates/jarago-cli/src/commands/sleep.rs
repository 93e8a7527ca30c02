use chrono::{DateTime, Utc};
use clap::Subcommand;
use jarago_core::{Session, SessionState};
use serde::Serialize;

use super::{open_controller, print_json, run_command, CliResult};

#[derive(Subcommand)]
pub enum SleepAction {
    /// Start a sleep session now
    Start,
    /// Set fatigue level and bedtime note for the session
    Stage {
        /// Fatigue level, 1 (fresh) to 5 (exhausted)
        #[arg(long)]
        fatigue: u8,
        /// Note written before going to bed
        #[arg(long, default_value = "")]
        message: String,
    },
    /// Log an insomnia message
    Message { text: String },
    /// Submit chat text; a cancel keyword resets the session
    Say { text: String },
    /// Enter the insomnia chat
    Chat,
    /// End the session: awake
    Wake,
    /// End the session from the active-session screen
    Cancel,
    /// End the session from the chat
    Reset,
    /// Run the foreground auto-wake check
    Foreground,
    /// Print current session state as JSON
    Status,
}

#[derive(Serialize)]
struct StatusReport<'a> {
    state: SessionState,
    session: &'a Session,
    sleep_goal_hours: f64,
    wake_up_at: Option<DateTime<Utc>>,
}

pub fn run(action: SleepAction) -> CliResult {
    match action {
        SleepAction::Start => run_command(|c| c.start_sleep()),
        SleepAction::Stage { fatigue, message } => {
            run_command(|c| c.stage_session(fatigue, &message))
        }
        SleepAction::Message { text } => run_command(|c| c.add_insomnia_message(&text)),
        SleepAction::Say { text } => run_command(|c| c.submit_message(&text)),
        SleepAction::Chat => run_command(|c| c.open_insomnia_chat()),
        SleepAction::Wake => run_command(|c| c.wake_up()),
        SleepAction::Cancel => run_command(|c| c.cancel_sleep()),
        SleepAction::Reset => run_command(|c| c.reset_to_initial_state()),
        SleepAction::Foreground => run_command(|c| c.on_foreground()),
        SleepAction::Status => {
            let controller = open_controller()?;
            print_json(&StatusReport {
                state: controller.session().state(),
                session: controller.session(),
                sleep_goal_hours: controller.current_sleep_goal(),
                wake_up_at: controller.wake_up_instant(),
            })
        }
    }
}
