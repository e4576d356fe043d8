use clap::Parser;
use tracing::debug;

pub mod commands;

use crate::app::commands::Cli;
use crate::common::telemetry;
use crate::common::{Colors, color_init};
use crate::error::RecorderError;
use crate::session::paths::resolve_output_dir;
use crate::session::{RecorderConfig, SessionId, SessionOutcome, SessionRecorder};

pub struct Application;

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    pub fn new() -> Self {
        Self
    }

    /// Runs the recorder and returns the process exit code.
    pub fn run(&self) -> i32 {
        let cli = Cli::parse();
        let _telemetry = telemetry::init_tracing(if cli.verbose { "debug" } else { "warn" });
        color_init(cli.no_color);
        debug!(
            term_id = ?cli.term_id,
            output_dir = ?cli.output_dir,
            shell = %cli.shell,
            "CLI arguments parsed"
        );

        match self.execute(cli) {
            Ok(outcome) => self.report_outcome(&outcome),
            Err(e) => self.handle_error(&e),
        }
    }

    fn execute(&self, cli: Cli) -> Result<SessionOutcome, RecorderError> {
        let config = build_config(cli)?;
        let session_id = config.session_id.clone();
        let outcome = SessionRecorder::new(config).run()?;
        if let SessionOutcome::Busy { owner_pid } = outcome {
            print_busy_warning(&session_id, owner_pid);
        }
        Ok(outcome)
    }

    fn report_outcome(&self, outcome: &SessionOutcome) -> i32 {
        debug!(outcome = ?outcome, "Session finished");
        outcome.exit_code()
    }

    fn handle_error(&self, error: &RecorderError) -> i32 {
        eprintln!("{} {}", Colors::error("Error:"), error);
        if !matches!(error, RecorderError::MissingSessionId) {
            eprintln!("{} {}", Colors::dim("Suggestion:"), error.suggestion());
        }
        debug!(error = %error.to_json(), "Exiting with error");
        error.exit_code()
    }
}

/// Turns parsed arguments into a validated session configuration.
pub fn build_config(cli: Cli) -> Result<RecorderConfig, RecorderError> {
    let raw_id = cli.term_id.ok_or(RecorderError::MissingSessionId)?;
    let session_id = SessionId::parse(&raw_id)?;
    let output_dir = resolve_output_dir(cli.output_dir.as_deref());
    Ok(RecorderConfig::new(session_id, output_dir).with_shell(cli.shell, cli.shell_args))
}

fn print_busy_warning(session_id: &SessionId, owner_pid: Option<u32>) {
    let owner = owner_pid
        .map(|pid| format!(" by pid {pid}"))
        .unwrap_or_default();
    eprintln!(
        "{} Session already active (Terminal: {}){}",
        Colors::warning("Warning:"),
        Colors::session_id(session_id.as_str()),
        owner
    );
}
