use std::path::PathBuf;

use clap::Parser;
use clap::builder::FalseyValueParser;

use crate::session::config::DEFAULT_SHELL;

const LONG_ABOUT: &str = r#"term-recorder runs a login shell in a pseudo-terminal and records
everything the shell prints to a log file.

Only one recording per terminal ID can be active at a time. Starting a
second recorder with the same ID prints a warning and exits with status 0.

FILES (in OUTPUT_DIR, default ~/terminal_logs):
    terminal_<ID>.log   Raw shell output, truncated when a session starts
    terminal_<ID>.lock  Held while the session runs
    terminal_<ID>.pid   Process ID of the recorder (informational)

SHELL ENVIRONMENT:
    TERMINAL_RECORDING=1 and FTERMID=<ID> are set so prompts and rc files
    can show that the session is being recorded.

EXAMPLES:
    term-recorder 42
    term-recorder 42 /var/log/terminals
    term-recorder --shell /bin/zsh 42
    term-recorder 42 -- --norc -i"#;

#[derive(Debug, Parser)]
#[command(name = "term-recorder")]
#[command(author, version)]
#[command(about = "Record the output of an interactive shell session")]
#[command(long_about = LONG_ABOUT)]
pub struct Cli {
    /// Terminal ID naming this recording session
    pub term_id: Option<String>,

    /// Directory for the log, lock and pid files
    #[arg(env = "TERM_RECORDER_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Shell to run inside the recorded terminal
    #[arg(long, env = "TERM_RECORDER_SHELL", default_value = DEFAULT_SHELL)]
    pub shell: String,

    /// Arguments for the shell (default: --login)
    #[arg(last = true)]
    pub shell_args: Vec<String>,

    /// Disable colored output (also respects NO_COLOR env var)
    #[arg(long, env = "NO_COLOR", value_parser = FalseyValueParser::new())]
    pub no_color: bool,

    /// Enable verbose diagnostics
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_id_and_output_dir() {
        let cli = Cli::try_parse_from(["term-recorder", "42", "/tmp/logs"]).unwrap();
        assert_eq!(cli.term_id.as_deref(), Some("42"));
        assert_eq!(cli.output_dir, Some(PathBuf::from("/tmp/logs")));
        assert!(cli.shell_args.is_empty());
    }

    #[test]
    fn test_term_id_is_optional_at_parse_time() {
        let cli = Cli::try_parse_from(["term-recorder"]).unwrap();
        assert_eq!(cli.term_id, None);
    }

    #[test]
    fn test_no_color_env_accepts_conventional_values() {
        let parse_with = |value: &str| {
            std::env::set_var("NO_COLOR", value);
            let result = Cli::try_parse_from(["term-recorder", "42"]).map(|cli| cli.no_color);
            std::env::remove_var("NO_COLOR");
            result.unwrap()
        };
        assert!(parse_with("1"));
        assert!(parse_with("yes"));
        assert!(!parse_with("0"));
        assert!(!parse_with("false"));
    }

    #[test]
    fn test_shell_args_after_double_dash() {
        let cli = Cli::try_parse_from([
            "term-recorder",
            "--shell",
            "/bin/sh",
            "42",
            "--",
            "-c",
            "echo hi",
        ])
        .unwrap();
        assert_eq!(cli.shell, "/bin/sh");
        assert_eq!(cli.shell_args, vec!["-c".to_string(), "echo hi".to_string()]);
    }
}
