//! Log flags.

use crate::{LogFormat, LogRotation};
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Log verbosity and output flags.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct LogArgs {
    /// Verbosity level (0-5). Each `-v` raises it by one; `-vvv` is `info`.
    #[arg(short = 'v', long = "verbosity", action = ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Suppress log output on stdout.
    #[arg(long = "logs.stdout.quiet", global = true, env = "TALLY_LOGS_STDOUT_QUIET")]
    pub stdout_quiet: bool,

    /// Format of the stdout logs.
    #[arg(
        long = "logs.stdout.format",
        value_enum,
        default_value_t = LogFormat::Full,
        global = true,
        env = "TALLY_LOGS_STDOUT_FORMAT"
    )]
    pub stdout_format: LogFormat,

    /// Directory to write rolling log files to. File logging is off unless set.
    #[arg(long = "logs.file.directory", global = true, env = "TALLY_LOGS_FILE_DIRECTORY")]
    pub file_directory: Option<PathBuf>,

    /// Format of the file logs.
    #[arg(
        long = "logs.file.format",
        value_enum,
        default_value_t = LogFormat::Full,
        global = true,
        env = "TALLY_LOGS_FILE_FORMAT"
    )]
    pub file_format: LogFormat,

    /// How often log files roll over.
    #[arg(
        long = "logs.file.rotation",
        value_enum,
        default_value_t = LogRotation::Never,
        global = true,
        env = "TALLY_LOGS_FILE_ROTATION"
    )]
    pub file_rotation: LogRotation,
}

impl Default for LogArgs {
    fn default() -> Self {
        Self::parse_from(["tally"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        logs: LogArgs,
    }

    #[test]
    fn test_defaults() {
        let cli = TestCli::try_parse_from(["test"]).unwrap();
        assert_eq!(cli.logs.verbosity, 0);
        assert!(!cli.logs.stdout_quiet);
        assert_eq!(cli.logs.stdout_format, LogFormat::Full);
        assert!(cli.logs.file_directory.is_none());
        assert_eq!(cli.logs.file_rotation, LogRotation::Never);
    }

    #[test]
    fn test_verbosity_and_formats() {
        let cli = TestCli::try_parse_from([
            "test",
            "-vvvv",
            "--logs.stdout.format",
            "json",
            "--logs.file.directory",
            "/tmp/tally",
            "--logs.file.rotation",
            "daily",
        ])
        .unwrap();

        assert_eq!(cli.logs.verbosity, 4);
        assert_eq!(cli.logs.stdout_format, LogFormat::Json);
        assert_eq!(cli.logs.file_directory, Some(PathBuf::from("/tmp/tally")));
        assert_eq!(cli.logs.file_rotation, LogRotation::Daily);
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert!(TestCli::try_parse_from(["test", "--logs.stdout.format", "xml"]).is_err());
    }
}
