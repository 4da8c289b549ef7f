//! Log configuration built from [`LogArgs`].

use crate::{LogArgs, LogFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// How often file logs roll over.
#[derive(
    Default, Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[clap(rename_all = "lowercase")]
pub enum LogRotation {
    /// A new file every minute.
    Minutely,
    /// A new file every hour.
    Hourly,
    /// A new file every day.
    Daily,
    /// A single file.
    #[default]
    Never,
}

/// Stdout log settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdoutLogConfig {
    /// Line format.
    pub format: LogFormat,
}

/// File log settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLogConfig {
    /// Directory log files are written to.
    pub directory_path: PathBuf,
    /// Line format.
    pub format: LogFormat,
    /// Rotation policy.
    pub rotation: LogRotation,
}

/// Resolved logging setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Most verbose level emitted.
    pub global_level: LevelFilter,
    /// Stdout logs, unless quiet.
    pub stdout_logs: Option<StdoutLogConfig>,
    /// File logs, when a directory is configured.
    pub file_logs: Option<FileLogConfig>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new(LogArgs::default())
    }
}

impl LogConfig {
    /// Builds the configuration from parsed flags.
    pub fn new(args: LogArgs) -> Self {
        let stdout_logs =
            (!args.stdout_quiet).then_some(StdoutLogConfig { format: args.stdout_format });
        let file_logs = args.file_directory.map(|directory_path| FileLogConfig {
            directory_path,
            format: args.file_format,
            rotation: args.file_rotation,
        });

        Self { global_level: Self::level(args.verbosity), stdout_logs, file_logs }
    }

    /// Maps a `-v` count onto a level filter. Zero keeps warnings and errors.
    pub const fn level(verbosity: u8) -> LevelFilter {
        match verbosity {
            0..=2 => LevelFilter::WARN,
            3 => LevelFilter::INFO,
            4 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, LevelFilter::WARN)]
    #[case(2, LevelFilter::WARN)]
    #[case(3, LevelFilter::INFO)]
    #[case(4, LevelFilter::DEBUG)]
    #[case(5, LevelFilter::TRACE)]
    #[case(9, LevelFilter::TRACE)]
    fn test_level(#[case] verbosity: u8, #[case] expected: LevelFilter) {
        assert_eq!(LogConfig::level(verbosity), expected);
    }

    #[test]
    fn test_quiet_disables_stdout() {
        let args = LogArgs { stdout_quiet: true, ..LogArgs::default() };
        assert!(LogConfig::new(args).stdout_logs.is_none());
    }

    #[test]
    fn test_file_logs_need_a_directory() {
        let config = LogConfig::default();
        assert!(config.file_logs.is_none());
        assert_eq!(config.stdout_logs, Some(StdoutLogConfig { format: LogFormat::Full }));

        let args = LogArgs {
            file_directory: Some(PathBuf::from("logs")),
            file_rotation: LogRotation::Hourly,
            ..LogArgs::default()
        };
        let file_logs = LogConfig::new(args).file_logs.unwrap();
        assert_eq!(file_logs.directory_path, PathBuf::from("logs"));
        assert_eq!(file_logs.rotation, LogRotation::Hourly);
    }
}
