//! Command-line interface and resolved runtime configuration.

use crate::client::subscriptions::ResubscribePolicy;
use crate::client::transport::parse_endpoint;
use crate::common::logging::{level_filter, log_file_path};
use crate::common::persistence::get_settings_file_path;
use crate::error::{OrchestratorError, RuntimeMode};
use crate::notify::sound::PROFILE_NAMES;
use crate::notify::store::DEFAULT_MAX_NOTIFICATIONS;
use clap::builder::PossibleValuesParser;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;

/// Server used when neither `--server` nor `CLAUDE_DASH_SERVER` is given
pub const DEFAULT_SERVER: &str = "ws://localhost:3456/ws";

#[derive(Parser, Debug)]
#[command(name = "claude-dash")]
#[command(about = "Live dashboard and alerts for Claude Code sessions")]
#[command(version)]
pub struct Cli {
    /// Dashboard server event-stream endpoint
    #[arg(short, long, env = "CLAUDE_DASH_SERVER", default_value = DEFAULT_SERVER)]
    pub server: String,

    /// Maximum number of alerts kept in the list
    #[arg(short = 'n', long, default_value_t = DEFAULT_MAX_NOTIFICATIONS)]
    pub max_notifications: usize,

    /// Log level or filter directive (e.g. `debug`, `claude_dash=trace`)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Override the notification settings file
    #[arg(long)]
    pub settings_file: Option<PathBuf>,

    /// Re-subscribe to focused sessions after a reconnect
    #[arg(long)]
    pub resubscribe: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show or change notification settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Play a sound profile
    Sound {
        #[arg(value_parser = PossibleValuesParser::new(PROFILE_NAMES))]
        profile: String,
    },
    /// Request permission and send a sample desktop notification
    NotifyTest,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SettingsAction {
    /// Print the effective settings as JSON
    Show,
    /// Merge a JSON patch, e.g. '{"soundEnabled": false}'
    Set { patch: String },
}

/// Validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: String,
    pub max_notifications: usize,
    pub log_level: String,
    pub log_file: PathBuf,
    pub settings_file: PathBuf,
    pub resubscribe: ResubscribePolicy,
    pub runtime_mode: RuntimeMode,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self, OrchestratorError> {
        parse_endpoint(&cli.server).map_err(|e| {
            OrchestratorError::validation(e.to_string()).with_details(json!({ "field": "server" }))
        })?;
        level_filter(&cli.log_level)?;
        if cli.max_notifications == 0 {
            return Err(OrchestratorError::validation("max notifications must be at least 1")
                .with_details(json!({ "field": "maxNotifications" })));
        }

        let settings_file = match &cli.settings_file {
            Some(path) => path.clone(),
            None => get_settings_file_path()
                .ok_or_else(|| OrchestratorError::file_system("could not determine config directory"))?,
        };
        let log_file = log_file_path()
            .ok_or_else(|| OrchestratorError::file_system("could not determine cache directory"))?;

        Ok(Self {
            server: cli.server.clone(),
            max_notifications: cli.max_notifications,
            log_level: cli.log_level.clone(),
            log_file,
            settings_file,
            resubscribe: if cli.resubscribe {
                ResubscribePolicy::Automatic
            } else {
                ResubscribePolicy::Manual
            },
            runtime_mode: RuntimeMode::from_env(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VALIDATION_ERROR;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["claude-dash"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    mod cli {
        use super::*;

        #[test]
        fn test_defaults() {
            let cli = parse(&["--server", DEFAULT_SERVER]);
            assert_eq!(cli.max_notifications, DEFAULT_MAX_NOTIFICATIONS);
            assert_eq!(cli.log_level, "info");
            assert!(!cli.resubscribe);
            assert!(cli.command.is_none());
        }

        #[test]
        fn test_subcommands() {
            let cli = parse(&["settings", "set", r#"{"soundEnabled":false}"#]);
            assert_eq!(
                cli.command,
                Some(Command::Settings {
                    action: SettingsAction::Set {
                        patch: r#"{"soundEnabled":false}"#.into()
                    }
                })
            );
            assert_eq!(parse(&["notify-test"]).command, Some(Command::NotifyTest));
            assert_eq!(
                parse(&["sound", "bell"]).command,
                Some(Command::Sound { profile: "bell".into() })
            );
        }

        #[test]
        fn test_unknown_sound_profile_rejected() {
            assert!(Cli::try_parse_from(["claude-dash", "sound", "klaxon"]).is_err());
        }
    }

    mod resolve {
        use super::*;

        #[test]
        fn test_resolves_policy_and_settings_override() {
            let cli = parse(&["--server", "wss://dash.example.com/ws", "--resubscribe", "--settings-file", "/tmp/s.json"]);
            let config = Config::from_cli(&cli).unwrap();
            assert_eq!(config.resubscribe, ResubscribePolicy::Automatic);
            assert_eq!(config.settings_file, PathBuf::from("/tmp/s.json"));
            assert_eq!(config.server, "wss://dash.example.com/ws");
        }

        #[test]
        fn test_rejects_bad_server() {
            let cli = parse(&["--server", "http://localhost:3456", "--settings-file", "/tmp/s.json"]);
            let err = Config::from_cli(&cli).unwrap_err();
            assert_eq!(err.code(), VALIDATION_ERROR);
            assert_eq!(err.details(), Some(&json!({ "field": "server" })));
        }

        #[test]
        fn test_rejects_zero_capacity_and_bad_level() {
            let cli = parse(&["-s", DEFAULT_SERVER, "-n", "0", "--settings-file", "/tmp/s.json"]);
            assert!(Config::from_cli(&cli).is_err());

            let cli = parse(&["-s", DEFAULT_SERVER, "--log-level", "x=loud", "--settings-file", "/tmp/s.json"]);
            assert!(Config::from_cli(&cli).is_err());
        }
    }
}
