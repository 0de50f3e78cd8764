use crate::{AppError, AppResult};

use std::panic::Location;

use error_location::ErrorLocation;

/// Commands typed at the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Start a new recording session.
    Start,
    /// Pause the active recording.
    Pause,
    /// Resume a paused recording.
    Resume,
    /// Stop the active recording and report the artifact.
    Stop,
    /// Print the accumulated recording time.
    Duration,
    /// Print both controllers' state.
    Status,
    /// Re-probe biometric availability.
    BioCheck,
    /// Opt in to biometric login.
    BioEnable,
    /// Complete biometric setup.
    BioEnroll,
    /// Opt out of biometric login.
    BioDisable,
    /// Run one biometric challenge.
    BioAuth {
        /// Justification shown with the challenge.
        reason: String,
    },
    /// Dismiss the challenge on screen.
    BioCancel,
    /// Delete persisted biometric flags.
    BioClear,
    /// Pass the pending challenge.
    Approve,
    /// Fail the pending challenge.
    Deny,
    /// Print the command list.
    Help,
    /// Dispose the controllers and exit.
    Quit,
}

impl AppCommand {
    /// Parse one console line. Command words are case-insensitive.
    #[track_caller]
    pub fn parse(line: &str) -> AppResult<Self> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let invalid = |reason: &str| AppError::InvalidCommand {
            input: line.to_string(),
            reason: reason.to_string(),
            location: ErrorLocation::from(Location::caller()),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "start" => AppCommand::Start,
            "pause" => AppCommand::Pause,
            "resume" => AppCommand::Resume,
            "stop" => AppCommand::Stop,
            "duration" => AppCommand::Duration,
            "status" => AppCommand::Status,
            "bio-check" => AppCommand::BioCheck,
            "bio-enable" => AppCommand::BioEnable,
            "bio-enroll" => AppCommand::BioEnroll,
            "bio-disable" => AppCommand::BioDisable,
            "bio-auth" => {
                if rest.is_empty() {
                    return Err(invalid("bio-auth needs a reason"));
                }
                return Ok(AppCommand::BioAuth {
                    reason: rest.to_string(),
                });
            }
            "bio-cancel" => AppCommand::BioCancel,
            "bio-clear" => AppCommand::BioClear,
            "approve" | "y" => AppCommand::Approve,
            "deny" | "n" => AppCommand::Deny,
            "help" | "?" => AppCommand::Help,
            "quit" | "exit" => AppCommand::Quit,
            "" => return Err(invalid("empty line")),
            _ => return Err(invalid("unknown command, try 'help'")),
        };

        if !rest.is_empty() {
            return Err(invalid("command takes no arguments"));
        }

        Ok(command)
    }
}

/// Console help text.
pub(crate) const HELP: &str = "\
recording:  start | pause | resume | stop | duration
biometric:  bio-check | bio-enable | bio-enroll | bio-disable
            bio-auth <reason> | bio-cancel | bio-clear
challenge:  approve (y) | deny (n)
other:      status | help | quit";
