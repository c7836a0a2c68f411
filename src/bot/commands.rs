//! Command grammar for the Telegram chat interface.

use crate::bot::error::BotError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Status,
    Subscribe,
    Unsubscribe,
    StartMonitor { interval_secs: Option<u64> },
    StopMonitor,
    SetInterval { interval_secs: u64 },
    ListSubscribers,
    Test,
}

impl Command {
    /// Parses a message text into a command.
    ///
    /// Returns `None` for anything that is not a recognized command, and an
    /// error for a recognized command with a bad argument.
    pub fn parse(text: &str) -> Option<Result<Command, BotError>> {
        let mut parts = text.split_whitespace();
        let head = parts.next()?;
        let name = head.strip_prefix('/')?;

        // Group chats address commands as /status@botname.
        let name = name.split('@').next().unwrap_or_default();
        let arg = parts.next();

        let command = match name {
            "start" => Command::Start,
            "help" => Command::Help,
            "status" => Command::Status,
            "subscribe" => Command::Subscribe,
            "unsubscribe" => Command::Unsubscribe,
            "start_monitor" => match arg.map(parse_interval).transpose() {
                Ok(interval_secs) => Command::StartMonitor { interval_secs },
                Err(e) => return Some(Err(e)),
            },
            "stop_monitor" => Command::StopMonitor,
            "set_interval" => {
                let Some(arg) = arg else {
                    return Some(Err(BotError::InvalidCommandArgument {
                        parameter: "interval".to_string(),
                        reason: "an interval in seconds is required".to_string(),
                    }));
                };
                match parse_interval(arg) {
                    Ok(interval_secs) => Command::SetInterval { interval_secs },
                    Err(e) => return Some(Err(e)),
                }
            }
            "list_subscribers" => Command::ListSubscribers,
            "test" => Command::Test,
            _ => return None,
        };
        Some(Ok(command))
    }
}

fn parse_interval(arg: &str) -> Result<u64, BotError> {
    arg.parse::<u64>().map_err(|_| BotError::InvalidCommandArgument {
        parameter: "interval".to_string(),
        reason: format!("expected a number of seconds, got \"{arg}\""),
    })
}
