//! Special commands parser for the interactive chat
//!
//! Lines starting with `/` manage the session instead of being sent as a
//! prompt: switching conversations, regenerating or editing messages,
//! toggling capabilities, and showing help or status. The command word is
//! case-insensitive; arguments keep their case.

use crate::capability::Capability;
use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Create a conversation (optional title) and switch to it
    NewConversation(Option<String>),

    /// List conversations
    ListConversations,

    /// Switch to a conversation by list number or id
    Switch(String),

    /// Rename the active conversation
    Rename(String),

    /// Print the active conversation's transcript
    History,

    /// Regenerate an assistant message
    ///
    /// `None` means the most recent one; `Some(n)` is the number shown by
    /// `/history`.
    Reload(Option<usize>),

    /// Replace a user message and answer it again
    ///
    /// `index: None` edits the most recent user message.
    Edit { index: Option<usize>, content: String },

    /// Set or toggle a capability (`None` toggles)
    Capability(Capability, Option<bool>),

    /// Switch the model used for new requests
    SwitchModel(String),

    /// Show session status
    ShowStatus,

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command; send the input as a prompt
    None,
}

/// Parse a user input string into a special command
///
/// # Errors
///
/// Returns `CommandError::UnknownCommand` for an unrecognized `/` command,
/// `UnsupportedArgument` for a bad argument, and `MissingArgument` when a
/// required argument is absent.
///
/// # Examples
///
/// ```
/// use chatdeck::capability::Capability;
/// use chatdeck::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(
///     parse_special_command("/think on").unwrap(),
///     SpecialCommand::Capability(Capability::DeepThink, Some(true))
/// );
/// assert_eq!(parse_special_command("/reload").unwrap(), SpecialCommand::Reload(None));
/// assert_eq!(parse_special_command("hello").unwrap(), SpecialCommand::None);
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') {
        return match lower.as_str() {
            "exit" | "quit" => Ok(SpecialCommand::Exit),
            _ => Ok(SpecialCommand::None),
        };
    }

    let (head, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((head, rest)) => (head.to_lowercase(), rest.trim()),
        None => (lower.clone(), ""),
    };

    match head.as_str() {
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/exit" | "/quit" => Ok(SpecialCommand::Exit),
        "/status" => Ok(SpecialCommand::ShowStatus),
        "/history" => Ok(SpecialCommand::History),
        "/list" | "/conversations" => Ok(SpecialCommand::ListConversations),

        "/new" => Ok(SpecialCommand::NewConversation(
            (!rest.is_empty()).then(|| rest.to_string()),
        )),

        "/switch" => require(rest, "/switch", "/switch <number|id>")
            .map(|arg| SpecialCommand::Switch(arg.to_string())),

        "/rename" => require(rest, "/rename", "/rename <title>")
            .map(|title| SpecialCommand::Rename(title.to_string())),

        "/model" => require(rest, "/model", "/model <model_name>")
            .map(|model| SpecialCommand::SwitchModel(model.to_string())),

        "/reload" | "/regenerate" => {
            if rest.is_empty() {
                Ok(SpecialCommand::Reload(None))
            } else {
                parse_index("/reload", rest).map(|n| SpecialCommand::Reload(Some(n)))
            }
        }

        "/edit" => {
            let rest = require(rest, "/edit", "/edit [number] <new text>")?;
            match rest.split_once(char::is_whitespace) {
                Some((first, content)) if first.parse::<usize>().is_ok() => {
                    let index = parse_index("/edit", first)?;
                    let content = require(content.trim(), "/edit", "/edit [number] <new text>")?;
                    Ok(SpecialCommand::Edit {
                        index: Some(index),
                        content: content.to_string(),
                    })
                }
                _ => Ok(SpecialCommand::Edit {
                    index: None,
                    content: rest.to_string(),
                }),
            }
        }

        "/think" | "/deepthink" => parse_toggle("/think", rest, Capability::DeepThink),
        "/search" => parse_toggle("/search", rest, Capability::OnlineSearch),

        _ => Err(CommandError::UnknownCommand(head)),
    }
}

fn require<'a>(arg: &'a str, command: &str, usage: &str) -> Result<&'a str, CommandError> {
    if arg.is_empty() {
        Err(CommandError::MissingArgument {
            command: command.to_string(),
            usage: usage.to_string(),
        })
    } else {
        Ok(arg)
    }
}

/// Parse a 1-based message number
fn parse_index(command: &str, arg: &str) -> Result<usize, CommandError> {
    match arg.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(CommandError::UnsupportedArgument {
            command: command.to_string(),
            arg: arg.to_string(),
        }),
    }
}

fn parse_toggle(command: &str, arg: &str, capability: Capability) -> Result<SpecialCommand, CommandError> {
    match arg.to_lowercase().as_str() {
        "" => Ok(SpecialCommand::Capability(capability, None)),
        "on" | "enable" => Ok(SpecialCommand::Capability(capability, Some(true))),
        "off" | "disable" => Ok(SpecialCommand::Capability(capability, Some(false))),
        _ => Err(CommandError::UnsupportedArgument {
            command: command.to_string(),
            arg: arg.to_string(),
        }),
    }
}

/// Display help text for special commands
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat
=====================================

CONVERSATIONS:
  /new [title]        - Create a conversation and switch to it
  /list               - List conversations
  /switch <n|id>      - Switch to a conversation by list number or id
  /rename <title>     - Rename the active conversation
  /history            - Show the active conversation's messages

REPLIES:
  /reload [n]         - Regenerate the last reply, or reply number n
  /edit [n] <text>    - Replace your last message (or message n) and regenerate

CAPABILITIES:
  /think [on|off]     - Toggle deep thinking
  /search [on|off]    - Toggle online search (takes precedence over /think)
  /model <name>       - Use a different model for new requests

SESSION:
  /status             - Show conversation, model and capabilities
  /help               - Show this help message
  /exit               - Exit (also: exit, quit)

NOTES:
  - Command names are case-insensitive
  - Message numbers are the ones shown by /history
  - Regular text (not starting with /) is sent as a prompt
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(parse_special_command("hello there").unwrap(), SpecialCommand::None);
    }

    #[test]
    fn test_exit_aliases() {
        for input in ["exit", "QUIT", "/exit", "/quit"] {
            assert_eq!(parse_special_command(input).unwrap(), SpecialCommand::Exit);
        }
    }

    #[test]
    fn test_help_aliases() {
        assert_eq!(parse_special_command("/help").unwrap(), SpecialCommand::Help);
        assert_eq!(parse_special_command("/?").unwrap(), SpecialCommand::Help);
    }

    #[test]
    fn test_new_with_and_without_title() {
        assert_eq!(
            parse_special_command("/new").unwrap(),
            SpecialCommand::NewConversation(None)
        );
        assert_eq!(
            parse_special_command("/new Trip Plans").unwrap(),
            SpecialCommand::NewConversation(Some("Trip Plans".to_string()))
        );
    }

    #[test]
    fn test_switch_requires_argument() {
        assert_eq!(
            parse_special_command("/switch"),
            Err(CommandError::MissingArgument {
                command: "/switch".to_string(),
                usage: "/switch <number|id>".to_string(),
            })
        );
        assert_eq!(
            parse_special_command("/switch 2").unwrap(),
            SpecialCommand::Switch("2".to_string())
        );
    }

    #[test]
    fn test_reload_index() {
        assert_eq!(
            parse_special_command("/reload 4").unwrap(),
            SpecialCommand::Reload(Some(4))
        );
        assert!(matches!(
            parse_special_command("/reload 0"),
            Err(CommandError::UnsupportedArgument { .. })
        ));
        assert!(matches!(
            parse_special_command("/reload last"),
            Err(CommandError::UnsupportedArgument { .. })
        ));
    }

    #[test]
    fn test_edit_last_message() {
        assert_eq!(
            parse_special_command("/edit What about Rust?").unwrap(),
            SpecialCommand::Edit {
                index: None,
                content: "What about Rust?".to_string()
            }
        );
    }

    #[test]
    fn test_edit_numbered_message_keeps_case() {
        assert_eq!(
            parse_special_command("/EDIT 3 Hello World").unwrap(),
            SpecialCommand::Edit {
                index: Some(3),
                content: "Hello World".to_string()
            }
        );
    }

    #[test]
    fn test_edit_missing_text() {
        assert!(matches!(
            parse_special_command("/edit"),
            Err(CommandError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_capability_toggles() {
        assert_eq!(
            parse_special_command("/think").unwrap(),
            SpecialCommand::Capability(Capability::DeepThink, None)
        );
        assert_eq!(
            parse_special_command("/search OFF").unwrap(),
            SpecialCommand::Capability(Capability::OnlineSearch, Some(false))
        );
        assert!(matches!(
            parse_special_command("/search maybe"),
            Err(CommandError::UnsupportedArgument { .. })
        ));
    }

    #[test]
    fn test_switch_model() {
        assert_eq!(
            parse_special_command("/model qwen-max").unwrap(),
            SpecialCommand::SwitchModel("qwen-max".to_string())
        );
        assert!(parse_special_command("/model").is_err());
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse_special_command("/frobnicate now"),
            Err(CommandError::UnknownCommand("/frobnicate".to_string()))
        );
    }
}
