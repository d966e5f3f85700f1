//! Slash commands for interactive mode

use neuroguide_protocol::ConversationType;

/// Result of executing a slash command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Start a fresh conversation, optionally switching type
    New(Option<ConversationType>),
    /// List saved conversations
    History,
    /// Show a message to the user (not sent to the backend)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(input: &str) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next().unwrap_or("").to_lowercase();
    let args = parts.next().map(str::trim).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "new" | "n" => {
            if args.is_empty() {
                CommandResult::New(None)
            } else {
                match args.parse() {
                    Ok(ty) => CommandResult::New(Some(ty)),
                    Err(e) => CommandResult::Message(e.to_string()),
                }
            }
        }

        "history" | "ls" => CommandResult::History,

        "quit" | "exit" | "q" => CommandResult::Exit,

        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    let types: Vec<&str> = ConversationType::ALL.iter().map(|t| t.as_str()).collect();
    format!(
        r#"Available commands:
  /help, /h, /?        Show this help message
  /new, /n [type]      Start a new conversation ({})
  /history, /ls        List saved conversations
  /exit, /quit, /q     Exit

Press Ctrl-C while a reply is streaming to stop it."#,
        types.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(execute_command("hello"), None);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(execute_command("/exit"), Some(CommandResult::Exit));
        assert_eq!(execute_command(" /Q "), Some(CommandResult::Exit));
        assert_eq!(execute_command("/history"), Some(CommandResult::History));
        assert_eq!(execute_command("/new"), Some(CommandResult::New(None)));
        assert_eq!(
            execute_command("/new mapping"),
            Some(CommandResult::New(Some(ConversationType::Mapping)))
        );
        assert_eq!(
            execute_command("/bogus"),
            Some(CommandResult::Unknown("bogus".into()))
        );
    }

    #[test]
    fn test_new_with_bad_type_reports() {
        assert!(matches!(
            execute_command("/new therapy"),
            Some(CommandResult::Message(_))
        ));
    }

    #[test]
    fn test_help_lists_types() {
        match execute_command("/help") {
            Some(CommandResult::Message(text)) => {
                assert!(text.contains("analysis, mapping, assistant"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
