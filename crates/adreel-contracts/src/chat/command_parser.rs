use std::path::PathBuf;

use super::command_registry::{
    CommandSpec, NO_ARG_COMMANDS, RAW_ARG_COMMANDS, SINGLE_PATH_COMMANDS,
};

/// One line typed into the model-editing session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Noop,
    Help,
    History,
    Current,
    Quit,
    Save { path: PathBuf },
    Edit { instruction: String },
    Unknown { command: String, arg: String },
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    let parts = parse_path_args(arg);
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

fn unknown(command: String, arg: &str) -> SessionCommand {
    SessionCommand::Unknown {
        command,
        arg: arg.to_string(),
    }
}

/// Plain text is an edit instruction; `/command args` selects a session action.
pub fn parse_command(text: &str) -> SessionCommand {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return SessionCommand::Noop;
    }

    let Some(slash_tail) = raw_trimmed.strip_prefix('/') else {
        return SessionCommand::Edit {
            instruction: raw_trimmed.to_string(),
        };
    };
    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    if command_len == 0 {
        return SessionCommand::Edit {
            instruction: raw_trimmed.to_string(),
        };
    }
    let command = slash_tail[..command_len].to_ascii_lowercase();
    let arg = slash_tail[command_len..].trim();

    if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
        return match action {
            "help" => SessionCommand::Help,
            "history" => SessionCommand::History,
            "current" => SessionCommand::Current,
            "quit" => SessionCommand::Quit,
            _ => unknown(command, arg),
        };
    }

    if find_action(&command, SINGLE_PATH_COMMANDS).is_some() {
        let path = parse_single_path_arg(arg);
        if path.is_empty() {
            return unknown(command, arg);
        }
        return SessionCommand::Save {
            path: PathBuf::from(path),
        };
    }

    if find_action(&command, RAW_ARG_COMMANDS).is_some() {
        if arg.is_empty() {
            return unknown(command, arg);
        }
        return SessionCommand::Edit {
            instruction: arg.to_string(),
        };
    }

    unknown(command, arg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_an_edit_instruction() {
        assert_eq!(
            parse_command("  make the jacket red  "),
            SessionCommand::Edit {
                instruction: "make the jacket red".to_string()
            }
        );
        assert_eq!(
            parse_command("/edit swap the background for a beach"),
            SessionCommand::Edit {
                instruction: "swap the background for a beach".to_string()
            }
        );
    }

    #[test]
    fn blank_line_is_noop() {
        assert_eq!(parse_command("   \n"), SessionCommand::Noop);
    }

    #[test]
    fn session_commands_parse() {
        assert_eq!(parse_command("/help"), SessionCommand::Help);
        assert_eq!(parse_command("/HISTORY"), SessionCommand::History);
        assert_eq!(parse_command("/current"), SessionCommand::Current);
        assert_eq!(parse_command("/quit"), SessionCommand::Quit);
        assert_eq!(parse_command("/exit"), SessionCommand::Quit);
    }

    #[test]
    fn save_accepts_quoted_paths() {
        assert_eq!(
            parse_command("/save \"/tmp/my model.png\""),
            SessionCommand::Save {
                path: PathBuf::from("/tmp/my model.png")
            }
        );
        assert_eq!(
            parse_command("/save"),
            SessionCommand::Unknown {
                command: "save".to_string(),
                arg: String::new()
            }
        );
    }

    #[test]
    fn unknown_command_keeps_argument() {
        assert_eq!(
            parse_command("/magic foo bar"),
            SessionCommand::Unknown {
                command: "magic".to_string(),
                arg: "foo bar".to_string()
            }
        );
    }

    #[test]
    fn lone_slash_is_treated_as_text() {
        assert_eq!(
            parse_command("/ tilt head"),
            SessionCommand::Edit {
                instruction: "/ tilt head".to_string()
            }
        );
    }
}
