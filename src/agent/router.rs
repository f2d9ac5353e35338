//! Command routing.
//!
//! Text starting with `/` is a command; anything else is an answer for the
//! collector.

const PREFIX: char = '/';

/// Command extracted from a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Greet and drop any calculation in progress.
    Start,
    /// Begin a new calculation.
    Calc,
    /// Abandon the calculation in progress.
    Cancel,
    /// Show usage and the list of questions.
    Help,
    /// Anything else that looks like a command.
    Unknown(String),
}

impl Command {
    /// Parse a command. Returns `None` for plain answers.
    pub fn parse(content: &str) -> Option<Self> {
        let without_prefix = content.trim().strip_prefix(PREFIX)?;

        let word = without_prefix.split_whitespace().next().unwrap_or("");
        // Telegram appends the bot name in groups: /calc@my_bot
        let name = word.split('@').next().unwrap_or(word).to_lowercase();

        Some(match name.as_str() {
            "start" => Command::Start,
            "calc" | "new" => Command::Calc,
            "cancel" | "stop" => Command::Cancel,
            "help" => Command::Help,
            _ => Command::Unknown(name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_routing() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/calc"), Some(Command::Calc));
        assert_eq!(Command::parse("/new"), Some(Command::Calc));
        assert_eq!(Command::parse("  /CALC  "), Some(Command::Calc));
        assert_eq!(Command::parse("/cancel"), Some(Command::Cancel));
        assert_eq!(Command::parse("/stop"), Some(Command::Cancel));
        assert_eq!(Command::parse("/help"), Some(Command::Help));
        assert_eq!(Command::parse("/calc@wb_unit_bot"), Some(Command::Calc));
        assert_eq!(
            Command::parse("/foo bar"),
            Some(Command::Unknown("foo".to_string()))
        );
    }

    #[test]
    fn test_answers_are_not_commands() {
        assert!(Command::parse("Термокружка").is_none());
        assert!(Command::parse("100").is_none());
        assert!(Command::parse("12,5 /шт").is_none());
    }
}
