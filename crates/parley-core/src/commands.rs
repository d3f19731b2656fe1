//! Parsing user input into commands

use parley_ai::ImageDetail;

use crate::error::{Error, Result};

pub const IMAGE_USAGE: &str = "Usage: /image <description>";
pub const VISION_USAGE: &str = "Usage: /vision <url-or-path> [prompt] [--detail=auto|low|high]";
pub const TRANSCRIBE_USAGE: &str = "Usage: /transcribe <audio-path>";

pub const HELP_TEXT: &str = "\
Commands:
  <text>                                   chat with the assistant
  /image <description>                     generate an image using the conversation as context
  /vision <url-or-path> [prompt] [--detail=auto|low|high]
                                           describe an image
  /transcribe <audio-path>                 transcribe audio and send it as a chat message
  /clear                                   clear the conversation
  /help                                    show this help
  /quit, /exit                             leave
Press Esc to cancel everything in flight.";

/// A parsed line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Chat(String),
    Image {
        description: String,
    },
    Vision {
        source: String,
        prompt: Option<String>,
        detail: Option<ImageDetail>,
    },
    Transcribe {
        path: String,
    },
    Help,
    Clear,
    Quit,
}

/// Parse one line of input. Blank input yields `None`.
pub fn parse(text: &str) -> Result<Option<Command>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    if !text.starts_with('/') {
        return Ok(Some(Command::Chat(text.to_string())));
    }

    let (verb, rest) = match text.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (text, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "/image" => {
            if rest.is_empty() {
                return Err(Error::InvalidCommand(IMAGE_USAGE.into()));
            }
            Command::Image {
                description: rest.to_string(),
            }
        }
        "/vision" => parse_vision(rest)?,
        "/transcribe" => {
            if rest.is_empty() {
                return Err(Error::InvalidCommand(TRANSCRIBE_USAGE.into()));
            }
            Command::Transcribe {
                path: rest.to_string(),
            }
        }
        "/help" => Command::Help,
        "/clear" => Command::Clear,
        "/quit" | "/exit" => Command::Quit,
        _ => {
            return Err(Error::InvalidCommand(format!(
                "Unknown command: {}. Type /help for available commands.",
                verb
            )));
        }
    };
    Ok(Some(command))
}

fn parse_vision(rest: &str) -> Result<Command> {
    let mut tokens = rest.split_whitespace();
    let source = tokens
        .next()
        .ok_or_else(|| Error::InvalidCommand(VISION_USAGE.into()))?;

    let mut detail = None;
    let mut prompt = Vec::new();
    for token in tokens {
        match token.strip_prefix("--detail=") {
            Some(value) => {
                detail = Some(ImageDetail::parse(value).ok_or_else(|| {
                    Error::InvalidCommand("Error: detail must be one of: auto, low, high".into())
                })?);
            }
            None => prompt.push(token),
        }
    }

    Ok(Command::Vision {
        source: source.to_string(),
        prompt: (!prompt.is_empty()).then(|| prompt.join(" ")),
        detail,
    })
}
