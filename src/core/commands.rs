// src/core/commands.rs

//! Parses a line from a registered session into a tagged `Command`.
//!
//! Arguments are split on whitespace with no quoting or escaping. Message
//! bodies are re-joined with single spaces, so runs of whitespace inside a
//! message collapse.

use crate::core::ChatError;

const MSG_USAGE: &str = "/msg <user> <message>";
const JOIN_USAGE: &str = "/join <group>";
const LEAVE_USAGE: &str = "/leave <group>";
const GROUP_USAGE: &str = "/group <group> <message>";
pub const GET_USAGE: &str = "/get <filename> <tcp|udp> [udp_port]";

/// How a requested file should travel to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// In-band on the requester's own connection.
    Tcp,
    /// As datagrams to the given port on the requester's address.
    Udp { port: u16 },
    /// Any other token. Rejected only after the file has been resolved.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    pub filename: String,
    pub transport: Transport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Msg { to: String, text: String },
    Join { group: String },
    Leave { group: String },
    Group { group: String, text: String },
    Files,
    Get(GetRequest),
    Help,
    /// A line without a leading `/`, broadcast verbatim.
    Chat(String),
}

impl Command {
    /// Parses a trimmed, non-empty line.
    pub fn parse(line: &str) -> Result<Command, ChatError> {
        if !line.starts_with('/') {
            return Ok(Command::Chat(line.to_string()));
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((verb, args)) = parts.split_first() else {
            return Ok(Command::Chat(line.to_string()));
        };

        match *verb {
            "/quit" => Ok(Command::Quit),
            "/msg" => {
                if args.len() < 2 {
                    return Err(ChatError::Usage(MSG_USAGE));
                }
                Ok(Command::Msg {
                    to: args[0].to_string(),
                    text: args[1..].join(" "),
                })
            }
            "/join" => Ok(Command::Join {
                group: single_arg(args, JOIN_USAGE)?,
            }),
            "/leave" => Ok(Command::Leave {
                group: single_arg(args, LEAVE_USAGE)?,
            }),
            "/group" => {
                if args.len() < 2 {
                    return Err(ChatError::Usage(GROUP_USAGE));
                }
                Ok(Command::Group {
                    group: args[0].to_string(),
                    text: args[1..].join(" "),
                })
            }
            "/files" => Ok(Command::Files),
            "/get" => parse_get(args).map(Command::Get),
            "/help" => Ok(Command::Help),
            other => Err(ChatError::UnknownCommand(other.to_string())),
        }
    }

    /// True if `line` is a `/get` request, whatever its arguments.
    pub fn is_get(line: &str) -> bool {
        line.split_whitespace().next() == Some("/get")
    }

    /// The verb as it appears on the wire, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Quit => "/quit",
            Command::Msg { .. } => "/msg",
            Command::Join { .. } => "/join",
            Command::Leave { .. } => "/leave",
            Command::Group { .. } => "/group",
            Command::Files => "/files",
            Command::Get(_) => "/get",
            Command::Help => "/help",
            Command::Chat(_) => "chat",
        }
    }
}

fn single_arg(args: &[&str], usage: &'static str) -> Result<String, ChatError> {
    match args {
        [one] => Ok(one.to_string()),
        _ => Err(ChatError::Usage(usage)),
    }
}

fn parse_get(args: &[&str]) -> Result<GetRequest, ChatError> {
    let (filename, transport) = match args {
        // A trailing port on a tcp request is ignored.
        [filename, "tcp"] | [filename, "tcp", _] => (filename, Transport::Tcp),
        [filename, "udp", port] => {
            let port = port
                .parse::<u16>()
                .map_err(|_| ChatError::Usage(GET_USAGE))?;
            (filename, Transport::Udp { port })
        }
        [_, "udp"] => return Err(ChatError::Usage(GET_USAGE)),
        [filename, other] | [filename, other, _] => (filename, Transport::Other(other.to_string())),
        _ => return Err(ChatError::Usage(GET_USAGE)),
    };
    Ok(GetRequest {
        filename: filename.to_string(),
        transport,
    })
}
