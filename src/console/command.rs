//! Console request parsing and execution.

use serde::Serialize;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::TollgateError;
use crate::ratelimit::{Admission, Decision, RateLimiter, Status};

/// Errors produced while parsing a console request line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("{command} expects {expected}")]
    Arity {
        command: &'static str,
        expected: &'static str,
    },
    #[error("invalid amount: {0}")]
    Amount(String),
}

/// One console request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Check(String),
    Decide(String),
    Consume(String, u64),
    Credit(String, u64),
    Status(String),
    Keys,
    Sweep,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let verb = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match (verb, args.as_slice()) {
            ("check", [key]) => Ok(Command::Check(key.to_string())),
            ("decide", [key]) => Ok(Command::Decide(key.to_string())),
            ("consume", [key, amount]) => {
                Ok(Command::Consume(key.to_string(), parse_amount(amount)?))
            }
            ("credit", [key, amount]) => {
                Ok(Command::Credit(key.to_string(), parse_amount(amount)?))
            }
            ("status", [key]) => Ok(Command::Status(key.to_string())),
            ("keys", []) => Ok(Command::Keys),
            ("sweep", []) => Ok(Command::Sweep),
            ("check", _) => Err(arity("check", "KEY")),
            ("decide", _) => Err(arity("decide", "KEY")),
            ("consume", _) => Err(arity("consume", "KEY AMOUNT")),
            ("credit", _) => Err(arity("credit", "KEY AMOUNT")),
            ("status", _) => Err(arity("status", "KEY")),
            ("keys", _) => Err(arity("keys", "no arguments")),
            ("sweep", _) => Err(arity("sweep", "no arguments")),
            (other, _) => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn arity(command: &'static str, expected: &'static str) -> CommandError {
    CommandError::Arity { command, expected }
}

fn parse_amount(raw: &str) -> Result<u64, CommandError> {
    raw.parse().map_err(|_| CommandError::Amount(raw.to_string()))
}

/// One console response, written as a single JSON line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Checked {
        key: String,
        allowed: bool,
    },
    Decided {
        key: String,
        allowed: bool,
        via: Option<Admission>,
    },
    Consumed {
        key: String,
        consumed: bool,
    },
    Credited {
        key: String,
        credited: u64,
    },
    Status {
        key: String,
        #[serde(flatten)]
        status: Status,
    },
    Keys {
        keys: usize,
    },
    Swept {
        swept: usize,
    },
    Error {
        error: String,
    },
}

/// Run `command` against `limiter`.
///
/// Unsupported operations come back as [`Reply::Error`]; a denial is a
/// normal reply.
pub fn execute(limiter: &RateLimiter, command: Command) -> Reply {
    debug!(command = ?command, "Executing console command");

    match command {
        Command::Check(key) => {
            let allowed = limiter.check(&key);
            Reply::Checked { key, allowed }
        }
        Command::Decide(key) => {
            let via = match limiter.decide(&key) {
                Decision::Admitted(admission) => Some(admission),
                Decision::Denied => None,
            };
            Reply::Decided {
                key,
                allowed: via.is_some(),
                via,
            }
        }
        Command::Consume(key, amount) => match limiter.consume(&key, amount) {
            Ok(consumed) => Reply::Consumed { key, consumed },
            Err(e) => rejected(e),
        },
        Command::Credit(key, amount) => match limiter.add_credits(&key, amount) {
            Ok(credited) => Reply::Credited { key, credited },
            Err(e) => rejected(e),
        },
        Command::Status(key) => {
            let status = limiter.status(&key);
            Reply::Status { key, status }
        }
        Command::Keys => Reply::Keys {
            keys: limiter.key_count(),
        },
        Command::Sweep => Reply::Swept {
            swept: limiter.sweep_idle(),
        },
    }
}

/// Parse and run one request line. Blank lines produce no reply.
pub fn handle_line(limiter: &RateLimiter, line: &str) -> Option<Reply> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match line.parse::<Command>() {
        Ok(command) => Some(execute(limiter, command)),
        Err(e) => {
            warn!(line = %line, error = %e, "Rejected console request");
            Some(Reply::Error {
                error: e.to_string(),
            })
        }
    }
}

fn rejected(error: TollgateError) -> Reply {
    warn!(error = %error, "Console request failed");
    Reply::Error {
        error: error.to_string(),
    }
}
