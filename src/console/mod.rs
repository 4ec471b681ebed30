//! Console front end: a line protocol over stdin/stdout.
//!
//! Each request line (`check KEY`, `decide KEY`, `consume KEY AMOUNT`,
//! `credit KEY AMOUNT`, `status KEY`, `keys`, `sweep`) yields one JSON reply
//! line.

mod command;
mod session;

pub use command::{execute, handle_line, Command, CommandError, Reply};
pub use session::{spawn_idle_sweeper, Session};
