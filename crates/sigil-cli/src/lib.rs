//! Sigil CLI
//!
//! Thin front end over `sigil-core`: argument parsing, file I/O and ctrl-c
//! cancellation. Each subcommand is a function from parsed arguments and
//! input bytes to output bytes, so it can be driven without a terminal.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod io;

pub use cli::{Args, Command};
pub use commands::run;
pub use error::{CliError, Result};
