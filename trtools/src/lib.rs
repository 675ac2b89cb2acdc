//! Shared plumbing for the TimeRanger command-line tools.

pub mod args;
pub mod error;
pub mod logging;
pub mod output;
pub mod targets;

use clap::Parser;

pub use error::{CliError, Result};

/// Parse the process arguments.
///
/// Help and version output exit 0; rejected flags exit with the usage code.
pub fn parse_args<C: Parser>() -> C {
    C::try_parse().unwrap_or_else(|e| {
        if !e.use_stderr() {
            e.exit()
        }
        let _ = e.print();
        std::process::exit(CliError::from(e).exit_code())
    })
}

/// Report a failed run on stderr and exit with its code.
pub fn exit_on_error(result: Result<()>) {
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
