//! The pgql command line interface and GraphQL server.

#![deny(clippy::mem_forget)]

use std::process::ExitCode;

fn main() -> ExitCode {
	pgql::cli::init()
}
