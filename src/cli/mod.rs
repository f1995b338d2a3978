mod export;
mod schema;
mod start;
pub(crate) mod validator;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use self::export::ExportCommandArguments;
use self::start::StartCommandArguments;
use self::validator::parser::{LogFilter, LogFilterParser};
use crate::cnf::{LOGO, PKG_VERSION};
use crate::telemetry::LogFormat;

const INFO: &str = "
To get started, point pgql at a Postgres database and open the GraphiQL explorer:

  $ pgql start --connection postgres://localhost/mydb --schema app

Requests run as the role their JWT names. Rebuilds follow schema changes with --watch.
";

#[derive(Parser, Debug)]
#[command(name = "pgql command-line interface and GraphQL server", bin_name = "pgql")]
#[command(version = PKG_VERSION, about = INFO, before_help = LOGO)]
#[command(disable_version_flag = false, arg_required_else_help = true)]
struct Cli {
	#[arg(help = "The logging level for the command-line tool")]
	#[arg(env = "PGQL_LOG", short = 'l', long = "log", global = true)]
	#[arg(default_value = "info", value_parser = LogFilterParser::new())]
	log: LogFilter,
	#[arg(help = "The format of the log output")]
	#[arg(env = "PGQL_LOG_FORMAT", long = "log-format", global = true)]
	#[arg(value_enum, default_value_t = LogFormat::Text)]
	log_format: LogFormat,
	#[command(subcommand)]
	command: Commands,
}

#[derive(Debug, Subcommand)]
#[allow(clippy::large_enum_variant)]
enum Commands {
	#[command(about = "Serve the GraphQL schema of a Postgres database")]
	Start(StartCommandArguments),
	#[command(about = "Build the schema once and write it to files")]
	Export(ExportCommandArguments),
}

pub fn init() -> ExitCode {
	let args = Cli::parse();
	// Initialize logging
	if let Err(e) = crate::telemetry::builder().with_filter(args.log).with_format(args.log_format).init() {
		eprintln!("Failed to initialize logging: {e}");
		return ExitCode::FAILURE;
	}
	// Start the async runtime
	let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
		Ok(runtime) => runtime,
		Err(e) => {
			error!("Failed to start the runtime: {e}");
			return ExitCode::FAILURE;
		}
	};
	let output = runtime.block_on(async move {
		match args.command {
			Commands::Start(args) => start::init(args).await,
			Commands::Export(args) => export::init(args).await,
		}
	});
	if let Err(e) = output {
		error!("{e:#}");
		ExitCode::FAILURE
	} else {
		ExitCode::SUCCESS
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn the_command_line_is_consistent() {
		use clap::CommandFactory;
		Cli::command().debug_assert();
	}

	#[test]
	fn options_are_shared_by_the_subcommands() {
		let cli = Cli::parse_from(["pgql", "export", "--read-cache", "Cargo.toml", "--export-schema-graphql", "out.graphql"]);
		assert!(matches!(cli.command, Commands::Export(_)));
		let cli = Cli::parse_from(["pgql", "--log-format", "json", "start", "--watch", "--jwt-secret", "s"]);
		assert_eq!(cli.log_format, LogFormat::Json);
		assert!(matches!(cli.command, Commands::Start(_)));
	}
}
