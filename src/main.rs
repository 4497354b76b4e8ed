use stackpack::cli::commands::CliArgs;
use stackpack::cli::handlers::handle;
use stackpack::util::logging::{init_logging, LoggingConfig};
use stackpack::VERSION;

use clap::Parser;
use tracing::debug;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging(LoggingConfig::resolve(
        args.log_level.as_deref(),
        args.verbose,
        args.quiet,
    ));

    debug!("stackpack v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = handle(&args).await;

    std::process::exit(exit_code);
}
