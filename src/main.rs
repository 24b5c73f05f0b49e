//! Binary entry point: parse arguments, set up logging, run, map exit codes

use clap::Parser;
use snaplink::cli::Args;
use tracing::Level;

fn main() {
    let args = Args::parse();
    if let Err(err) = args.validate() {
        eprintln!("{err:#}");
        std::process::exit(2);
    }
    init_tracing(&args);

    let opts = args.to_options();
    match snaplink::replicate(&opts) {
        Ok(stats) => stats.log_summary(),
        Err(err) => {
            // Operation failures and readdir errors were already reported
            // at the failure sink; precondition failures print here.
            if !err.already_reported() {
                eprintln!("{err}");
            }
            std::process::exit(err.exit_code());
        }
    }
}

fn init_tracing(args: &Args) {
    let level = if args.output.debug {
        Level::DEBUG
    } else if args.output.verbose {
        Level::INFO
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
