#[path = "atl/app/mod.rs"]
mod app;
#[path = "atl/args.rs"]
mod args;
#[path = "atl/config/mod.rs"]
mod config;
#[path = "atl/logging.rs"]
mod logging;

use clap::Parser;

#[tokio::main]
async fn main() {
    let args = args::CliArgs::parse();
    let debug = args.debug;
    if let Err(err) = app::run(args).await {
        std::process::exit(app::report(&err, debug));
    }
}
