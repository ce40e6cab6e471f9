use clap::Parser;
use lunch_ledger::args::{Args, Command};
use lunch_ledger::{api, commands, Config, Mode, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine, the variables may already be in the environment.
    let dotenv = dotenvy::dotenv();
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());
    if let Ok(path) = dotenv {
        debug!("Loaded environment from {}", path.display());
    }

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");

    // This allows for running the program without hitting the Google APIs. When
    // LUNCH_LEDGER_IN_TEST_MODE is set and non-empty, then the mode will be Mode::Test,
    // otherwise it will be Mode::Google.
    let mode = Mode::from_env();
    debug!("Running in {mode} mode");

    let config = Config::new(args.common().source(), mode)?;
    let connector = api::connector(&config, mode)?;

    let _: () = match args.command() {
        Command::Serve(serve_args) => commands::serve(config, connector, serve_args.bind())
            .await?
            .print(),
        Command::Common => commands::common(connector.as_ref(), &config)
            .await?
            .print_json()?,
        Command::Sum => commands::sum(connector.as_ref(), &config)
            .await?
            .print_json()?,
        Command::Monthly => commands::monthly(connector.as_ref(), &config)
            .await?
            .print_json()?,
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        // RUST_LOG exists; use it.
        Some(_) => EnvFilter::from_default_env(),
        // Otherwise the log level applies to this crate only. The library and the binary share the
        // crate name `lunch_ledger`.
        None => EnvFilter::new(format!("{}={level}", env!("CARGO_CRATE_NAME"))),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
