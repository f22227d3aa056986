use std::process::ExitCode;

use clap::Parser;
use log::info;

use utmka::{toast_error, App, AppController, Cli, Config, Result};

pub fn initialize_logger(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();

    info!("Logger initialized");
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(Config::default_config_path);
    let mut config = Config::load(&config_path)?;
    if let Some(api_url) = cli.api_url {
        config.set(&format!("api_base_url={}", api_url))?;
    }
    if let Some(user_email) = cli.user_email {
        config.set(&format!("user_email={}", user_email))?;
    }

    let (controller, renders) = AppController::from_config(config)?;
    let mut app = App::new(controller, renders, config_path, cli.verbose);
    app.run(cli.command).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    initialize_logger(cli.verbose);

    info!("Application starting up");
    let result = run(cli).await;
    info!("Application shutting down");

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            toast_error(&e);
            ExitCode::FAILURE
        }
    }
}
