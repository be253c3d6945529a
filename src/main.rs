use std::process::ExitCode;

use chatline::{
    init_logging, lifecycle::wait_for_shutdown_signal, Application, Cli, Settings, SERVICE_NAME,
};
use clap::Parser;
use tracing::{error, info, info_span, Instrument};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load(&cli) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let logging = match init_logging(settings.logging_config()) {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("cannot initialize logging: {err}");
            return ExitCode::FAILURE;
        }
    };

    let root = info_span!("service", service = SERVICE_NAME, build = %settings.build);
    let code = match run(settings).instrument(root).await {
        Ok(()) => {
            info!(service = SERVICE_NAME, "Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(service = SERVICE_NAME, error = format!("{err:#}"), "Service stopped with error");
            ExitCode::FAILURE
        }
    };

    logging.shutdown();
    code
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    info!(
        environment = %settings.environment,
        config = %serde_json::to_string(&settings)?,
        "Configuration resolved"
    );

    let app = Application::build(settings).await?;
    info!(api = %app.api_addr(), debug = ?app.debug_addr(), "Starting service");

    app.run(wait_for_shutdown_signal()).await?;
    Ok(())
}
