use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use log::debug;

use flexcli::{FlexCli, RunError, RuntimeContext, load_config, logger};

/// Explicit config file, instead of searching upwards from the working directory
const CONFIG_ENV: &str = "FLEXCLI_CONFIG";
/// Also write log records to this file
const LOG_FILE_ENV: &str = "FLEXCLI_LOG_FILE";

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let log_file = match std::env::var_os(LOG_FILE_ENV) {
        Some(path) => Some(File::create(PathBuf::from(path))?),
        None => None,
    };
    logger::init(log_file);

    let context = RuntimeContext::from_env()?;
    let config_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let config = load_config(config_path.as_deref(), &context)?;
    debug!("Starting {} in {}", config.name, context.cwd.display());

    let cli = FlexCli::new(config, context);
    match cli.run().await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(RunError::Args(e)) => {
            e.print()?;
            Ok(ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1)))
        }
        Err(e) => Err(e.into()),
    }
}
