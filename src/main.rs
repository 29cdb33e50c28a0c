use std::process::ExitCode;

use clap::Parser;
use drip::api::{Cli, Command, run_command, run_http_server};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    drip::logging::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { port } => match run_http_server(port).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!(error = %e, port, "server failed");
                eprintln!("Server error: {e}");
                ExitCode::from(1)
            }
        },
        command => run_command(&command),
    }
}
