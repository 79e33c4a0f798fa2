//! luaenv command line entry point

mod cli;
mod commands;
mod tracing;

use crate::cli::parse;
use crate::tracing::{TracingConfig, TracingFormat};
use ::tracing::{Instrument, instrument};

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    match run_main().await {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("{error:?}");
            std::process::exit(1);
        }
    }
}

#[instrument(name = "luaenv_main")]
async fn run_main() -> miette::Result<i32> {
    let cli = parse();

    let tracing_config = TracingConfig {
        format: if cli.json {
            TracingFormat::Json
        } else {
            TracingFormat::Compact
        },
        level: cli.level.into(),
        ..Default::default()
    };
    crate::tracing::init_tracing(tracing_config)?;

    let command = cli.command.into_command(cli.format);
    let span = command_span!(command.name());
    commands::execute(command).instrument(span).await
}
