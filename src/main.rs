use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;

use cli::Cli;
use luacap::script::ScriptPayload;

fn main() {
    let (cli, payloads) = Cli::parse_with_scripts();

    // Initialize logging; stdout stays free for script output.
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(cli, payloads) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli, payloads: Vec<ScriptPayload>) -> Result<i32> {
    let code = luacap::run(
        payloads,
        &cli.captures,
        cli.filter.as_deref(),
        cli.script_args,
    )?;
    Ok(code)
}
