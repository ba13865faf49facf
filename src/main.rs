// stroke_risk - main.rs
// Command-line front end for the risk engine

use anyhow::Context;
use clap::Parser;
use stroke_risk::cli::{run, Cli};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stroke_risk=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let output = run(cli).context("stroke_risk command failed")?;

    let rendered = serde_json::to_string_pretty(&output).context("rendering output")?;
    println!("{rendered}");
    Ok(())
}
