use anyhow::Context;
use clap::Parser;

use fin_assist::config::{AppConfig, Cli, Command};
use fin_assist::core::{SimulationInput, run_simulation};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // a missing .env is fine
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Serve(args) => {
            let config = AppConfig::try_from(*args).map_err(anyhow::Error::msg)?;
            fin_assist::api::run_http_server(config).await
        }
        Command::Simulate(args) => {
            let input = SimulationInput::new(args.initial_amount, args.annual_rate, args.years)
                .context("invalid simulation input")?;
            let result = run_simulation(&input);
            println!(
                "{}",
                serde_json::to_string_pretty(&result).context("failed to serialize result")?
            );
            Ok(())
        }
    }
}
