use clap::Parser;
use color_eyre::eyre::Result;
use std::time::Duration;

mod client;
mod ui;

/// Open gift cases with Stars from the terminal.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON catalog of cases; the built-in catalog is used when omitted.
    #[arg(long)]
    catalog: Option<String>,

    /// Profile file to load and save; state is kept in memory when omitted.
    #[arg(long)]
    state: Option<String>,

    #[arg(long, default_value_t = client::DEFAULT_STARTING_STARS)]
    starting_stars: u64,

    /// Starting TON balance in hundredths.
    #[arg(long, default_value_t = client::DEFAULT_STARTING_TON)]
    starting_ton: u64,

    /// Seed for reproducible draws.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value_t = client::DEFAULT_SPIN_MILLIS)]
    spin_millis: u64,

    #[arg(long, default_value = "./logs")]
    log_dir: String,
}

impl Args {
    fn into_config(self) -> client::AppConfig {
        client::AppConfig {
            catalog_path: self.catalog.as_deref().map(client::expand_path),
            state_path: self.state.as_deref().map(client::expand_path),
            starting_stars: self.starting_stars,
            starting_ton: self.starting_ton,
            seed: self.seed,
            spin_duration: Duration::from_millis(self.spin_millis),
            log_dir: client::expand_path(&self.log_dir),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let config = Args::parse().into_config();
    let _log_guard = client::init_tracing(&config.log_dir)?;
    tracing::info!(seed = ?config.seed, "starting gift-cases");
    client::run_app(config).await
}
