use clap::Parser;
use poly_flash::cli::{Cli, Commands};
use poly_flash::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize telemetry
    let _guard = poly_flash::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting market watch");
            args.execute(config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!(
                "  Market: {} (check every {}s, auto_switch={})",
                config.market.coin, config.market.check_interval_secs, config.market.auto_switch
            );
            println!("  Feed: {}", config.feed.ws_url);
            println!(
                "  Crash: drop >= {} within {}s (history {})",
                config.crash.drop_threshold, config.crash.lookback_seconds, config.crash.max_history
            );
            println!(
                "  Position: TP +{} / SL -{}, max {}, size ${}",
                config.position.take_profit,
                config.position.stop_loss,
                config.position.max_positions,
                config.position.trade_size
            );
        }
    }

    Ok(())
}
