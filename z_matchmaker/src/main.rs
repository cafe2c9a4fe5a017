use clap::Parser;
use std::path::PathBuf;
use zenoh::key_expr::KeyExpr;
use zenoh_matchmaker::{CoordinatorConfig, SessionExt};

/// z_matchmaker - Zenoh Matchmaking Coordinator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Coordinator name used in vector clocks
    #[arg(short, long, default_value = "Matchmaker")]
    name: String,

    /// Key expression prefix
    #[arg(short, long)]
    prefix: Option<KeyExpr<'static>>,

    /// Matchmaking period in milliseconds
    #[arg(short, long, default_value_t = 2000)]
    tick_ms: u64,

    /// Timeout of one AssignMatch attempt in milliseconds
    #[arg(long, default_value_t = 5000)]
    dispatch_timeout_ms: u64,

    /// AssignMatch attempts before a server is declared DOWN
    #[arg(long, default_value_t = 3)]
    attempts: u32,

    /// Path to Zenoh config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Create zenoh config
    let zenoh_config = if let Some(config_path) = args.config {
        zenoh::Config::from_file(config_path)
            .map_err(|e| format!("Failed to load config file: {}", e))?
    } else {
        zenoh::Config::default()
    };

    // Create zenoh session
    let session = zenoh::open(zenoh_config)
        .await
        .map_err(|e| format!("Failed to open zenoh session: {}", e))?;

    let mut config = CoordinatorConfig::new()
        .with_coordinator_id(args.name.clone())
        .with_tick_interval_ms(args.tick_ms)
        .with_dispatch_timeout_ms(args.dispatch_timeout_ms)
        .with_dispatch_attempts(args.attempts);
    if let Some(prefix) = args.prefix.clone() {
        config = config.with_keyexpr_prefix(prefix);
    }
    let prefix = config.keyexpr_prefix.clone();

    let service = session.declare_coordinator().config(config).await?;

    println!("=== z_matchmaker - Zenoh Matchmaking Coordinator ===");
    println!("Coordinator: {}", service.coordinator().id());
    println!("Prefix: {}", prefix);
    println!("Round every {} ms", args.tick_ms);
    println!("Press Ctrl-C to stop");
    println!();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    let clock = service.coordinator().clock().await;
    service.stop().await?;
    println!("Final clock: {}", clock);
    println!("Goodbye!");
    Ok(())
}
