use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use zenoh::key_expr::KeyExpr;
use zenoh_matchmaker::{FaultPolicy, NeverFail, RandomFaults, SessionExt};

/// z_gameserver - Simulated Game Server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server name (auto-generated if absent)
    #[arg(short, long)]
    name: Option<String>,

    /// Address handed to matched players
    #[arg(short, long, default_value = "localhost:7000")]
    address: String,

    /// Key expression prefix
    #[arg(short, long)]
    prefix: Option<KeyExpr<'static>>,

    /// Shortest simulated match in milliseconds
    #[arg(long, default_value_t = 10_000)]
    min_match_ms: u64,

    /// Longest simulated match in milliseconds
    #[arg(long, default_value_t = 20_000)]
    max_match_ms: u64,

    /// Heartbeat period in milliseconds
    #[arg(long, default_value_t = 5000)]
    heartbeat_ms: u64,

    /// Probability of refusing an assignment (0.0 - 1.0)
    #[arg(long, default_value_t = 0.0)]
    reject_probability: f64,

    /// Probability of going DOWN after a match (0.0 - 1.0)
    #[arg(long, default_value_t = 0.0)]
    crash_probability: f64,

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

    let faults: Arc<dyn FaultPolicy> = if args.reject_probability > 0.0 || args.crash_probability > 0.0 {
        Arc::new(RandomFaults::new(args.reject_probability, args.crash_probability))
    } else {
        Arc::new(NeverFail)
    };

    // Declare the server with configured parameters
    let mut builder = session
        .declare_game_server()
        .address(args.address.clone())
        .match_duration_ms(args.min_match_ms, args.max_match_ms)
        .heartbeat_interval_ms(args.heartbeat_ms)
        .faults(faults);

    // Apply name if provided
    if let Some(name) = args.name.clone() {
        builder = builder.name(name)?;
    }

    // Apply prefix if provided
    if let Some(prefix) = args.prefix.clone() {
        builder = builder.prefix(prefix);
    }

    let service = builder.await?;

    println!("=== z_gameserver - Simulated Game Server ===");
    println!("Server ID: {}", service.node().id());
    println!("Address: {}", service.node().address());
    if let Some(ref prefix) = args.prefix {
        println!("Prefix: {}", prefix);
    }
    println!("Press Ctrl-C to stop");
    println!();

    tokio::select! {
        _ = service.wait_down() => {
            println!("Server went DOWN");
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Shutting down");
        }
    }

    println!("Final clock: {}", service.node().clock().await);
    service.stop();
    println!("Goodbye!");
    Ok(())
}
