use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use console::{style, Term};
use std::path::PathBuf;
use zenoh::key_expr::KeyExpr;
use zenoh_matchmaker::config::DEFAULT_PREFIX;
use zenoh_matchmaker::protocol::{
    AdminServerUpdate, AdminStatusRequest, PlayerStatusRequest, QueuePlayerRequest, SystemStatus,
};
use zenoh_matchmaker::{CoordinatorClient, PlayerId, PlayerStatus, ServerId, ServerStatus, VectorClock};

/// z_lobby - Matchmaking Player and Admin Console
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    role: Role,

    /// Key expression prefix
    #[arg(short, long)]
    prefix: Option<KeyExpr<'static>>,

    /// Path to Zenoh config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Role {
    /// Queue for a match and follow its progress
    Player {
        /// Player id
        #[arg(short, long)]
        id: u32,

        /// Preferred game mode
        #[arg(short, long, default_value = "1v1")]
        mode: String,
    },
    /// Inspect the system and override server states
    Admin {
        /// Admin name sent with requests
        #[arg(short, long, default_value = "Admin")]
        name: String,
    },
}

/// Print `text` and read one line without blocking the runtime
///
/// Returns None on end of input.
async fn prompt(term: &Term, text: &str) -> anyhow::Result<Option<String>> {
    term.write_str(text)?;
    let reader = term.clone();
    match tokio::task::spawn_blocking(move || reader.read_line()).await? {
        Ok(line) => Ok(Some(line.trim().to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e).context("Failed to read input"),
    }
}

fn styled_player_status(status: PlayerStatus) -> String {
    match status {
        PlayerStatus::Idle => style(status).dim().to_string(),
        PlayerStatus::InQueue => style(status).yellow().to_string(),
        PlayerStatus::InMatch => style(status).green().bold().to_string(),
    }
}

fn styled_server_status(status: ServerStatus) -> String {
    match status {
        ServerStatus::Available => style(status).green().to_string(),
        ServerStatus::Busy => style(status).yellow().to_string(),
        ServerStatus::Down => style(status).red().to_string(),
    }
}

async fn player_menu(term: &Term, client: &CoordinatorClient, id: u32, mode: String) -> anyhow::Result<()> {
    let player_id = PlayerId(id);
    let node = format!("Player{}", id);
    let mut clock = VectorClock::new();

    loop {
        println!();
        println!("  1 - Join the queue");
        println!("  2 - Check my status");
        println!("  q - Quit");
        let Some(choice) = prompt(term, "> ").await? else {
            break;
        };

        match choice.as_str() {
            "1" => {
                clock.tick(&node);
                let request = QueuePlayerRequest {
                    player_id,
                    game_mode_preference: mode.clone(),
                    clock: clock.clone(),
                };
                match client.queue_player(&request).await {
                    Ok(response) => {
                        clock.absorb(&response.clock);
                        println!("{} {}", response.message, style(&clock).dim());
                    }
                    Err(e) => println!("{}", style(format!("Coordinator unavailable: {}", e)).red()),
                }
            }
            "2" => {
                clock.tick(&node);
                let request = PlayerStatusRequest {
                    player_id,
                    clock: clock.clone(),
                };
                match client.player_status(&request).await {
                    Ok(response) => {
                        clock.absorb(&response.clock);
                        println!("Status: {}", styled_player_status(response.status));
                        if let (Some(match_id), Some(address)) = (response.match_id, response.server_address) {
                            println!("Match {} on {}", match_id, style(address).cyan());
                        }
                        println!("{}", style(&clock).dim());
                    }
                    Err(e) => println!("{}", style(format!("Coordinator unavailable: {}", e)).red()),
                }
            }
            "q" | "Q" => break,
            "" => {}
            other => println!("Unknown option '{}'", other),
        }
    }
    Ok(())
}

fn print_system_status(status: &SystemStatus) {
    println!();
    println!("{}", style("Servers").bold());
    if status.servers.is_empty() {
        println!("  (none registered)");
    }
    for server in &status.servers {
        let current = server
            .current_match_id
            .map(|id| format!("match {}", id))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<16} {:<20} {:<24} {}",
            server.id.as_str(),
            styled_server_status(server.status),
            server.address,
            current
        );
    }

    println!("{}", style("Queue").bold());
    if status.queue.is_empty() {
        println!("  (empty)");
    }
    for (position, entry) in status.queue.iter().enumerate() {
        println!(
            "  {:>3}. player {:<8} waiting {:.1}s",
            position + 1,
            entry.player_id,
            entry.time_in_queue.as_secs_f64()
        );
    }
    println!("Clock: {}", style(&status.clock).dim());
}

async fn admin_menu(term: &Term, client: &CoordinatorClient, name: String) -> anyhow::Result<()> {
    loop {
        println!();
        println!("  1 - Show system status");
        println!("  2 - Change a server's state");
        println!("  q - Quit");
        let Some(choice) = prompt(term, "> ").await? else {
            break;
        };

        match choice.as_str() {
            "1" => {
                let request = AdminStatusRequest {
                    admin_id: name.clone(),
                };
                match client.admin_system_status(&request).await {
                    Ok(status) => print_system_status(&status),
                    Err(e) => println!("{}", style(format!("Coordinator unavailable: {}", e)).red()),
                }
            }
            "2" => {
                let Some(server) = prompt(term, "Server id: ").await? else {
                    break;
                };
                let server_id = match ServerId::from_name(server) {
                    Ok(id) => id,
                    Err(e) => {
                        println!("{}", style(e).red());
                        continue;
                    }
                };
                let Some(status) = prompt(term, "New state (AVAILABLE/DOWN): ").await? else {
                    break;
                };
                let new_status = match status.parse::<ServerStatus>() {
                    Ok(status) => status,
                    Err(e) => {
                        println!("{}", style(e).red());
                        continue;
                    }
                };

                let request = AdminServerUpdate {
                    server_id,
                    new_status,
                };
                match client.admin_update_server_state(&request).await {
                    Ok(response) if response.status_code.is_success() => {
                        println!("{}", style(response.message).green())
                    }
                    Ok(response) => println!(
                        "{} {}",
                        style(response.status_code).red().bold(),
                        response.message
                    ),
                    Err(e) => println!("{}", style(format!("Coordinator unavailable: {}", e)).red()),
                }
            }
            "q" | "Q" => break,
            "" => {}
            other => println!("Unknown option '{}'", other),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Create zenoh config
    let zenoh_config = if let Some(config_path) = args.config {
        zenoh::Config::from_file(config_path)
            .map_err(|e| anyhow!("Failed to load config file: {}", e))?
    } else {
        zenoh::Config::default()
    };

    // Create zenoh session
    let session = zenoh::open(zenoh_config)
        .await
        .map_err(|e| anyhow!("Failed to open zenoh session: {}", e))?;

    let prefix = match args.prefix {
        Some(prefix) => prefix,
        None => KeyExpr::try_from(DEFAULT_PREFIX).map_err(|e| anyhow!("{}", e))?,
    };
    let client = CoordinatorClient::new(session.clone(), prefix.clone());
    let term = Term::stdout();

    match args.role {
        Role::Player { id, mode } => {
            println!("=== z_lobby - Player {} ===", id);
            println!("Prefix: {}", prefix);
            player_menu(&term, &client, id, mode).await?;
        }
        Role::Admin { name } => {
            println!("=== z_lobby - Admin {} ===", name);
            println!("Prefix: {}", prefix);
            admin_menu(&term, &client, name).await?;
        }
    }

    println!("Goodbye!");
    Ok(())
}
