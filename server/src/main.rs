use clap::Parser;
use log::{error, info};
use server::config::{SessionConfig, DEFAULT_GAMEPLAY_SCENE};
use server::network::{Server, ServerMessage};
use shared::CodeAlphabet;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Maximum number of participants
    #[arg(short, long, default_value = "4")]
    capacity: usize,

    /// Inputs older than this many milliseconds are ignored
    #[arg(short, long, default_value = "100")]
    freshness_ms: u64,

    /// Start the session as soon as the lobby is full
    #[arg(short, long)]
    auto_start: bool,

    /// Use digits only for the session code
    #[arg(long)]
    numeric_code: bool,

    /// Physics steps per second
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    /// Scene participants load when the session starts
    #[arg(long, default_value = DEFAULT_GAMEPLAY_SCENE)]
    scene: String,
}

impl Args {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            capacity: self.capacity,
            freshness_window: Duration::from_millis(self.freshness_ms),
            auto_start_when_full: self.auto_start,
            code_alphabet: if self.numeric_code {
                CodeAlphabet::Numeric
            } else {
                CodeAlphabet::Alphanumeric
            },
            tick_rate: self.tick_rate,
            gameplay_scene: self.scene.clone(),
            ..SessionConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);

    let mut server = Server::new(&address, args.session_config()).await?;
    info!(
        "Lobby open, share code {} ({} slots)",
        server.session_code(),
        args.capacity
    );
    println!("Session code: {}", server.session_code());

    let shutdown = server.shutdown_handle();
    let run = server.run();
    tokio::pin!(run);

    let result = tokio::select! {
        result = &mut run => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            // Let the loop tell participants before it exits
            let _ = shutdown.send(ServerMessage::Shutdown);
            run.await
        }
    };

    if let Err(e) = result {
        error!("Server error: {}", e);
    }

    Ok(())
}
