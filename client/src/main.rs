use clap::{Parser, ValueEnum};
use client::input::{ConstantInput, IdleInput, InputSource, WanderInput};
use client::network::{Client, JoinError};
use log::{error, info};
use shared::Vector2;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

const JOIN_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Bot {
    Idle,
    Right,
    Left,
    Wander,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Session code shown by the host. Asked for interactively when missing.
    #[arg(short, long)]
    code: Option<String>,

    /// Milliseconds between input samples
    #[arg(short, long, default_value = "16")]
    tick_ms: u64,

    /// Input the client produces
    #[arg(short, long, value_enum, default_value = "idle")]
    bot: Bot,

    /// Request sprint with every sample
    #[arg(long)]
    sprint: bool,

    /// Ask the host to start the session after joining
    #[arg(long)]
    start: bool,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,
}

impl Args {
    fn input_source(&self) -> Box<dyn InputSource> {
        match self.bot {
            Bot::Idle => Box::new(IdleInput),
            Bot::Right => Box::new(ConstantInput::new(Vector2::new(1.0, 0.0), self.sprint)),
            Bot::Left => Box::new(ConstantInput::new(Vector2::new(-1.0, 0.0), self.sprint)),
            Bot::Wander => Box::new(WanderInput::from_entropy()),
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

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }

    let mut client = Client::new(&args.server, args.fake_ping).await?;
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut code = args.code.clone();

    // Keep asking until a code works
    loop {
        let attempt = match code.take() {
            Some(code) => code,
            None => {
                println!("Enter session code:");
                match stdin.next_line().await? {
                    Some(line) => line,
                    None => return Ok(()),
                }
            }
        };

        match client.join(&attempt, JOIN_TIMEOUT).await {
            Ok(client_id) => {
                println!("Joined as player {}", client_id);
                break;
            }
            Err(e @ (JoinError::Rejected(_) | JoinError::InvalidCode(_) | JoinError::Timeout)) => {
                println!("Could not join: {}", e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    let mut source = args.input_source();
    let tick = Duration::from_millis(args.tick_ms.max(1));

    tokio::select! {
        result = client.run(source.as_mut(), tick, args.start) => {
            if let Err(e) = result {
                error!("Client error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, leaving session");
        }
    }

    client.disconnect().await?;
    Ok(())
}
