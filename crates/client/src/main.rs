// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::{Parser, Subcommand};
use tracing::{error, info};

use medilink::config::Config;
use medilink::event::ClientEvent;
use medilink::Client;

#[derive(Debug, Parser)]
#[command(name = "medilink", about = "Medilink healthcare platform client")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in and print the resulting identity.
    Login {
        #[arg(long, env = "MEDILINK_EMAIL")]
        email: String,
        #[arg(long, env = "MEDILINK_PASSWORD")]
        password: String,
    },
    /// Follow a chat surface, printing inbound messages until Ctrl-C.
    Tail {
        /// City-wide room to join.
        #[arg(long)]
        city: Option<String>,
        /// Community room to join.
        #[arg(long)]
        room: Option<String>,
        /// Counterpart user id for a one-on-one conversation.
        #[arg(long)]
        peer: Option<String>,
        #[arg(long, env = "MEDILINK_EMAIL")]
        email: Option<String>,
        #[arg(long, env = "MEDILINK_PASSWORD")]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    init_tracing(&cli.config);

    if let Err(e) = run(cli).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match config.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).init();
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let client = Client::build(cli.config.clone())?;

    match cli.command {
        Command::Login { email, password } => {
            let session = client.auth.login(&email, &password).await?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        Command::Tail { city, room, peer, email, password } => {
            let session = match client.auth.current() {
                Some(session) => {
                    info!(user = %session.id, "using stored session");
                    session
                }
                None => {
                    let (email, password) = email.zip(password).ok_or_else(|| {
                        anyhow::anyhow!("no stored session; pass --email and --password")
                    })?;
                    client.auth.login(&email, &password).await?
                }
            };

            // Surface notices and redirects on stderr while tailing.
            let mut events = client.events.subscribe();
            tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    match event {
                        ClientEvent::SessionExpired { reason } => {
                            eprintln!("! session expired: {reason}");
                        }
                        ClientEvent::NavigateLogin => eprintln!("! signed out, log in again"),
                        ClientEvent::Notice { message } => eprintln!("! {message}"),
                    }
                }
            });

            let _subscription = client
                .socket
                .subscribe(|msg| println!("[{}] {}: {}", msg.room, msg.sender_name, msg.body));

            if let Some(ref city) = city {
                client.socket.join_room(city, &session.id).await?;
            }
            if let Some(ref room) = room {
                client.socket.join_community_room(room, &session.id).await?;
            }
            if let Some(ref peer) = peer {
                client.socket.join_dm_room(&session.id, peer).await?;
            }

            info!("tailing messages, Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
        }
    }

    client.shutdown().await;
    Ok(())
}
