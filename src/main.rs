use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use nostr_chat::nostr::{MemoryConnector, MemoryRelay};
use nostr_chat::{
    generate_nsec, pubkey_from_nsec, use_nostr_chat, ChatConfig, ChatSession, Message,
    NostrChatProvider, User,
};

#[derive(Parser)]
#[command(name = "nostr-chat")]
#[command(about = "Nostr Chat - join public relay chat rooms", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new key pair (nsec + hex pubkey)
    Keygen,

    /// Print the hex public key of a secret key
    Pubkey {
        /// Secret key (nsec1...)
        #[arg(long)]
        nsec: String,
    },

    /// Join a room: print incoming messages and publish each line from stdin
    Chat {
        /// Room ID (all participants must use the same one)
        #[arg(long)]
        room: String,

        /// Secret key to post with (a fresh one is generated when omitted)
        #[arg(long)]
        nsec: Option<String>,

        /// Relay websocket URL (defaults to $NOSTR_CHAT_RELAY or wss://relay.damus.io)
        #[arg(long)]
        relay: Option<String>,

        /// Use an in-process relay instead of the network
        #[arg(long, default_value = "false")]
        offline: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen => {
            let keys = generate_nsec()?;
            println!("{}", serde_json::to_string_pretty(&keys)?);
        }
        Commands::Pubkey { nsec } => {
            println!("{}", pubkey_from_nsec(&nsec)?);
        }
        Commands::Chat {
            room,
            nsec,
            relay,
            offline,
        } => {
            chat(&room, nsec, relay, offline).await?;
        }
    }

    Ok(())
}

async fn chat(room: &str, nsec: Option<String>, relay: Option<String>, offline: bool) -> Result<()> {
    let config = match relay {
        Some(url) => ChatConfig::with_relay(url),
        None => ChatConfig::from_env(),
    };
    let provider = if offline {
        let connector = MemoryConnector::new(Arc::new(MemoryRelay::new()));
        NostrChatProvider::with_connector(config, Arc::new(connector))
    } else {
        NostrChatProvider::new(config)
    };

    // Spawned tasks are outside the provider scope, hand the session over
    let session = provider.session();
    let printer = tokio::spawn(print_messages(session.clone()));

    let result = provider
        .scope(async move {
            let chat = use_nostr_chat()?;

            let user = match nsec {
                Some(nsec) => User::new(pubkey_from_nsec(&nsec)?, nsec),
                None => {
                    let keys = chat.generate_nsec()?;
                    println!("Generated key pair:");
                    println!("{}", serde_json::to_string_pretty(&keys)?);
                    User::from(keys)
                }
            };

            println!("Joining room {} on {} as {}", room, chat.relay_url(), user.pubkey);
            chat.set_user(Some(user));
            chat.subscribe_room(room).await;
            if !chat.is_connected() {
                bail!("could not connect to relay {}", chat.relay_url());
            }

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                chat.publish_message(line).await?;
            }
            Ok::<(), anyhow::Error>(())
        })
        .await;

    printer.abort();
    session.disconnect().await;
    result
}

async fn print_messages(session: Arc<ChatSession>) {
    let mut rx = session.watch_messages();
    let mut printed = 0;

    while rx.changed().await.is_ok() {
        let messages = rx.borrow_and_update().clone().unwrap_or_default();
        // The list was reset by a room change
        if messages.len() < printed {
            printed = 0;
        }
        for message in &messages[printed..] {
            println!("{}", format_message(message));
        }
        printed = messages.len();
    }
}

fn format_message(message: &Message) -> String {
    let author: String = message.pubkey.chars().take(8).collect();
    match message.timestamp {
        Some(ts) => format!("[{}] {}: {}", ts, author, message.message),
        None => format!("{}: {}", author, message.message),
    }
}
