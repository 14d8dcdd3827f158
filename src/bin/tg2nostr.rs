use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use tg2nostr::{Bridge, BridgeConfig, Dispatch, KeyRole, Update, init_tracing, normalize_key};

/// Relays Telegram channel posts to a Nostr relay
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Relay one Telegram update read from a file, or stdin when omitted
    Relay {
        #[clap(long, value_name = "FILE")]
        update: Option<PathBuf>,
    },
    /// Print a configured key (npub, nsec or hex) as lower-case hex
    NormalizeKey {
        #[clap(long, value_enum)]
        role: Role,
        key: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Role {
    Public,
    Secret,
}

impl From<Role> for KeyRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Public => KeyRole::Public,
            Role::Secret => KeyRole::Secret,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Relay { update } => relay(update).await,
        Command::NormalizeKey { role, key } => {
            println!("{}", normalize_key(&key, role.into())?);
            Ok(())
        }
    }
}

async fn relay(update_path: Option<PathBuf>) -> Result<()> {
    let config = BridgeConfig::from_env()?;
    init_tracing(config.logs_dir.as_deref())?;

    let raw = match &update_path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read update from {:?}", path))?,
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read update from stdin")?;
            raw
        }
    };
    let update: Update = serde_json::from_str(&raw).context("Update is not valid JSON")?;

    let bridge = Bridge::new(&config);
    let dispatch = bridge.handle_update(&update).await;
    bridge.shutdown().await;

    match dispatch? {
        Dispatch::Ignored => println!("No channel_post found"),
        Dispatch::Empty => println!("No text, caption, media or poll found"),
        Dispatch::Queued(_) => println!("Flushed media group"),
        Dispatch::Published { event_id, .. } => println!("Published event {}", event_id),
    }
    Ok(())
}
