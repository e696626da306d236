use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chatmux_core::{CapabilityTag, Conversation, ConversationId, ThreadEntry, thread_view};
use chatmux_manager::Manager;
use chatmux_provider_registry::ProviderRegistry;
use chatmux_telemetry::{TelemetryConfig, init_telemetry};
use clap::{Parser, Subcommand};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

mod config;

use config::CliConfig;

#[derive(Parser, Debug)]
#[command(
    name = "chatmux",
    version,
    about = "Read and reply to conversations from every configured provider"
)]
struct Cli {
    /// Config file (defaults to $CHATMUX_CONFIG, then the user config dir).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// List the merged conversations, newest first
    Conversations,
    /// Show one conversation's messages in order
    Messages {
        #[arg(value_name = "CONVERSATION_ID")]
        conversation: String,
    },
    /// Send a message, then print the refreshed thread
    Send {
        #[arg(value_name = "CONVERSATION_ID")]
        conversation: String,
        text: String,
    },
    /// Ask whether a conversation offers a capability (reply, attachments, subject, ...)
    Supports {
        capability: String,
        #[arg(value_name = "CONVERSATION_ID")]
        conversation: String,
    },
}

#[derive(Serialize)]
struct ConversationRow {
    id: ConversationId,
    title: String,
    provider: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    created_by_local_account: bool,
    preview: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_telemetry(
        TelemetryConfig::from_env("chatmux")
            .for_cli()
            .with_default_filter("warn"),
    )?;

    let config = CliConfig::load(cli.config.as_deref())?;
    let manager = build_manager(&config)?;

    match cli.command {
        CliCommand::Conversations => handle_conversations(&manager, cli.json).await,
        CliCommand::Messages { conversation } => {
            handle_messages(&manager, &conversation, cli.json).await
        }
        CliCommand::Send { conversation, text } => {
            handle_send(&manager, &conversation, &text, cli.json).await
        }
        CliCommand::Supports {
            capability,
            conversation,
        } => handle_supports(&manager, &capability, &conversation, cli.json).await,
    }
}

fn build_manager(config: &CliConfig) -> Result<Manager> {
    let registry = ProviderRegistry::bundled().context("loading bundled providers")?;
    let mut builder = Manager::builder().config(config.manager_config());
    for provider in &config.providers {
        let adapter = registry
            .build(provider)
            .with_context(|| format!("configuring provider `{}`", provider.id))?;
        builder = builder.register(adapter)?;
        debug!(provider = %provider.id, kind = %provider.kind, "provider registered");
    }
    Ok(builder.build())
}

async fn find_conversation(manager: &Manager, id: &str) -> Result<Conversation> {
    manager.list_conversations().await;
    manager
        .conversation(&ConversationId::from(id))
        .await
        .ok_or_else(|| anyhow!("unknown conversation `{id}`"))
}

async fn handle_conversations(manager: &Manager, json: bool) -> Result<()> {
    let conversations = manager.list_conversations().await;
    manager.refresh_previews(&conversations).await;

    let rows: Vec<ConversationRow> = conversations
        .iter()
        .map(|conversation| ConversationRow {
            id: conversation.id.clone(),
            title: conversation.display_title().to_string(),
            provider: conversation.provider().to_string(),
            created_at: conversation.created_at,
            created_by_local_account: conversation.created_by_local_account,
            preview: manager.preview(&conversation.id),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("no conversations");
    }
    for row in rows {
        println!(
            "{}\t{}\t{}\t{}",
            row.id,
            row.title,
            row.created_at.format(&Rfc3339)?,
            row.preview.unwrap_or_default()
        );
    }
    Ok(())
}

async fn handle_messages(manager: &Manager, id: &str, json: bool) -> Result<()> {
    let conversation = find_conversation(manager, id).await?;
    let entries = manager.thread(&conversation).await?;
    print_thread(&conversation, &entries, json)
}

async fn handle_send(manager: &Manager, id: &str, text: &str, json: bool) -> Result<()> {
    let conversation = find_conversation(manager, id).await?;
    let outcome = manager
        .send(Some(&conversation), text)
        .await
        .with_context(|| format!("sending to `{id}`"))?;
    match outcome.messages {
        Some(messages) => {
            let entries = thread_view(
                &conversation,
                &messages,
                &manager.config().local_display_name,
            );
            print_thread(&conversation, &entries, json)
        }
        None => {
            eprintln!("message sent; refreshing the thread failed");
            Ok(())
        }
    }
}

async fn handle_supports(manager: &Manager, capability: &str, id: &str, json: bool) -> Result<()> {
    let tag: CapabilityTag = capability.parse()?;
    let conversation = find_conversation(manager, id).await?;
    let supported = manager.supports(&tag, &conversation);
    if json {
        println!(
            "{}",
            serde_json::json!({ "capability": tag, "conversation": conversation.id, "supported": supported })
        );
    } else {
        println!("{supported}");
    }
    Ok(())
}

fn print_thread(conversation: &Conversation, entries: &[ThreadEntry], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }
    println!("# {}", conversation.display_title());
    for entry in entries {
        let marker = if entry.outgoing { ">" } else { "<" };
        println!(
            "{marker} [{}] {}: {}",
            entry.sent_at.format(&Rfc3339)?,
            entry.author,
            entry.body
        );
        for attachment in &entry.attachments {
            println!("    attachment: {} <{}>", attachment.name, attachment.url);
        }
    }
    Ok(())
}
