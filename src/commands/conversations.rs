//! Conversation list, transcripts, and the `conversations`/`messages` commands
//!
//! Shared by the chat REPL and the one-shot subcommands.

use crate::api::messages::to_chat_messages;
use crate::api::ApiClient;
use crate::cli::ConversationCommand;
use crate::config::Config;
use crate::conversation::{ChatMessage, Conversation, ConversationStore, Role};
use crate::credentials::CredentialStore;
use crate::error::{ChatdeckError, Result};
use crate::stream::{THINK_CLOSE, THINK_OPEN};

use colored::Colorize;
use prettytable::{format, Table};

/// Fetch the conversation list into `store` and refresh the cache
///
/// On failure the cached list is loaded instead and the error is returned
/// so the caller can report it.
pub async fn refresh_conversations(
    client: &ApiClient,
    store: &mut ConversationStore,
    credentials: &mut CredentialStore,
) -> Result<()> {
    match client.list_conversations().await {
        Ok(records) => {
            store.set_conversations(records.iter().map(|r| r.to_conversation()).collect());
            credentials.cache_conversations(store.conversations())?;
            Ok(())
        }
        Err(e) => {
            tracing::warn!("Falling back to cached conversation list: {:#}", e);
            if store.is_empty() {
                store.set_conversations(credentials.cached_conversations());
            }
            Err(e)
        }
    }
}

/// Make sure the transcript of `id` is in the store
pub async fn ensure_loaded(client: &ApiClient, store: &mut ConversationStore, id: &str) -> Result<()> {
    let loaded = store
        .get(id)
        .ok_or_else(|| ChatdeckError::NotFound(format!("conversation {}", id)))?
        .is_loaded();
    if loaded {
        return Ok(());
    }

    let items = client.fetch_messages(id).await?;
    let messages = to_chat_messages(&items, || store.next_timestamp());
    store.hydrate(id, messages)
}

/// Create a conversation on the backend and add it to the store
pub async fn create_conversation(
    client: &ApiClient,
    store: &mut ConversationStore,
    title: &str,
    model: &str,
) -> Result<String> {
    let record = client.create_conversation(title, model).await?;
    let id = record.id.clone();
    store.insert(record.to_conversation());
    Ok(id)
}

/// Resolve a 1-based list number or an id to a conversation id
pub fn resolve_conversation(store: &ConversationStore, selector: &str) -> Result<String> {
    if let Some(conv) = store.get(selector) {
        return Ok(conv.id.clone());
    }
    selector
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| store.conversations().get(i))
        .map(|c| c.id.clone())
        .ok_or_else(|| ChatdeckError::NotFound(format!("conversation {}", selector)).into())
}

/// Split an assistant display string into reasoning and answer
pub fn split_display(content: &str) -> (Option<&str>, &str) {
    if let Some(rest) = content.strip_prefix(THINK_OPEN) {
        if let Some((reasoning, answer)) = rest.split_once(THINK_CLOSE) {
            return (Some(reasoning), answer.strip_prefix(' ').unwrap_or(answer));
        }
    }
    (None, content)
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Print the conversation list
pub fn print_conversation_table(conversations: &[Conversation], active: Option<&str>) {
    if conversations.is_empty() {
        println!("{}", "No conversations found.".yellow());
        return;
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row![
        "#".bold(),
        "ID".bold(),
        "Title".bold(),
        "Model".bold(),
        "Created".bold()
    ]);

    for (i, conv) in conversations.iter().enumerate() {
        let marker = if active == Some(conv.id.as_str()) {
            format!("*{}", i + 1)
        } else {
            (i + 1).to_string()
        };
        let title = if conv.title.is_empty() {
            "(untitled)".to_string()
        } else {
            truncate(&conv.title, 40)
        };
        table.add_row(prettytable::row![
            marker,
            conv.id.cyan(),
            title,
            conv.model.as_deref().unwrap_or("-"),
            conv.created_at.format("%Y-%m-%d %H:%M").to_string()
        ]);
    }

    table.printstd();
}

/// Print a transcript with message numbers
pub fn print_transcript(messages: &[ChatMessage]) {
    if messages.is_empty() {
        println!("{}", "No messages yet.".yellow());
        return;
    }

    for (i, msg) in messages.iter().enumerate() {
        let number = format!("[{}]", i + 1).dimmed();
        match msg.role {
            Role::User => println!("{} {} {}", number, "you:".bold().green(), msg.content),
            Role::Assistant if msg.is_error => println!("{} {} {}", number, "assistant:".bold().blue(), msg.content.red()),
            Role::Assistant => {
                let (reasoning, answer) = split_display(&msg.content);
                println!("{} {}", number, "assistant:".bold().blue());
                if let Some(reasoning) = reasoning {
                    println!("{}", reasoning.trim().dimmed().italic());
                }
                println!("{}", answer);
            }
        }
    }
}

/// `chatdeck conversations ...`
pub async fn handle_conversations(config: &Config, command: ConversationCommand) -> Result<()> {
    let mut credentials = CredentialStore::open(&config.storage)?;
    let client = ApiClient::new(&config.backend)?.with_token(credentials.token().map(str::to_string));
    let mut store = ConversationStore::new();

    match command {
        ConversationCommand::List => {
            refresh_conversations(&client, &mut store, &mut credentials).await?;
            println!("\nConversations:");
            print_conversation_table(store.conversations(), None);
            println!();
            println!("Use {} to continue one.", "chatdeck chat -C <ID>".cyan());
        }
        ConversationCommand::Create { title, model } => {
            let model = model.unwrap_or_else(|| config.chat.model.clone());
            store.set_conversations(credentials.cached_conversations());
            let id = create_conversation(&client, &mut store, &title, &model).await?;
            credentials.cache_conversations(store.conversations())?;
            println!("{} Created conversation {}", "✓".green(), id.cyan());
        }
        ConversationCommand::Rename { id, title } => {
            client.rename_conversation(&id, &title).await?;
            store.set_conversations(credentials.cached_conversations());
            if store.rename(&id, title.as_str()).is_ok() {
                credentials.cache_conversations(store.conversations())?;
            }
            println!("{} Renamed {} to {}", "✓".green(), id.cyan(), title.bold());
        }
        ConversationCommand::Delete { id } => {
            client.delete_conversation(&id).await?;
            store.set_conversations(credentials.cached_conversations());
            if store.remove(&id).is_ok() {
                credentials.cache_conversations(store.conversations())?;
            }
            println!("{} Deleted {}", "✓".green(), id.cyan());
        }
    }
    Ok(())
}

/// `chatdeck messages <id>`
pub async fn handle_messages(config: &Config, conversation_id: &str) -> Result<()> {
    let credentials = CredentialStore::open(&config.storage)?;
    let client = ApiClient::new(&config.backend)?.with_token(credentials.token().map(str::to_string));

    let items = client.fetch_messages(conversation_id).await?;
    let mut clock = crate::conversation::MessageClock::new();
    let messages = to_chat_messages(&items, || clock.next_timestamp());
    print_transcript(&messages);
    Ok(())
}
