//! Command-line interface definition for Chatdeck
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for chatting, authentication, and conversation
//! management against the remote backend.

use clap::{Parser, Subcommand};

/// Chatdeck - terminal chat client for a remote chat backend
///
/// Streams assistant replies (with reasoning shown separately) and keeps
/// conversations in sync with the backend.
#[derive(Parser, Debug, Clone)]
#[command(name = "chatdeck")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to the credential file (token, username, conversation cache)
    #[arg(long, env = "CHATDECK_CREDENTIALS")]
    pub credentials: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Chatdeck
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start interactive chat, or send a single prompt with --prompt
    Chat {
        /// Conversation ID to open (a new conversation is created when omitted)
        #[arg(short = 'C', long)]
        conversation: Option<String>,

        /// Override the model from config
        #[arg(short, long)]
        model: Option<String>,

        /// Enable deep thinking for this session
        #[arg(long)]
        deep_think: bool,

        /// Enable online search for this session (takes priority over deep thinking)
        #[arg(long)]
        online_search: bool,

        /// Send one prompt, print the reply, and exit
        #[arg(short, long)]
        prompt: Option<String>,
    },

    /// Log in and store the access token locally
    Login {
        /// Account username
        #[arg(short, long)]
        username: String,

        /// Account password
        #[arg(short, long, env = "CHATDECK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Register a new account and store the access token locally
    Register {
        /// Account username
        #[arg(short, long)]
        username: String,

        /// Account password
        #[arg(short, long, env = "CHATDECK_PASSWORD", hide_env_values = true)]
        password: String,

        /// Contact email
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Log out and clear local credentials
    Logout,

    /// Manage conversations
    Conversations {
        /// Conversation management subcommand
        #[command(subcommand)]
        command: ConversationCommand,
    },

    /// Print the transcript of a conversation
    Messages {
        /// Conversation ID
        conversation_id: String,
    },
}

/// Conversation management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConversationCommand {
    /// List conversations for the logged-in user
    List,

    /// Create a new conversation
    Create {
        /// Conversation title
        #[arg(short, long, default_value = "")]
        title: String,

        /// Model name (defaults to the configured model)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Rename a conversation
    Rename {
        /// Conversation ID
        id: String,

        /// New title
        title: String,
    },

    /// Delete a conversation
    Delete {
        /// Conversation ID
        id: String,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
