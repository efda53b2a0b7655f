/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `chat`          - Interactive chat (or a single `--prompt`)
- `auth`          - Login, registration and logout
- `conversations` - Conversation management and transcripts

Handlers open the credential file, build an `ApiClient` carrying the stored
token, and drive the library types.
*/

pub mod auth;
pub mod conversations;
pub mod special_commands;

// Chat command handler
pub mod chat {
    //! Interactive chat handler.
    //!
    //! Loads the conversation list, selects or lazily creates a
    //! conversation, and runs a readline loop that streams each reply to the
    //! terminal as it arrives.

    use crate::api::{ApiClient, ChatBackend};
    use crate::capability::{Capabilities, Capability};
    use crate::commands::conversations::{
        create_conversation, ensure_loaded, print_conversation_table, print_transcript,
        refresh_conversations, resolve_conversation, split_display,
    };
    use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
    use crate::config::Config;
    use crate::conversation::{ChatMessage, ConversationStore, Role};
    use crate::credentials::CredentialStore;
    use crate::error::{ChatdeckError, Result};
    use crate::session::ChatSession;
    use crate::stream::{DisplaySink, StreamAssembler};

    use colored::Colorize;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;
    use std::io::Write;
    use std::sync::Arc;

    /// Prints a streaming reply incrementally
    ///
    /// Display updates carry the whole reply so far; only the new suffix of
    /// the reasoning and answer parts is written. An update that does not
    /// extend what was printed (an error notice replacing a partial reply)
    /// is written on a fresh line.
    #[derive(Debug, Default)]
    pub struct TerminalRenderer {
        reasoning: String,
        answer: String,
    }

    impl TerminalRenderer {
        pub fn new() -> Self {
            Self::default()
        }

        /// End the current reply and reset for the next one
        pub fn finish(&mut self) {
            if !self.reasoning.is_empty() || !self.answer.is_empty() {
                println!();
            }
            self.reasoning.clear();
            self.answer.clear();
        }

        /// New text to print for `display`: `(reasoning_delta, answer_delta, restart)`
        fn delta<'a>(&self, display: &'a str) -> (&'a str, &'a str, bool) {
            let (reasoning, answer) = split_display(display);
            let reasoning = reasoning.unwrap_or("");

            let reasoning_delta = if self.answer.is_empty() {
                reasoning.strip_prefix(self.reasoning.as_str()).unwrap_or("")
            } else {
                ""
            };

            match answer.strip_prefix(self.answer.as_str()) {
                Some(rest) => (reasoning_delta, rest, false),
                None => ("", answer, true),
            }
        }
    }

    impl DisplaySink for TerminalRenderer {
        fn emit(&mut self, display: &str) {
            let (reasoning_delta, answer_delta, restart) = self.delta(display);
            let mut out = std::io::stdout().lock();

            if restart {
                let _ = writeln!(out);
                let _ = write!(out, "{}", answer_delta.red());
                self.answer = answer_delta.to_string();
                let _ = out.flush();
                return;
            }

            if !reasoning_delta.is_empty() {
                let _ = write!(out, "{}", reasoning_delta.dimmed().italic());
                self.reasoning.push_str(reasoning_delta);
            }
            if !answer_delta.is_empty() {
                if self.answer.is_empty() && !self.reasoning.is_empty() {
                    let _ = writeln!(out);
                }
                let _ = write!(out, "{}", answer_delta);
                self.answer.push_str(answer_delta);
            }
            let _ = out.flush();
        }
    }

    /// Mutable state of one chat run
    struct ChatContext {
        client: ApiClient,
        credentials: CredentialStore,
        store: ConversationStore,
        session: ChatSession,
        /// Flags applied to conversations created during this run
        pending: Capabilities,
    }

    impl ChatContext {
        /// Active conversation id, creating a conversation if none is active
        async fn ensure_active(&mut self, title: &str) -> Result<String> {
            if let Some(id) = self.store.active_id() {
                return Ok(id.to_string());
            }
            self.new_conversation(title).await
        }

        async fn new_conversation(&mut self, title: &str) -> Result<String> {
            let model = self.session.model().to_string();
            let id = create_conversation(&self.client, &mut self.store, title, &model).await?;
            self.store.set_capability(&id, Capability::DeepThink, self.pending.deep_think)?;
            self.store
                .set_capability(&id, Capability::OnlineSearch, self.pending.online_search)?;
            self.store.activate(&id)?;
            self.save_cache();
            Ok(id)
        }

        async fn switch(&mut self, selector: &str) -> Result<()> {
            let id = resolve_conversation(&self.store, selector)?;
            ensure_loaded(&self.client, &mut self.store, &id).await?;
            self.store.activate(&id)?;
            Ok(())
        }

        fn save_cache(&mut self) {
            if let Err(e) = self.credentials.cache_conversations(self.store.conversations()) {
                tracing::warn!("Failed to update conversation cache: {:#}", e);
            }
        }

        fn active_messages(&self) -> Result<&[ChatMessage]> {
            let id = self
                .store
                .active_id()
                .ok_or_else(|| ChatdeckError::NotFound("no active conversation".to_string()))?;
            self.store.messages(id)
        }

        /// Timestamp of message number `n` (1-based) with the given role, or
        /// of the most recent message with that role
        fn select_message(&self, index: Option<usize>, role: Role) -> Result<i64> {
            let messages = self.active_messages()?;
            let found = match index {
                Some(n) => n
                    .checked_sub(1)
                    .and_then(|i| messages.get(i))
                    .filter(|m| m.role == role),
                None => messages.iter().rev().find(|m| m.role == role),
            };
            found.map(|m| m.timestamp).ok_or_else(|| {
                let what = match index {
                    Some(n) => format!("{} message #{}", role, n),
                    None => format!("last {} message", role),
                };
                ChatdeckError::NotFound(what).into()
            })
        }

        fn set_capability(&mut self, capability: Capability, value: Option<bool>) -> Result<bool> {
            let enabled = match (self.store.active_id().map(str::to_string), value) {
                (Some(id), Some(v)) => {
                    self.store.set_capability(&id, capability, v)?;
                    v
                }
                (Some(id), None) => self.store.toggle_capability(&id, capability)?,
                (None, Some(v)) => {
                    self.pending.set(capability, v);
                    v
                }
                (None, None) => self.pending.toggle(capability),
            };
            Ok(enabled)
        }

        fn capabilities(&self) -> Capabilities {
            self.store
                .active_id()
                .and_then(|id| self.store.capabilities(id).ok())
                .unwrap_or(self.pending)
        }

        fn prompt(&self) -> String {
            let title = self
                .store
                .active()
                .map(|c| if c.title.is_empty() { c.id.clone() } else { c.title.clone() })
                .unwrap_or_else(|| "new".to_string());
            format!("{} {} >> ", self.capabilities().colored_tag(), title.cyan())
        }
    }

    /// Start interactive chat, or answer a single prompt
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `conversation` - Conversation to continue (list number or id)
    /// * `model` - Model override
    /// * `deep_think` / `online_search` - Capability flags to switch on
    /// * `prompt` - Send this prompt, print the reply and exit
    pub async fn run_chat(
        config: Config,
        conversation: Option<String>,
        model: Option<String>,
        deep_think: bool,
        online_search: bool,
        prompt: Option<String>,
    ) -> Result<()> {
        let credentials = CredentialStore::open(&config.storage)?;
        if credentials.token().is_none() {
            println!(
                "{}",
                "Not logged in; conversation requests may be rejected. Run `chatdeck login`.".yellow()
            );
        }

        let client = ApiClient::new(&config.backend)?.with_token(credentials.token().map(str::to_string));
        let backend: Arc<dyn ChatBackend> = Arc::new(client.clone());
        let model = model.unwrap_or_else(|| config.chat.model.clone());
        let session = ChatSession::new(backend, StreamAssembler::from_config(&config.chat), model);

        let mut ctx = ChatContext {
            client,
            credentials,
            store: ConversationStore::new(),
            session,
            pending: Capabilities::new(
                deep_think || config.chat.deep_think,
                online_search || config.chat.online_search,
            ),
        };

        if let Err(e) = refresh_conversations(&ctx.client, &mut ctx.store, &mut ctx.credentials).await {
            eprintln!("{} Could not load conversations: {}", "!".yellow(), e);
        }

        if let Some(selector) = &conversation {
            ctx.switch(selector).await?;
            let id = ctx.store.active_id().map(str::to_string).unwrap_or_default();
            if deep_think {
                ctx.store.set_capability(&id, Capability::DeepThink, true)?;
            }
            if online_search {
                ctx.store.set_capability(&id, Capability::OnlineSearch, true)?;
            }
        }

        if let Some(text) = prompt {
            return answer_once(&mut ctx, &text).await;
        }

        run_repl(&mut ctx).await
    }

    async fn answer_once(ctx: &mut ChatContext, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(ChatdeckError::EmptyPrompt.into());
        }
        ctx.ensure_active(&title_for(text)).await?;
        let mut renderer = TerminalRenderer::new();
        let reply = ctx.session.send(&mut ctx.store, text, &mut renderer).await?;
        renderer.finish();
        ctx.save_cache();
        if reply.is_error {
            anyhow::bail!("{}", reply.content);
        }
        Ok(())
    }

    /// Title for a conversation created by its first prompt
    fn title_for(text: &str) -> String {
        let line = text.lines().next().unwrap_or("").trim();
        if line.chars().count() > 30 {
            line.chars().take(30).collect()
        } else {
            line.to_string()
        }
    }

    async fn run_repl(ctx: &mut ChatContext) -> Result<()> {
        let mut rl = DefaultEditor::new()?;
        print_welcome_banner(ctx);

        loop {
            match rl.readline(&ctx.prompt()) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(trimmed);

                    let command = match parse_special_command(trimmed) {
                        Ok(command) => command,
                        Err(e) => {
                            eprintln!("{}", e.to_string().red());
                            continue;
                        }
                    };

                    if command == SpecialCommand::Exit {
                        break;
                    }

                    if let Err(e) = handle_line(ctx, command, trimmed).await {
                        eprintln!("{} {}", "Error:".red().bold(), e);
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    tracing::error!("Readline error: {}", e);
                    return Err(e.into());
                }
            }
        }

        ctx.save_cache();
        println!("Goodbye!");
        Ok(())
    }

    async fn handle_line(ctx: &mut ChatContext, command: SpecialCommand, line: &str) -> Result<()> {
        let mut renderer = TerminalRenderer::new();

        match command {
            SpecialCommand::None => {
                ctx.ensure_active(&title_for(line)).await?;
                ctx.session.send(&mut ctx.store, line, &mut renderer).await?;
                renderer.finish();
                ctx.save_cache();
            }
            SpecialCommand::Reload(index) => {
                let ts = ctx.select_message(index, Role::Assistant)?;
                ctx.session.reload(&mut ctx.store, ts, &mut renderer).await?;
                renderer.finish();
                ctx.save_cache();
            }
            SpecialCommand::Edit { index, content } => {
                let ts = ctx.select_message(index, Role::User)?;
                ctx.session.edit(&mut ctx.store, ts, &content, &mut renderer).await?;
                renderer.finish();
                ctx.save_cache();
            }
            SpecialCommand::NewConversation(title) => {
                let id = ctx.new_conversation(title.as_deref().unwrap_or("")).await?;
                println!("Started conversation {}", id.cyan());
            }
            SpecialCommand::ListConversations => {
                if let Err(e) = refresh_conversations(&ctx.client, &mut ctx.store, &mut ctx.credentials).await {
                    eprintln!("{} Showing cached list: {}", "!".yellow(), e);
                }
                print_conversation_table(ctx.store.conversations(), ctx.store.active_id());
            }
            SpecialCommand::Switch(selector) => {
                ctx.switch(&selector).await?;
                print_transcript(ctx.active_messages()?);
            }
            SpecialCommand::Rename(title) => {
                let id = ctx
                    .store
                    .active_id()
                    .map(str::to_string)
                    .ok_or_else(|| ChatdeckError::NotFound("no active conversation".to_string()))?;
                ctx.client.rename_conversation(&id, &title).await?;
                ctx.store.rename(&id, title.as_str())?;
                ctx.save_cache();
                println!("Renamed to {}", title.bold());
            }
            SpecialCommand::History => {
                if let Some(id) = ctx.store.active_id().map(str::to_string) {
                    ensure_loaded(&ctx.client, &mut ctx.store, &id).await?;
                }
                print_transcript(ctx.active_messages()?);
            }
            SpecialCommand::Capability(capability, value) => {
                let enabled = ctx.set_capability(capability, value)?;
                let state = if enabled { "on".green() } else { "off".red() };
                println!("{} {} ({})", capability, state, ctx.capabilities().route());
            }
            SpecialCommand::SwitchModel(model) => {
                ctx.session.set_model(model.as_str());
                println!("Using model {}", model.cyan());
            }
            SpecialCommand::ShowStatus => print_status_display(ctx),
            SpecialCommand::Help => print_help(),
            SpecialCommand::Exit => {}
        }
        Ok(())
    }

    fn print_welcome_banner(ctx: &ChatContext) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                 Chatdeck Interactive Chat                    ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        println!("Model:        {}", ctx.session.model().cyan());
        println!("Capabilities: {}", ctx.capabilities().colored_tag());
        println!("Conversations: {}\n", ctx.store.len());
        println!("Type '/help' for available commands, 'exit' to quit\n");
    }

    fn print_status_display(ctx: &ChatContext) {
        println!();
        match ctx.store.active() {
            Some(conv) => {
                println!("Conversation: {} ({})", conv.title.bold(), conv.id.cyan());
                println!("Messages:     {}", conv.messages().len());
            }
            None => println!("Conversation: {}", "none (created on first message)".dimmed()),
        }
        let caps = ctx.capabilities();
        println!("Model:        {}", ctx.session.model().cyan());
        println!("Capabilities: {}", caps.colored_tag());
        println!("Route:        {}", caps.route());
        println!(
            "User:         {}",
            ctx.credentials.username().unwrap_or("(not logged in)")
        );
        println!();
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_renderer_delta_plain_answer() {
            let mut r = TerminalRenderer::new();
            r.answer = "Hel".to_string();
            assert_eq!(r.delta("Hello"), ("", "lo", false));
        }

        #[test]
        fn test_renderer_delta_reasoning_then_answer() {
            let mut r = TerminalRenderer::new();
            assert_eq!(r.delta("<think>ab</think> "), ("ab", "", false));
            r.reasoning = "ab".to_string();
            assert_eq!(r.delta("<think>abc</think> Hi"), ("c", "Hi", false));
        }

        #[test]
        fn test_renderer_restarts_on_replacement() {
            let mut r = TerminalRenderer::new();
            r.answer = "partial".to_string();
            assert_eq!(r.delta("Sorry"), ("", "Sorry", true));
        }

        #[test]
        fn test_title_for() {
            assert_eq!(title_for("hello\nworld"), "hello");
            assert_eq!(title_for(&"x".repeat(50)).len(), 30);
        }
    }
}
