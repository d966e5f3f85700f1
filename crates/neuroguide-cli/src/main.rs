//! neuroguide - streaming chat client for the neuroguide service

mod commands;
mod config;
mod interrupt;

use anyhow::Context;
use clap::Parser;
use neuroguide_chat::{
    ChatOrchestrator, ConversationEvent, ConversationState, Progress, Reconciliation,
};
use neuroguide_protocol::{ConversationType, HistoryClient, HttpBackend, Message, backend};
use std::io::{self, Write};
use std::sync::Arc;
use interrupt::Interrupts;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

/// neuroguide - talk to the neuroguide assistants from the terminal
#[derive(Parser, Debug)]
#[command(name = "neuroguide")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Conversation type (analysis, mapping, assistant)
    #[arg(short = 't', long = "type")]
    conversation_type: Option<ConversationType>,

    /// Resume a conversation by ID
    #[arg(short, long)]
    conversation: Option<String>,

    /// Send a single message and exit
    #[arg(short, long)]
    message: Option<String>,

    /// List saved conversations
    #[arg(long)]
    list: bool,

    /// Print a saved conversation
    #[arg(long)]
    show: Option<String>,

    /// Delete a saved conversation
    #[arg(long)]
    delete: Option<String>,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Base URL of the chat service API
    #[arg(long)]
    base_url: Option<String>,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("neuroguide=debug,neuroguide_protocol=debug,neuroguide_chat=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Everything an interactive or one-shot run needs
struct App {
    chat: ChatOrchestrator,
    history: HistoryClient,
    events: broadcast::Receiver<ConversationEvent>,
    interrupts: Interrupts,
    verbose: bool,
}

/// Tracks how much of the cumulative reply has reached stdout
#[derive(Debug, Default)]
struct DeltaPrinter {
    printed: usize,
}

impl DeltaPrinter {
    /// The unprinted tail of `content`, if any
    fn delta<'a>(&mut self, content: &'a str) -> Option<&'a str> {
        if content.len() <= self.printed || !content.is_char_boundary(self.printed) {
            return None;
        }
        let delta = &content[self.printed..];
        self.printed = content.len();
        Some(delta)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(args.verbose);

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // Merge config with CLI args (CLI takes precedence)
    let cfg = config::Config::load();
    let base_url = cfg.base_url(args.base_url);
    let conversation_type = cfg.conversation_type(args.conversation_type)?;

    let client = backend::build_client(cfg.connect_timeout(), cfg.read_timeout())?;
    let history = HistoryClient::with_client(client.clone(), base_url.clone());
    tracing::debug!("Using chat service at {}", base_url);

    if args.list {
        return list_conversations(&history, args.conversation_type).await;
    }

    if let Some(id) = args.show {
        return show_conversation(&history, &id).await;
    }

    if let Some(id) = args.delete {
        history
            .delete(&id)
            .await
            .with_context(|| format!("failed to delete conversation {}", id))?;
        println!("Deleted conversation {}", id);
        return Ok(());
    }

    let chat = ChatOrchestrator::new(Arc::new(HttpBackend::with_client(client, base_url)));
    let events = chat.subscribe();
    let interrupts = Interrupts::new();
    interrupts.listen();
    let mut app = App {
        chat,
        history,
        events,
        interrupts,
        verbose: args.verbose,
    };

    let mut state = match args.conversation {
        Some(ref id) => {
            let conversation = app
                .history
                .get(id)
                .await
                .with_context(|| format!("failed to load conversation {}", id))?;
            if args
                .conversation_type
                .is_some_and(|ty| ty != conversation.conversation_type)
            {
                tracing::warn!(
                    "Conversation {} is of type {}; ignoring --type",
                    id,
                    conversation.conversation_type
                );
            }
            ConversationState::from_conversation(conversation)
        }
        None => ConversationState::new(conversation_type),
    };

    // Non-interactive mode
    if let Some(message) = args.message {
        let outcome = run_exchange(&mut app, &mut state, &message).await;
        return match outcome {
            Ok(_) => Ok(()),
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(e.into()),
        };
    }

    run_interactive(&mut app, state).await
}

/// Stream one reply to stdout. Ctrl-C cancels the exchange.
async fn run_exchange(
    app: &mut App,
    state: &mut ConversationState,
    text: &str,
) -> neuroguide_chat::Result<Reconciliation> {
    let cancel = app.interrupts.begin();

    let mut printer = DeltaPrinter::default();
    let print_delta = |progress: &Progress| {
        if let Some(delta) = printer.delta(&progress.content) {
            print!("{}", delta);
            io::stdout().flush().ok();
        }
    };

    let outcome = app
        .chat
        .submit_with(state, text, Some(print_delta), cancel)
        .await;
    app.interrupts.end();

    match &outcome {
        Ok(_) => println!(),
        Err(e) if e.is_cancelled() => println!("\n[stopped]"),
        Err(e) => {
            if let Some(reply) = state.messages.last() {
                println!("\n{}", reply.content);
            }
            eprintln!("Error: {}", e);
        }
    }

    handle_events(app).await;
    outcome
}

/// React to conversation events emitted by the last exchange
async fn handle_events(app: &mut App) {
    while let Ok(event) = app.events.try_recv() {
        match event {
            ConversationEvent::IdentityAssigned {
                conversation_id, ..
            } => {
                tracing::info!("New conversation {}", conversation_id);
            }
            ConversationEvent::HistoryInvalidated {
                conversation_type, ..
            } => {
                if !app.verbose {
                    continue;
                }
                match app.history.list(Some(conversation_type)).await {
                    Ok(conversations) => tracing::debug!(
                        "{} saved {} conversation(s)",
                        conversations.len(),
                        conversation_type
                    ),
                    Err(e) => tracing::warn!("Failed to refresh history: {}", e),
                }
            }
        }
    }
}

async fn run_interactive(app: &mut App, mut state: ConversationState) -> anyhow::Result<()> {
    // Show minimal startup info (only if TTY)
    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        print_banner(&state);
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(result) = commands::execute_command(input) {
            match result {
                commands::CommandResult::New(ty) => {
                    state = ConversationState::new(ty.unwrap_or(state.conversation_type));
                    print_banner(&state);
                }
                commands::CommandResult::History => {
                    if let Err(e) =
                        list_conversations(&app.history, Some(state.conversation_type)).await
                    {
                        eprintln!("Error: {:#}", e);
                    }
                }
                commands::CommandResult::Message(msg) => {
                    println!("{}", msg);
                }
                commands::CommandResult::Exit => {
                    break;
                }
                commands::CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                }
            }
            println!();
            continue;
        }

        println!();
        // Failures are reported inline and leave the fallback reply in place
        let _ = run_exchange(app, &mut state, input).await;
        println!();
    }

    Ok(())
}

fn print_banner(state: &ConversationState) {
    match &state.id {
        Some(id) => eprintln!(
            "neuroguide ({}) conversation: {} - {}",
            state.conversation_type, id, state.title
        ),
        None => eprintln!("neuroguide ({}) new conversation", state.conversation_type),
    }
    eprintln!("{}", state.conversation_type.input_hint());
    eprintln!();
}

async fn list_conversations(
    history: &HistoryClient,
    conversation_type: Option<ConversationType>,
) -> anyhow::Result<()> {
    let conversations = history
        .list(conversation_type)
        .await
        .context("failed to list conversations")?;

    if conversations.is_empty() {
        println!("No saved conversations.");
        return Ok(());
    }

    println!("Saved conversations:");
    for conversation in conversations {
        println!(
            "  {}  {:<9}  {}  {} ({} messages)",
            conversation.id.as_deref().unwrap_or("-"),
            conversation.conversation_type,
            conversation.updated_at.format("%Y-%m-%d %H:%M"),
            conversation.title,
            conversation.messages.len()
        );
    }
    Ok(())
}

async fn show_conversation(history: &HistoryClient, id: &str) -> anyhow::Result<()> {
    let conversation = history
        .get(id)
        .await
        .with_context(|| format!("failed to load conversation {}", id))?;

    println!(
        "{} [{}] updated {}",
        conversation.title,
        conversation.conversation_type,
        conversation.updated_at.format("%Y-%m-%d %H:%M")
    );
    println!();
    for message in &conversation.messages {
        println!("{}", format_message(message));
    }
    Ok(())
}

fn format_message(message: &Message) -> String {
    let role = if message.is_user { "you" } else { "assistant" };
    format!(
        "[{} {}] {}",
        message.created_at.format("%H:%M"),
        role,
        message.content
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from([
            "neuroguide",
            "--type",
            "mapping",
            "-c",
            "c1",
            "-m",
            "hello",
            "-v",
        ]);
        assert_eq!(args.conversation_type, Some(ConversationType::Mapping));
        assert_eq!(args.conversation.as_deref(), Some("c1"));
        assert_eq!(args.message.as_deref(), Some("hello"));
        assert!(args.verbose);
        assert!(!args.list);
    }

    #[test]
    fn test_args_reject_unknown_type() {
        assert!(Args::try_parse_from(["neuroguide", "--type", "therapy"]).is_err());
    }

    #[test]
    fn test_delta_printer_prints_only_new_text() {
        let mut printer = DeltaPrinter::default();
        assert_eq!(printer.delta("焦"), Some("焦"));
        assert_eq!(printer.delta("焦虑"), Some("虑"));
        assert_eq!(printer.delta("焦虑"), None);
        assert_eq!(printer.delta("焦虑是一种"), Some("是一种"));
    }

    #[test]
    fn test_delta_printer_ignores_shorter_or_misaligned_content() {
        let mut printer = DeltaPrinter::default();
        assert_eq!(printer.delta("ab"), Some("ab"));
        assert_eq!(printer.delta("a"), None);
        // Byte 2 falls inside the first character here
        assert_eq!(printer.delta("焦虑"), None);
        assert_eq!(printer.delta("abc"), Some("c"));
    }

    #[test]
    fn test_format_message() {
        let message = Message::user("m1", "我最近总是感到焦虑");
        let line = format_message(&message);
        assert!(line.contains("you"));
        assert!(line.ends_with("我最近总是感到焦虑"));
    }
}
