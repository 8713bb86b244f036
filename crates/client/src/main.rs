//! # supportchat
//!
//! Terminal host for the ticket chat client. Toasts go to stderr, the
//! conversation to stdout, and each line typed on stdin is sent as a message.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use supportchat_client::api::ApiClient;
use supportchat_client::auth::SignupClient;
use supportchat_client::telemetry::init_tracing;
use supportchat_client::tickets::{TicketBoard, TicketDirectory};
use supportchat_client::{
    ChatPage, ClientConfig, FileTokenStore, PageCommand, PageExit, SessionTokens, Shell, Side,
    TerminalShell, TokenStore, ViewMutation, ViewRenderer,
};
use supportchat_shared::{Id, SignupRequest, Ticket};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};

#[derive(Parser, Debug)]
#[command(name = "supportchat", about = "Support ticket chat client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account and store its session token
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        id: String,
    },
    /// List your tickets
    Tickets {
        /// Keep following the live channel and report tickets as agents close them
        #[arg(long)]
        watch: bool,
    },
    /// Open a new ticket
    New {
        #[arg(long)]
        topic: String,
        #[arg(long)]
        description: String,
    },
    /// Chat on a ticket, given its id or a `/tickets/{id}` path
    Chat { ticket: String },
}

/// Writes the conversation to stdout
struct StdoutRenderer;

impl ViewRenderer for StdoutRenderer {
    fn render(&mut self, mutation: &ViewMutation, side: Option<Side>) {
        let who = match side {
            Some(Side::Mine) => "you",
            Some(Side::Theirs) => "agent",
            None => "",
        };
        match mutation {
            ViewMutation::Append(message) => println!("[{}] #{}: {}", who, message.id, message.content),
            ViewMutation::Update { id, content } => println!("[{} edited] #{}: {}", who, id, content),
            ViewMutation::Remove { id } => println!("[deleted] #{}", id),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = ClientConfig::from_env().context("Invalid client configuration")?;
    init_tracing(config.log_format);

    let terminal = TerminalShell::new();
    let shell = terminal.shell();
    let store: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(&config.token_path));

    let ok = match cli.command {
        Command::Signup { email, username, id } => {
            let api = ApiClient::new(&config)?;
            let tokens = SessionTokens::new(store, shell.clone());
            let request = SignupRequest { email, username, id };
            SignupClient::new(api, tokens, shell).signup(&request).await.is_ok()
        }
        Command::Tickets { watch } => tickets(config, store, shell, watch).await?,
        Command::New { topic, description } => {
            let directory = directory(&config, store, shell)?;
            directory.create_ticket(&topic, &description).await.is_ok()
        }
        Command::Chat { ticket } => {
            let channel_id = Id::from_path(&ticket).context("Invalid ticket")?;
            chat(config, channel_id, store, shell).await?
        }
    };

    tracing::debug!(route = ?terminal.last_route(), "Exiting");
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

async fn tickets(
    config: ClientConfig,
    store: Arc<dyn TokenStore>,
    shell: Shell,
    watch: bool,
) -> Result<bool> {
    let mut board = TicketBoard::new(config, store, shell)?;
    if board.load().await.is_err() {
        return Ok(false);
    }
    for ticket in board.list().iter() {
        print_ticket(ticket);
    }
    if !watch {
        return Ok(true);
    }

    let (stop_tx, stop_rx) = oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stop_tx.send(());
        }
    });
    let exit = board
        .watch(|ticket| println!("[closed] #{}", ticket.id), stop_rx)
        .await;
    Ok(exit != PageExit::ChannelClosed)
}

fn print_ticket(ticket: &Ticket) {
    println!(
        "#{} [{:?}] {}",
        ticket.id,
        ticket.status,
        ticket.topic.as_deref().unwrap_or("(no topic)")
    );
}

fn directory(config: &ClientConfig, store: Arc<dyn TokenStore>, shell: Shell) -> Result<TicketDirectory> {
    let api = ApiClient::new(config)?;
    let tokens = SessionTokens::new(store, shell.clone());
    Ok(TicketDirectory::new(api, tokens, shell))
}

async fn chat(
    config: ClientConfig,
    channel_id: Id,
    store: Arc<dyn TokenStore>,
    shell: Shell,
) -> Result<bool> {
    let mut page = ChatPage::new(config, channel_id, store, shell)?;
    let mut renderer = StdoutRenderer;
    if page.load(&mut renderer).await.is_err() {
        return Ok(false);
    }

    let (commands_tx, commands) = mpsc::channel(32);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let command = match lines.next_line().await {
                Ok(Some(line)) if line.trim() == "/quit" => PageCommand::Close,
                Ok(Some(line)) => PageCommand::Send(line),
                Ok(None) => PageCommand::Close,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read stdin");
                    PageCommand::Close
                }
            };
            let closing = command == PageCommand::Close;
            if commands_tx.send(command).await.is_err() || closing {
                break;
            }
        }
    });

    let exit = page.run(&mut renderer, commands).await;
    Ok(exit != PageExit::ChannelClosed)
}
