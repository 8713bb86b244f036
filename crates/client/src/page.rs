//! Chat page orchestration
//!
//! Owns the lifecycle of one ticket view:
//! 1. `load`: fetch ticket and history, capture the owner, apply the snapshot
//! 2. `run`: connect the live channel and drive the reconciler from a single
//!    `select!` loop until the ticket closes, the host leaves, or the feed ends
//!
//! Every reconciler mutation happens on the task running `run`. Sends and
//! resync fetches are spawned and report back over an internal channel so
//! they never hold up live event delivery.

use std::sync::Arc;

use supportchat_shared::{Id, Message};
use tokio::sync::mpsc;

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::history::HistoryLoader;
use crate::live::{LiveChannelClient, LiveChannelConfig, LiveEvent};
use crate::reconciler::{Reconciler, ResyncMark, ViewMutation};
use crate::session::{SessionContext, SessionTokens, Side, TokenStore};
use crate::shell::Shell;
use crate::submitter::MessageSubmitter;

/// Host-side view that draws reconciler mutations.
///
/// `side` is `None` for removals.
pub trait ViewRenderer {
    fn render(&mut self, mutation: &ViewMutation, side: Option<Side>);
}

/// Input from the host while the page runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCommand {
    Send(String),
    /// User navigated away
    Close,
}

/// Why `run` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageExit {
    TicketClosed,
    Closed,
    /// The live channel gave up or stopped on a missing token
    ChannelClosed,
}

enum Completion {
    Sent(Message),
    Resynced(ResyncMark, Vec<Message>),
}

pub struct ChatPage {
    config: ClientConfig,
    session: Arc<SessionContext>,
    tokens: SessionTokens,
    history: HistoryLoader,
    submitter: MessageSubmitter,
    reconciler: Reconciler,
}

impl ChatPage {
    pub fn new(
        config: ClientConfig,
        channel_id: Id,
        store: Arc<dyn TokenStore>,
        shell: Shell,
    ) -> ClientResult<Self> {
        let api = ApiClient::new(&config)?;
        let session = SessionContext::new(channel_id);
        let tokens = SessionTokens::new(store, shell.clone());

        Ok(Self {
            history: HistoryLoader::new(api.clone(), tokens.clone(), shell.clone()),
            submitter: MessageSubmitter::new(api, tokens.clone(), session.clone(), shell.clone()),
            reconciler: Reconciler::new(session.clone(), shell),
            config,
            session,
            tokens,
        })
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Fetch the ticket and its history and render the snapshot.
    ///
    /// Any failure has already been surfaced to the user; the caller should
    /// not go on to `run`.
    pub async fn load<R: ViewRenderer>(&mut self, renderer: &mut R) -> ClientResult<()> {
        let channel_id = self.session.channel_id().clone();

        let ticket = self.history.fetch_ticket(&channel_id).await?;
        self.session.capture_owner(&ticket);
        if !ticket.status.is_open() {
            tracing::info!(ticket_id = %channel_id, status = ?ticket.status, "Viewing a ticket that is not active");
        }

        let messages = self.history.fetch_messages(&channel_id).await?;
        let mutations = self.reconciler.apply_history(messages);
        self.render(renderer, &mutations);
        Ok(())
    }

    /// Drive the page until it exits; the view is torn down on return
    pub async fn run<R: ViewRenderer>(
        mut self,
        renderer: &mut R,
        mut commands: mpsc::Receiver<PageCommand>,
    ) -> PageExit {
        let (client, mut events) = LiveChannelClient::connect(
            LiveChannelConfig::from_client_config(&self.config),
            self.tokens.clone(),
        );
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let mut authorizations: u64 = 0;

        let exit = loop {
            tokio::select! {
                biased;

                event = events.recv() => {
                    let Some(event) = event else {
                        break PageExit::ChannelClosed;
                    };
                    if matches!(event, LiveEvent::Authorized) {
                        authorizations += 1;
                        if authorizations > 1 && self.config.resync_on_reconnect {
                            self.spawn_resync(&done_tx);
                        }
                    }

                    let mutations = self.reconciler.apply_event(event);
                    self.render(renderer, &mutations);
                    if self.reconciler.is_torn_down() {
                        break PageExit::TicketClosed;
                    }
                }

                Some(done) = done_rx.recv() => {
                    let mutations = match done {
                        Completion::Sent(message) => self.reconciler.accept_sent(message),
                        Completion::Resynced(mark, messages) => self.reconciler.resync(&mark, messages),
                    };
                    self.render(renderer, &mutations);
                }

                command = commands.recv() => match command {
                    Some(PageCommand::Send(content)) => self.spawn_send(content, &done_tx),
                    Some(PageCommand::Close) | None => break PageExit::Closed,
                },
            }
        };

        client.shutdown().await;
        self.reconciler.teardown();
        tracing::info!(ticket_id = %self.session.channel_id(), exit = ?exit, "Chat page closed");
        exit
    }

    fn spawn_send(&self, content: String, done: &mpsc::UnboundedSender<Completion>) {
        let submitter = self.submitter.clone();
        let done = done.clone();
        tokio::spawn(async move {
            // Failures are reported by the submitter
            if let Ok(message) = submitter.send_message(&content).await {
                let _ = done.send(Completion::Sent(message));
            }
        });
    }

    fn spawn_resync(&self, done: &mpsc::UnboundedSender<Completion>) {
        let history = self.history.clone();
        let channel_id = self.session.channel_id().clone();
        let done = done.clone();
        let mark = self.reconciler.begin_resync();
        tracing::debug!(ticket_id = %channel_id, "Re-fetching history after reconnect");
        tokio::spawn(async move {
            if let Ok(messages) = history.fetch_messages(&channel_id).await {
                let _ = done.send(Completion::Resynced(mark, messages));
            }
        });
    }

    fn render<R: ViewRenderer>(&self, renderer: &mut R, mutations: &[ViewMutation]) {
        for mutation in mutations {
            let side = match mutation {
                ViewMutation::Append(message) => Some(self.session.side_of(message)),
                ViewMutation::Update { id, .. } => self
                    .reconciler
                    .view()
                    .get(id)
                    .map(|message| self.session.side_of(message)),
                ViewMutation::Remove { .. } => None,
            };
            renderer.render(mutation, side);
        }
    }
}
