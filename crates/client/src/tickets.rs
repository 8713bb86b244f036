//! Ticket directory: create and list the user's tickets, and keep the
//! support view's list current as agents close tickets

use std::sync::Arc;

use indexmap::IndexMap;
use supportchat_shared::{CreateTicketRequest, Id, Ticket, TicketListResponse};
use tokio::sync::oneshot;

use crate::api::{ApiClient, TICKETS_PATH};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::live::{LiveChannelClient, LiveChannelConfig, LiveEvent};
use crate::page::PageExit;
use crate::session::{SessionTokens, TokenStore};
use crate::shell::{Route, Shell};

pub const MISSING_FIELDS: &str = "Please fill in all fields";
pub const TICKET_CREATED: &str = "Ticket created successfully!";

#[derive(Clone)]
pub struct TicketDirectory {
    api: ApiClient,
    tokens: SessionTokens,
    shell: Shell,
}

impl TicketDirectory {
    pub fn new(api: ApiClient, tokens: SessionTokens, shell: Shell) -> Self {
        Self { api, tokens, shell }
    }

    /// Open a new ticket and navigate to its chat view
    pub async fn create_ticket(&self, topic: &str, description: &str) -> ClientResult<Ticket> {
        match self.create(topic, description).await {
            Ok(ticket) => {
                self.shell.toast(TICKET_CREATED);
                self.shell.navigate(Route::Ticket(ticket.id.clone()));
                Ok(ticket)
            }
            Err(e) => {
                self.shell.report(&e);
                Err(e)
            }
        }
    }

    async fn create(&self, topic: &str, description: &str) -> ClientResult<Ticket> {
        if topic.is_empty() || description.is_empty() {
            return Err(ClientError::Validation(MISSING_FIELDS.to_string()));
        }
        let token = self.tokens.get_token().ok_or(ClientError::MissingToken)?;

        let request = CreateTicketRequest {
            topic: topic.to_string(),
            description: description.to_string(),
        };
        let ticket: Ticket = self
            .api
            .post(TICKETS_PATH, Some(&token), &request, "Failed to create ticket")
            .await?;

        tracing::info!(ticket_id = %ticket.id, "Ticket created");
        Ok(ticket)
    }

    pub async fn list_tickets(&self) -> ClientResult<Vec<Ticket>> {
        let token = self.tokens.get_token().ok_or(ClientError::MissingToken)?;
        let result = self
            .api
            .get::<TicketListResponse>(TICKETS_PATH, Some(&token), "Failed to fetch tickets")
            .await;

        match result {
            Ok(list) => {
                let tickets = list.into_tickets();
                tracing::debug!(count = tickets.len(), "Tickets loaded");
                Ok(tickets)
            }
            Err(e) => {
                self.shell.report(&e);
                Err(e)
            }
        }
    }
}

/// Tickets shown on the support view, in server order
#[derive(Debug, Default)]
pub struct TicketList {
    tickets: IndexMap<Id, Ticket>,
}

impl TicketList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace_all(&mut self, tickets: Vec<Ticket>) {
        self.tickets = tickets
            .into_iter()
            .map(|ticket| (ticket.id.clone(), ticket))
            .collect();
    }

    pub fn add(&mut self, ticket: Ticket) {
        self.tickets.insert(ticket.id.clone(), ticket);
    }

    /// Drop a ticket closed by an agent, returning it if it was listed
    pub fn apply_closed(&mut self, id: &Id) -> Option<Ticket> {
        self.tickets.shift_remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ticket> {
        self.tickets.values()
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

/// Support view: the user's tickets, with closed ones removed live
pub struct TicketBoard {
    config: ClientConfig,
    directory: TicketDirectory,
    tokens: SessionTokens,
    list: TicketList,
}

impl TicketBoard {
    pub fn new(config: ClientConfig, store: Arc<dyn TokenStore>, shell: Shell) -> ClientResult<Self> {
        let api = ApiClient::new(&config)?;
        let tokens = SessionTokens::new(store, shell.clone());
        Ok(Self {
            directory: TicketDirectory::new(api, tokens.clone(), shell),
            config,
            tokens,
            list: TicketList::new(),
        })
    }

    pub fn list(&self) -> &TicketList {
        &self.list
    }

    pub async fn load(&mut self) -> ClientResult<()> {
        let tickets = self.directory.list_tickets().await?;
        self.list.replace_all(tickets);
        Ok(())
    }

    /// Follow the live channel until `stop` fires or the feed ends.
    ///
    /// `on_closed` is called with each listed ticket an agent closes, after
    /// it has been removed from the list.
    pub async fn watch<F>(&mut self, mut on_closed: F, mut stop: oneshot::Receiver<()>) -> PageExit
    where
        F: FnMut(&Ticket),
    {
        let (client, mut events) = LiveChannelClient::connect(
            LiveChannelConfig::from_client_config(&self.config),
            self.tokens.clone(),
        );

        let exit = loop {
            tokio::select! {
                event = events.recv() => match event {
                    None => break PageExit::ChannelClosed,
                    Some(LiveEvent::TicketClosed { id }) => match self.list.apply_closed(&id) {
                        Some(ticket) => {
                            tracing::info!(ticket_id = %id, "Ticket closed, removed from list");
                            on_closed(&ticket);
                        }
                        None => tracing::debug!(ticket_id = %id, "Closed ticket not listed"),
                    },
                    Some(LiveEvent::ServerError { message }) => self.tokens.shell().toast_error(message),
                    Some(_) => {}
                },
                _ = &mut stop => break PageExit::Closed,
            }
        };

        client.shutdown().await;
        exit
    }
}
