//! Message view reconciler
//!
//! Merges the history snapshot and the live event feed into one [`ViewModel`].
//! Inputs are applied strictly in arrival order on a single task; correctness
//! rests on the live channel delivering events in backend order and only
//! within an authorized epoch. There are no sequence numbers.
//!
//! Live events that arrive before the history snapshot has been applied are
//! buffered and replayed right after it. Once the ticket is closed the view
//! is torn down and every further input is ignored.

pub mod view;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use supportchat_shared::{Id, Message, MessageEdit};

use crate::live::{ConnectionState, LiveEvent};
use crate::session::{SessionContext, Side};
use crate::shell::{Route, Shell};

pub use view::{ViewModel, ViewMutation};

pub const TICKET_CLOSED_NOTICE: &str = "Ticket closed by the support agent";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for the history snapshot; live events are buffered
    Loading,
    Live,
    TornDown,
}

/// View state captured when a resync fetch is started
#[derive(Debug, Clone)]
pub struct ResyncMark {
    generation: u64,
    present: HashSet<Id>,
}

pub struct Reconciler {
    session: Arc<SessionContext>,
    shell: Shell,
    view: ViewModel,
    phase: Phase,
    pending: VecDeque<LiveEvent>,
    connection: ConnectionState,
    /// Bumped on every live change to the view
    generation: u64,
    /// Generation of the latest live change per id
    live_changes: HashMap<Id, u64>,
}

impl Reconciler {
    pub fn new(session: Arc<SessionContext>, shell: Shell) -> Self {
        Self {
            session,
            shell,
            view: ViewModel::new(),
            phase: Phase::Loading,
            pending: VecDeque::new(),
            connection: ConnectionState::Disconnected,
            generation: 0,
            live_changes: HashMap::new(),
        }
    }

    pub fn view(&self) -> &ViewModel {
        &self.view
    }

    pub fn history_loaded(&self) -> bool {
        self.phase == Phase::Live
    }

    pub fn is_torn_down(&self) -> bool {
        self.phase == Phase::TornDown
    }

    /// Last connection state seen on the feed
    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn side_of(&self, message: &Message) -> Side {
        self.session.side_of(message)
    }

    /// Bulk insert the history snapshot in server order, then replay any
    /// buffered live events.
    ///
    /// A duplicate id overwrites the earlier entry in place, so a re-fetch
    /// never duplicates messages.
    pub fn apply_history(&mut self, messages: Vec<Message>) -> Vec<ViewMutation> {
        if self.is_torn_down() {
            return Vec::new();
        }

        let count = messages.len();
        let mut mutations: Vec<ViewMutation> = messages
            .into_iter()
            .filter_map(|message| self.view.upsert(message))
            .collect();

        self.phase = Phase::Live;
        let buffered = std::mem::take(&mut self.pending);
        tracing::debug!(
            ticket_id = %self.session.channel_id(),
            history = count,
            buffered = buffered.len(),
            "History applied"
        );

        for event in buffered {
            mutations.extend(self.apply_event(event));
            if self.is_torn_down() {
                break;
            }
        }
        mutations
    }

    /// Apply one live event
    pub fn apply_event(&mut self, event: LiveEvent) -> Vec<ViewMutation> {
        if self.is_torn_down() {
            tracing::debug!(event = ?event, "View torn down, ignoring event");
            return Vec::new();
        }

        match event {
            LiveEvent::Connected => {
                self.connection = ConnectionState::Connected;
                Vec::new()
            }
            LiveEvent::Authorized => {
                self.connection = ConnectionState::Authorized;
                Vec::new()
            }
            LiveEvent::Disconnected => {
                self.connection = ConnectionState::Disconnected;
                Vec::new()
            }
            LiveEvent::ServerError { message } => {
                self.shell.toast_error(message);
                Vec::new()
            }
            event if event.requires_authorization() && self.phase == Phase::Loading => {
                tracing::debug!(event = ?event, "History not loaded yet, buffering event");
                self.pending.push_back(event);
                Vec::new()
            }
            LiveEvent::Created(message) => self.created(message).into_iter().collect(),
            LiveEvent::Edited(edit) => self.edited(edit).into_iter().collect(),
            LiveEvent::Deleted { id } => {
                self.touch(&id);
                self.view.remove(&id).into_iter().collect()
            }
            LiveEvent::TicketClosed { id } => {
                self.ticket_closed(&id);
                Vec::new()
            }
        }
    }

    /// Feed the server's response to our own send through the created path
    pub fn accept_sent(&mut self, message: Message) -> Vec<ViewMutation> {
        self.apply_event(LiveEvent::Created(message))
    }

    /// Capture the view before fetching a resync snapshot
    pub fn begin_resync(&self) -> ResyncMark {
        ResyncMark {
            generation: self.generation,
            present: self.view.ids().into_iter().collect(),
        }
    }

    /// Reconcile against a snapshot fetched after a reconnect.
    ///
    /// Only ids present when `mark` was taken can be removed for missing from
    /// the snapshot. Changed content is updated in place and unseen messages
    /// are appended in snapshot order. Ids touched by a live event since the
    /// mark keep their live state.
    pub fn resync(&mut self, mark: &ResyncMark, messages: Vec<Message>) -> Vec<ViewMutation> {
        match self.phase {
            Phase::TornDown => return Vec::new(),
            Phase::Loading => return self.apply_history(messages),
            Phase::Live => {}
        }

        let live_changes = &self.live_changes;
        let changed_since_mark =
            |id: &Id| live_changes.get(id).is_some_and(|g| *g > mark.generation);

        let snapshot: HashSet<Id> = messages.iter().map(|m| m.id.clone()).collect();
        let view = &mut self.view;
        let mut mutations: Vec<ViewMutation> = view
            .ids()
            .into_iter()
            .filter(|id| mark.present.contains(id) && !snapshot.contains(id))
            .filter(|id| !changed_since_mark(id))
            .filter_map(|id| view.remove(&id))
            .collect();
        mutations.extend(
            messages
                .into_iter()
                .filter(|message| !changed_since_mark(&message.id))
                .filter_map(|message| view.upsert(message)),
        );

        tracing::info!(
            ticket_id = %self.session.channel_id(),
            changes = mutations.len(),
            "View resynchronized"
        );
        mutations
    }

    /// Drop the view and everything buffered; used on navigation
    pub fn teardown(&mut self) {
        self.phase = Phase::TornDown;
        self.pending.clear();
        self.view.clear();
        self.live_changes.clear();
    }

    fn touch(&mut self, id: &Id) {
        self.generation += 1;
        self.live_changes.insert(id.clone(), self.generation);
    }

    fn created(&mut self, message: Message) -> Option<ViewMutation> {
        if let Some(ticket_id) = &message.ticket_id {
            if ticket_id != self.session.channel_id() {
                tracing::debug!(
                    message_id = %message.id,
                    ticket_id = %ticket_id,
                    "Ignoring message for another ticket"
                );
                return None;
            }
        }
        let id = message.id.clone();
        let mutation = self.view.insert_new(message);
        if mutation.is_some() {
            self.touch(&id);
        }
        mutation
    }

    fn edited(&mut self, edit: MessageEdit) -> Option<ViewMutation> {
        if !self.view.contains(&edit.id) {
            tracing::warn!(message_id = %edit.id, "Edit for unknown message dropped");
            return None;
        }
        self.touch(&edit.id);
        self.view.edit(&edit.id, &edit.content)
    }

    fn ticket_closed(&mut self, id: &Id) {
        if id != self.session.channel_id() {
            tracing::debug!(ticket_id = %id, "Another ticket was closed");
            return;
        }

        tracing::info!(ticket_id = %id, "Ticket closed, leaving view");
        self.shell.toast(TICKET_CLOSED_NOTICE);
        self.shell.navigate(Route::Support);
        self.teardown();
    }
}
