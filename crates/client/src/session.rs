//! Session state: the stored bearer token and the per-page context

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use supportchat_shared::{Id, Message, Ticket};

use crate::error::ClientResult;
use crate::shell::{Route, Shell};

/// Storage key holding the bearer token
pub const TOKEN_KEY: &str = "token";

/// Persistent key/value storage for the bearer token
pub trait TokenStore: Send + Sync {
    fn load(&self) -> ClientResult<Option<String>>;
    fn store(&self, token: &str) -> ClientResult<()>;
    fn clear(&self) -> ClientResult<()>;
}

/// Token store backed by a JSON object on disk, keyed like browser storage
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> ClientResult<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> ClientResult<Option<String>> {
        Ok(self.read_entries()?.remove(TOKEN_KEY))
    }

    fn store(&self, token: &str) -> ClientResult<()> {
        let mut entries = self.read_entries()?;
        entries.insert(TOKEN_KEY.to_string(), token.to_string());
        self.write_entries(&entries)
    }

    fn clear(&self) -> ClientResult<()> {
        let mut entries = self.read_entries()?;
        if entries.remove(TOKEN_KEY).is_some() {
            self.write_entries(&entries)?;
        }
        Ok(())
    }
}

/// In-process token store
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> ClientResult<Option<String>> {
        Ok(self
            .token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    fn store(&self, token: &str) -> ClientResult<()> {
        *self
            .token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> ClientResult<()> {
        *self
            .token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }
}

/// Session token provider used by every network call
#[derive(Clone)]
pub struct SessionTokens {
    store: Arc<dyn TokenStore>,
    shell: Shell,
}

impl SessionTokens {
    pub fn new(store: Arc<dyn TokenStore>, shell: Shell) -> Self {
        Self { store, shell }
    }

    /// Return the stored bearer token.
    ///
    /// When no token is stored this navigates to the login view and returns
    /// `None`; the caller must not issue any request.
    pub fn get_token(&self) -> Option<String> {
        let token = match self.store.load() {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored token");
                None
            }
        };

        if token.is_none() {
            tracing::info!("No session token stored, redirecting to login");
            self.shell.navigate(Route::Auth);
        }
        token
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn shell(&self) -> &Shell {
        &self.shell
    }
}

/// Which side of the conversation a message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Authored by the ticket owner
    Mine,
    Theirs,
}

/// Explicit per-page context: which ticket is open and who owns it.
///
/// Created at page load and dropped on navigation. The owner is captured once
/// from the fetched ticket and never revised afterwards.
#[derive(Debug)]
pub struct SessionContext {
    channel_id: Id,
    owner_id: OnceLock<Id>,
}

impl SessionContext {
    pub fn new(channel_id: Id) -> Arc<Self> {
        Arc::new(Self {
            channel_id,
            owner_id: OnceLock::new(),
        })
    }

    pub fn channel_id(&self) -> &Id {
        &self.channel_id
    }

    /// Record the ticket owner; later calls keep the first value
    pub fn capture_owner(&self, ticket: &Ticket) {
        if self.owner_id.set(ticket.user_id.clone()).is_err() {
            tracing::debug!(
                ticket_id = %ticket.id,
                "Ticket owner already captured, keeping first value"
            );
        }
    }

    pub fn owner_id(&self) -> Option<&Id> {
        self.owner_id.get()
    }

    pub fn side_of(&self, message: &Message) -> Side {
        match self.owner_id.get() {
            Some(owner) if *owner == message.author_id => Side::Mine,
            _ => Side::Theirs,
        }
    }
}
