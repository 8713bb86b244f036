//! Ordered, de-duplicated message view

use indexmap::IndexMap;
use supportchat_shared::{Id, Message};

/// The minimal change a renderer must apply to stay consistent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewMutation {
    Append(Message),
    Update { id: Id, content: String },
    Remove { id: Id },
}

impl ViewMutation {
    pub fn id(&self) -> &Id {
        match self {
            ViewMutation::Append(message) => &message.id,
            ViewMutation::Update { id, .. } => id,
            ViewMutation::Remove { id } => id,
        }
    }
}

/// Messages in arrival order, at most one entry per id
#[derive(Debug, Default)]
pub struct ViewModel {
    entries: IndexMap<Id, Message>,
}

impl ViewModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new message at the end, or refresh an existing one in place.
    ///
    /// Returns `None` when the message is already present with the same content.
    pub fn upsert(&mut self, message: Message) -> Option<ViewMutation> {
        match self.entries.get_mut(&message.id) {
            Some(existing) if existing.content == message.content => None,
            Some(existing) => {
                existing.content = message.content;
                Some(ViewMutation::Update {
                    id: existing.id.clone(),
                    content: existing.content.clone(),
                })
            }
            None => {
                self.entries.insert(message.id.clone(), message.clone());
                Some(ViewMutation::Append(message))
            }
        }
    }

    /// Append a message not seen before; a known id is left untouched
    pub fn insert_new(&mut self, message: Message) -> Option<ViewMutation> {
        if self.entries.contains_key(&message.id) {
            return None;
        }
        self.entries.insert(message.id.clone(), message.clone());
        Some(ViewMutation::Append(message))
    }

    /// Replace the content of a known message; unknown ids are ignored
    pub fn edit(&mut self, id: &Id, content: &str) -> Option<ViewMutation> {
        let existing = self.entries.get_mut(id)?;
        if existing.content == content {
            return None;
        }
        existing.content = content.to_string();
        Some(ViewMutation::Update {
            id: id.clone(),
            content: existing.content.clone(),
        })
    }

    /// Remove a message, keeping the order of the rest
    pub fn remove(&mut self, id: &Id) -> Option<ViewMutation> {
        self.entries
            .shift_remove(id)
            .map(|message| ViewMutation::Remove { id: message.id })
    }

    pub fn get(&self, id: &Id) -> Option<&Message> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.entries.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.values()
    }

    pub fn ids(&self) -> Vec<Id> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: u64, content: &str) -> Message {
        Message::new(Id::from(id), Id::from(7), content)
    }

    #[test]
    fn test_upsert_appends_then_dedups() {
        let mut view = ViewModel::new();
        assert_eq!(view.upsert(message(1, "hi")), Some(ViewMutation::Append(message(1, "hi"))));
        assert_eq!(view.upsert(message(1, "hi")), None);
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn test_upsert_refreshes_in_place() {
        let mut view = ViewModel::new();
        view.upsert(message(1, "a"));
        view.upsert(message(2, "b"));

        assert_eq!(
            view.upsert(message(1, "a2")),
            Some(ViewMutation::Update {
                id: Id::from(1),
                content: "a2".to_string()
            })
        );
        assert_eq!(view.ids(), vec![Id::from(1), Id::from(2)]);
    }

    #[test]
    fn test_insert_new_keeps_existing_entry() {
        let mut view = ViewModel::new();
        view.upsert(message(1, "edited"));

        assert_eq!(view.insert_new(message(1, "stale")), None);
        assert_eq!(view.get(&Id::from(1)).map(|m| m.content.as_str()), Some("edited"));
        assert_eq!(view.insert_new(message(2, "b")), Some(ViewMutation::Append(message(2, "b"))));
        assert_eq!(view.ids(), vec![Id::from(1), Id::from(2)]);
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut view = ViewModel::new();
        for id in 1..=3 {
            view.upsert(message(id, "x"));
        }

        assert_eq!(
            view.remove(&Id::from(2)),
            Some(ViewMutation::Remove { id: Id::from(2) })
        );
        assert_eq!(view.remove(&Id::from(2)), None);
        assert_eq!(view.ids(), vec![Id::from(1), Id::from(3)]);
    }

    #[test]
    fn test_edit_unknown_is_ignored() {
        let mut view = ViewModel::new();
        assert_eq!(view.edit(&Id::from(1), "x"), None);
        assert!(view.is_empty());
    }
}
