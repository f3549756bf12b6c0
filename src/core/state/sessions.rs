// src/core/state/sessions.rs

//! The bidirectional connection <-> username mapping.

use super::ConnectionId;
use crate::core::ChatError;
use std::collections::HashMap;

/// Tracks registered sessions. Usernames are unique and matched exactly.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    names: HashMap<ConnectionId, String>,
    ids: HashMap<String, ConnectionId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Binds `name` to `id`. A connection is named exactly once.
    pub fn register(&mut self, id: ConnectionId, name: &str) -> Result<(), ChatError> {
        if self.names.contains_key(&id) {
            return Err(ChatError::AlreadyRegistered);
        }
        if self.ids.contains_key(name) {
            return Err(ChatError::UsernameTaken);
        }
        self.names.insert(id, name.to_string());
        self.ids.insert(name.to_string(), id);
        Ok(())
    }

    /// Removes the session for `id`, returning its username if it was registered.
    pub fn remove(&mut self, id: ConnectionId) -> Option<String> {
        let name = self.names.remove(&id)?;
        self.ids.remove(&name);
        Some(name)
    }

    pub fn username(&self, id: ConnectionId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn lookup(&self, name: &str) -> Option<ConnectionId> {
        self.ids.get(name).copied()
    }

    pub fn is_registered(&self, id: ConnectionId) -> bool {
        self.names.contains_key(&id)
    }

    /// All registered connection ids, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.names.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
