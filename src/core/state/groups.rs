// src/core/state/groups.rs

//! Named groups of connections for scoped broadcast.

use super::ConnectionId;
use crate::core::ChatError;
use std::collections::{HashMap, HashSet};

/// Maps a group name to its members. A group exists only while it has at
/// least one member; it is created by the first join and deleted as soon as the
/// last member leaves or disconnects.
#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: HashMap<String, HashSet<ConnectionId>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds `id` to `group`, creating the group if needed.
    pub fn join(&mut self, group: &str, id: ConnectionId) -> Result<(), ChatError> {
        let members = self.groups.entry(group.to_string()).or_default();
        if !members.insert(id) {
            return Err(ChatError::AlreadyInGroup(group.to_string()));
        }
        Ok(())
    }

    /// Removes `id` from `group`, deleting the group once it is empty.
    pub fn leave(&mut self, group: &str, id: ConnectionId) -> Result<(), ChatError> {
        let Some(members) = self.groups.get_mut(group) else {
            return Err(ChatError::NotAMember(group.to_string()));
        };
        if !members.remove(&id) {
            return Err(ChatError::NotAMember(group.to_string()));
        }
        if members.is_empty() {
            self.groups.remove(group);
        }
        Ok(())
    }

    /// Removes `id` from every group it belongs to and returns those groups' names.
    pub fn remove_everywhere(&mut self, id: ConnectionId) -> Vec<String> {
        let mut left = Vec::new();
        self.groups.retain(|name, members| {
            if members.remove(&id) {
                left.push(name.clone());
            }
            !members.is_empty()
        });
        left
    }

    pub fn members(&self, group: &str) -> Option<&HashSet<ConnectionId>> {
        self.groups.get(group)
    }

    pub fn is_member(&self, group: &str, id: ConnectionId) -> bool {
        self.groups
            .get(group)
            .is_some_and(|members| members.contains(&id))
    }

    pub fn contains(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.groups.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
