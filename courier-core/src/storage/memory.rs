// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! In-memory storage with failure injection.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use super::restore::RestoreStore;
use super::secure::SecureStorage;
use super::StorageError;
use crate::network::{ContactRecord, MessageRecord};
use crate::restore::RestoreCheckpoint;

#[derive(Default)]
struct MemoryState {
    router_pub_key: Option<String>,
    authorization_token: Option<String>,
    last_message_index: Option<i64>,
    contacts: BTreeMap<String, ContactRecord>,
    messages: BTreeMap<i64, MessageRecord>,
    checkpoint: Option<RestoreCheckpoint>,
    refuse_router_key: usize,
    router_key_attempts: usize,
    fail_message_writes: usize,
    fail_contact_writes: usize,
}

/// Volatile [`SecureStorage`] + [`RestoreStore`].
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
}

impl MemoryStorage {
    /// Creates empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with a stored message index, as after an earlier partial restore.
    pub fn with_last_message_index(self, index: i64) -> Self {
        self.state.lock().last_message_index = Some(index);
        self
    }

    /// The next `n` router key writes return `Ok(false)`.
    pub fn refuse_router_key(&self, n: usize) {
        self.state.lock().refuse_router_key = n;
    }

    /// The next `n` contact page writes fail.
    pub fn fail_contact_writes(&self, n: usize) {
        self.state.lock().fail_contact_writes = n;
    }

    /// The next `n` message page writes fail.
    pub fn fail_message_writes(&self, n: usize) {
        self.state.lock().fail_message_writes = n;
    }

    /// Router key write attempts, refused ones included.
    pub fn router_key_attempts(&self) -> usize {
        self.state.lock().router_key_attempts
    }

    /// Stored contacts keyed by public key.
    pub fn contacts(&self) -> Vec<ContactRecord> {
        self.state.lock().contacts.values().cloned().collect()
    }

    /// Stored message indexes in order.
    pub fn message_ids(&self) -> Vec<i64> {
        self.state.lock().messages.keys().copied().collect()
    }
}

impl SecureStorage for MemoryStorage {
    fn persist_router_pub_key(&self, pub_key: &str) -> Result<bool, StorageError> {
        let mut state = self.state.lock();
        state.router_key_attempts += 1;
        if state.refuse_router_key > 0 {
            state.refuse_router_key -= 1;
            return Ok(false);
        }
        state.router_pub_key = Some(pub_key.to_string());
        Ok(true)
    }

    fn persist_authorization_token(&self, token: &str) -> Result<bool, StorageError> {
        self.state.lock().authorization_token = Some(token.to_string());
        Ok(true)
    }

    fn read_last_message_index(&self) -> Result<Option<i64>, StorageError> {
        Ok(self.state.lock().last_message_index)
    }

    fn persist_last_message_index(&self, index: i64) -> Result<bool, StorageError> {
        let mut state = self.state.lock();
        state.last_message_index = Some(state.last_message_index.map_or(index, |i| i.max(index)));
        Ok(true)
    }

    fn load_router_pub_key(&self) -> Result<Option<String>, StorageError> {
        Ok(self.state.lock().router_pub_key.clone())
    }

    fn load_authorization_token(&self) -> Result<Option<String>, StorageError> {
        Ok(self.state.lock().authorization_token.clone())
    }
}

impl RestoreStore for MemoryStorage {
    fn store_contacts(&self, contacts: &[ContactRecord]) -> Result<usize, StorageError> {
        let mut state = self.state.lock();
        if state.fail_contact_writes > 0 {
            state.fail_contact_writes -= 1;
            return Err(StorageError::Unavailable("contact write refused".into()));
        }
        for contact in contacts {
            state
                .contacts
                .insert(contact.public_key.clone(), contact.clone());
        }
        Ok(contacts.len())
    }

    fn store_messages(&self, messages: &[MessageRecord]) -> Result<usize, StorageError> {
        let mut state = self.state.lock();
        if state.fail_message_writes > 0 {
            state.fail_message_writes -= 1;
            return Err(StorageError::Unavailable("message write refused".into()));
        }
        for message in messages {
            state.messages.insert(message.id, message.clone());
        }
        Ok(messages.len())
    }

    fn save_checkpoint(&self, checkpoint: &RestoreCheckpoint) -> Result<(), StorageError> {
        self.state.lock().checkpoint = Some(checkpoint.clone());
        Ok(())
    }

    fn load_checkpoint(&self) -> Result<Option<RestoreCheckpoint>, StorageError> {
        Ok(self.state.lock().checkpoint.clone())
    }

    fn clear_checkpoint(&self) -> Result<(), StorageError> {
        self.state.lock().checkpoint = None;
        Ok(())
    }

    fn contact_count(&self) -> Result<u64, StorageError> {
        Ok(self.state.lock().contacts.len() as u64)
    }

    fn message_count(&self) -> Result<u64, StorageError> {
        Ok(self.state.lock().messages.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refused_router_key_then_accepted() {
        let storage = MemoryStorage::new();
        storage.refuse_router_key(1);

        assert!(!storage.persist_router_pub_key("aa").unwrap());
        assert!(storage.persist_router_pub_key("aa").unwrap());
        assert_eq!(storage.router_key_attempts(), 2);
        assert_eq!(storage.load_router_pub_key().unwrap().as_deref(), Some("aa"));
    }

    #[test]
    fn test_message_write_failure_leaves_nothing() {
        let storage = MemoryStorage::new();
        storage.fail_message_writes(1);
        let page = vec![MessageRecord {
            id: 1,
            sender: "s".into(),
            content: "c".into(),
            created_at: 0,
        }];

        assert!(storage.store_messages(&page).is_err());
        assert_eq!(storage.message_count().unwrap(), 0);
        storage.store_messages(&page).unwrap();
        assert_eq!(storage.message_ids(), vec![1]);
    }
}
