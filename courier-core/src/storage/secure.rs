// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Secure Storage
//!
//! Owner secrets and the message resume cursor. The SQLite implementation
//! seals every secret with the storage key before writing it.

use rusqlite::{params, OptionalExtension};

use super::{unix_now, Storage, StorageError};
use crate::crypto::{open, seal};

const ROUTER_PUB_KEY: &str = "router_pub_key";
const AUTHORIZATION_TOKEN: &str = "authorization_token";

/// Storage for the owner's secrets and resume cursor.
///
/// `persist_*` methods return `Ok(false)` when the write was not accepted
/// (for example, a keystore that refused the entry). Callers treat
/// `Ok(false)` and `Err(_)` the same way.
pub trait SecureStorage: Send + Sync {
    /// Stores the chosen router node's public key.
    fn persist_router_pub_key(&self, pub_key: &str) -> Result<bool, StorageError>;

    /// Stores the relay authorization token.
    fn persist_authorization_token(&self, token: &str) -> Result<bool, StorageError>;

    /// Highest message index restored so far.
    fn read_last_message_index(&self) -> Result<Option<i64>, StorageError>;

    /// Advances the stored message index. Lower values never overwrite higher ones.
    fn persist_last_message_index(&self, index: i64) -> Result<bool, StorageError>;

    /// Loads the router public key, if stored.
    fn load_router_pub_key(&self) -> Result<Option<String>, StorageError>;

    /// Loads the authorization token, if stored.
    fn load_authorization_token(&self) -> Result<Option<String>, StorageError>;
}

impl Storage {
    fn save_secret(&self, name: &str, value: &str) -> Result<bool, StorageError> {
        let sealed = seal(&self.sealing_key, value.as_bytes())?;
        let changed = self.conn.lock().execute(
            "INSERT OR REPLACE INTO owner_secrets (name, value_sealed, updated_at) VALUES (?1, ?2, ?3)",
            params![name, sealed, unix_now() as i64],
        )?;
        Ok(changed == 1)
    }

    fn load_secret(&self, name: &str) -> Result<Option<String>, StorageError> {
        let sealed: Option<Vec<u8>> = self
            .conn
            .lock()
            .query_row(
                "SELECT value_sealed FROM owner_secrets WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        match sealed {
            Some(sealed) => {
                let plain = open(&self.sealing_key, &sealed)?;
                String::from_utf8(plain)
                    .map(Some)
                    .map_err(|e| StorageError::Serialization(e.to_string()))
            }
            None => Ok(None),
        }
    }
}

impl SecureStorage for Storage {
    fn persist_router_pub_key(&self, pub_key: &str) -> Result<bool, StorageError> {
        self.save_secret(ROUTER_PUB_KEY, pub_key)
    }

    fn persist_authorization_token(&self, token: &str) -> Result<bool, StorageError> {
        self.save_secret(AUTHORIZATION_TOKEN, token)
    }

    fn read_last_message_index(&self) -> Result<Option<i64>, StorageError> {
        let index: Option<Option<i64>> = self
            .conn
            .lock()
            .query_row(
                "SELECT message_last_index FROM owner_state WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(index.flatten())
    }

    fn persist_last_message_index(&self, index: i64) -> Result<bool, StorageError> {
        self.conn.lock().execute(
            "INSERT INTO owner_state (id, message_last_index, updated_at) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
                message_last_index = MAX(COALESCE(message_last_index, ?1), ?1),
                updated_at = ?2",
            params![index, unix_now() as i64],
        )?;
        Ok(true)
    }

    fn load_router_pub_key(&self) -> Result<Option<String>, StorageError> {
        self.load_secret(ROUTER_PUB_KEY)
    }

    fn load_authorization_token(&self) -> Result<Option<String>, StorageError> {
        self.load_secret(AUTHORIZATION_TOKEN)
    }
}
