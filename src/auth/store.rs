//! Authentication store
//!
//! Per-user cache of the last computed authentication, its expiration and
//! how many times it has been stored. Safe to share between tasks.

use super::types::Authentication;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors raised by the store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("User `{user}` is not authenticated")]
    Unauthenticated { user: String },

    #[error("Authentication for user `{user}` expired at {expired_at}")]
    ExpiredAuthentication {
        user: String,
        expired_at: DateTime<Utc>,
    },
}

/// One stored authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRecord {
    pub authentication: Authentication,
    pub expires_at: DateTime<Utc>,
    /// 0 on the first store, then incremented on every store
    pub refresh_count: u32,
}

impl StoreRecord {
    /// Check if the record is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Keyed cache of authentications
#[derive(Debug, Default)]
pub struct AuthenticationStore {
    records: RwLock<HashMap<String, StoreRecord>>,
}

impl AuthenticationStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an authentication, returning how many times this user had
    /// already been stored.
    pub async fn store(
        &self,
        user: &str,
        authentication: Authentication,
        expires_at: DateTime<Utc>,
    ) -> u32 {
        let mut records = self.records.write().await;
        let refresh_count = records
            .get(user)
            .map_or(0, |record| record.refresh_count + 1);

        records.insert(
            user.to_string(),
            StoreRecord {
                authentication,
                expires_at,
                refresh_count,
            },
        );

        refresh_count
    }

    /// Stored authentication and expiration, expired or not
    pub async fn get(&self, user: &str) -> Result<(Authentication, DateTime<Utc>), StoreError> {
        let records = self.records.read().await;
        records
            .get(user)
            .map(|record| (record.authentication.clone(), record.expires_at))
            .ok_or_else(|| StoreError::Unauthenticated {
                user: user.to_string(),
            })
    }

    /// Stored authentication, failing if it has expired
    pub async fn get_unexpired(&self, user: &str) -> Result<Authentication, StoreError> {
        let records = self.records.read().await;
        match records.get(user) {
            None => Err(StoreError::Unauthenticated {
                user: user.to_string(),
            }),
            Some(record) if record.is_expired() => Err(StoreError::ExpiredAuthentication {
                user: user.to_string(),
                expired_at: record.expires_at,
            }),
            Some(record) => Ok(record.authentication.clone()),
        }
    }

    /// Full record for a user
    pub async fn record(&self, user: &str) -> Option<StoreRecord> {
        self.records.read().await.get(user).cloned()
    }

    /// Whether the stored authentication has expired
    pub async fn is_expired(&self, user: &str) -> Result<bool, StoreError> {
        let (_, expires_at) = self.get(user).await?;
        Ok(expires_at <= Utc::now())
    }

    /// Expire a user's authentication now, keeping its value
    pub async fn expire(&self, user: &str) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(user)
            .ok_or_else(|| StoreError::Unauthenticated {
                user: user.to_string(),
            })?;
        record.expires_at = Utc::now();
        Ok(())
    }

    /// Number of users stored
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
