//! Shared-secret records between ordered device pairs.
//!
//! Records are keyed by the ordered `(sender_identifier, receiver_identifier)`
//! pair. Lookups by phone pair are exact, except [`SecretStore::exists_for_pair`]
//! which matches either ordering.

use crate::db::Database;
use crate::error::{require, ExchangeError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, instrument, warn};

const SELECT_RECORD: &str = r#"
    SELECT sender_identifier, sender_phone, receiver_identifier, receiver_phone,
           shared_secret, created_at
    FROM shared_secrets
"#;

/// A secret agreed between two devices.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SharedSecretRecord {
    pub sender_identifier: String,
    pub sender_phone: Option<String>,
    pub receiver_identifier: String,
    pub receiver_phone: Option<String>,
    pub shared_secret: String,
    /// Refreshed whenever the secret is overwritten
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for SharedSecretRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSecretRecord")
            .field("sender_identifier", &self.sender_identifier)
            .field("sender_phone", &self.sender_phone)
            .field("receiver_identifier", &self.receiver_identifier)
            .field("receiver_phone", &self.receiver_phone)
            .field("shared_secret", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Input for [`SecretStore::store_secret`].
#[derive(Clone)]
pub struct NewSharedSecret<'a> {
    pub sender_identifier: &'a str,
    pub sender_phone: Option<&'a str>,
    pub receiver_identifier: &'a str,
    pub receiver_phone: Option<&'a str>,
    pub shared_secret: &'a str,
}

/// Shared-secret store over the shared connection pool.
#[derive(Clone, Debug)]
pub struct SecretStore {
    db: Database,
}

impl SecretStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert or overwrite the secret for the ordered identifier pair.
    ///
    /// On overwrite only the secret and timestamp change; the phone numbers
    /// captured when the pair was first stored are kept.
    #[instrument(skip(self, secret), fields(
        sender = %secret.sender_identifier,
        receiver = %secret.receiver_identifier
    ))]
    pub async fn store_secret(&self, secret: NewSharedSecret<'_>) -> Result<(), ExchangeError> {
        require("senderIdentifier", secret.sender_identifier)?;
        require("receiverIdentifier", secret.receiver_identifier)?;
        require("sharedSecret", secret.shared_secret)?;

        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO shared_secrets (
                sender_identifier, sender_phone, receiver_identifier, receiver_phone,
                shared_secret, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (sender_identifier, receiver_identifier) DO UPDATE SET
                shared_secret = excluded.shared_secret,
                created_at = excluded.created_at
            "#,
        )
        .bind(secret.sender_identifier)
        .bind(secret.sender_phone)
        .bind(secret.receiver_identifier)
        .bind(secret.receiver_phone)
        .bind(secret.shared_secret)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await;

        if let Err(e) = result {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback after failed secret write also failed");
            }
            return Err(e.into());
        }

        tx.commit().await?;

        info!("Shared secret stored");
        Ok(())
    }

    /// Exact lookup by ordered identifier pair.
    pub async fn get_by_identifiers(
        &self,
        sender_identifier: &str,
        receiver_identifier: &str,
    ) -> Result<SharedSecretRecord, ExchangeError> {
        require("senderIdentifier", sender_identifier)?;
        require("receiverIdentifier", receiver_identifier)?;

        sqlx::query_as::<_, SharedSecretRecord>(&format!(
            "{} WHERE sender_identifier = ? AND receiver_identifier = ?",
            SELECT_RECORD
        ))
        .bind(sender_identifier)
        .bind(receiver_identifier)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| {
            ExchangeError::not_found(format!(
                "No shared secret from {} to {}",
                sender_identifier, receiver_identifier
            ))
        })
    }

    /// Exact lookup by ordered phone pair.
    pub async fn get_by_phones(
        &self,
        sender_phone: &str,
        receiver_phone: &str,
    ) -> Result<SharedSecretRecord, ExchangeError> {
        require("senderPhone", sender_phone)?;
        require("receiverPhone", receiver_phone)?;

        sqlx::query_as::<_, SharedSecretRecord>(&format!(
            "{} WHERE sender_phone = ? AND receiver_phone = ? ORDER BY created_at DESC LIMIT 1",
            SELECT_RECORD
        ))
        .bind(sender_phone)
        .bind(receiver_phone)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| {
            ExchangeError::not_found(format!(
                "No shared secret from {} to {}",
                sender_phone, receiver_phone
            ))
        })
    }

    /// Record between two phone numbers in either direction, if any.
    ///
    /// When both orderings exist the `(phone_a, phone_b)` record wins.
    pub async fn exists_for_pair(
        &self,
        phone_a: &str,
        phone_b: &str,
    ) -> Result<Option<SharedSecretRecord>, ExchangeError> {
        require("phoneA", phone_a)?;
        require("phoneB", phone_b)?;

        let record = sqlx::query_as::<_, SharedSecretRecord>(&format!(
            r#"{}
            WHERE (sender_phone = ? AND receiver_phone = ?)
               OR (sender_phone = ? AND receiver_phone = ?)
            ORDER BY sender_phone = ? DESC, created_at DESC
            LIMIT 1"#,
            SELECT_RECORD
        ))
        .bind(phone_a)
        .bind(phone_b)
        .bind(phone_b)
        .bind(phone_a)
        .bind(phone_a)
        .fetch_optional(&*self.db)
        .await?;

        debug!(found = record.is_some(), "Checked shared secret for phone pair");
        Ok(record)
    }

    /// Number of stored secrets.
    pub async fn count(&self) -> Result<usize, ExchangeError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shared_secrets")
            .fetch_one(&*self.db)
            .await?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SecretStore {
        SecretStore::new(Database::in_memory().await.unwrap())
    }

    fn secret<'a>(
        sender: &'a str,
        sender_phone: &'a str,
        receiver: &'a str,
        receiver_phone: &'a str,
        value: &'a str,
    ) -> NewSharedSecret<'a> {
        NewSharedSecret {
            sender_identifier: sender,
            sender_phone: Some(sender_phone),
            receiver_identifier: receiver,
            receiver_phone: Some(receiver_phone),
            shared_secret: value,
        }
    }

    #[tokio::test]
    async fn test_store_and_get_by_identifiers() {
        let store = store().await;
        store
            .store_secret(secret("dev-1", "A", "dev-2", "B", "s3cr3t"))
            .await
            .unwrap();

        let record = store.get_by_identifiers("dev-1", "dev-2").await.unwrap();
        assert_eq!(record.shared_secret, "s3cr3t");
        assert_eq!(record.sender_phone.as_deref(), Some("A"));
        assert_eq!(record.receiver_phone.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_identifier_lookup_is_ordered() {
        let store = store().await;
        store
            .store_secret(secret("dev-1", "A", "dev-2", "B", "s3cr3t"))
            .await
            .unwrap();

        assert!(matches!(
            store.get_by_identifiers("dev-2", "dev-1").await,
            Err(ExchangeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_overwrite_refreshes_secret_and_timestamp() {
        let store = store().await;
        store
            .store_secret(secret("dev-1", "A", "dev-2", "B", "first"))
            .await
            .unwrap();
        let first = store.get_by_identifiers("dev-1", "dev-2").await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        store
            .store_secret(secret("dev-1", "A2", "dev-2", "B2", "second"))
            .await
            .unwrap();
        let second = store.get_by_identifiers("dev-1", "dev-2").await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(second.shared_secret, "second");
        assert!(second.created_at > first.created_at);
        assert_eq!(second.sender_phone.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_reverse_pair_is_separate_record() {
        let store = store().await;
        store
            .store_secret(secret("dev-1", "A", "dev-2", "B", "forward"))
            .await
            .unwrap();
        store
            .store_secret(secret("dev-2", "B", "dev-1", "A", "backward"))
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(
            store.get_by_phones("B", "A").await.unwrap().shared_secret,
            "backward"
        );
    }

    #[tokio::test]
    async fn test_get_by_phones() {
        let store = store().await;
        store
            .store_secret(secret("dev-1", "A", "dev-2", "B", "s3cr3t"))
            .await
            .unwrap();

        let record = store.get_by_phones("A", "B").await.unwrap();
        assert_eq!(record.sender_identifier, "dev-1");
        assert!(matches!(
            store.get_by_phones("B", "A").await,
            Err(ExchangeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_exists_for_pair_either_order() {
        let store = store().await;
        store
            .store_secret(secret("dev-1", "A", "dev-2", "B", "s3cr3t"))
            .await
            .unwrap();

        let forward = store.exists_for_pair("A", "B").await.unwrap().unwrap();
        let reverse = store.exists_for_pair("B", "A").await.unwrap().unwrap();
        assert_eq!(forward, reverse);
        assert_eq!(reverse.sender_identifier, "dev-1");

        assert!(store.exists_for_pair("A", "C").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exists_for_pair_prefers_query_order() {
        let store = store().await;
        store
            .store_secret(secret("dev-1", "A", "dev-2", "B", "forward"))
            .await
            .unwrap();
        store
            .store_secret(secret("dev-2", "B", "dev-1", "A", "backward"))
            .await
            .unwrap();

        let record = store.exists_for_pair("B", "A").await.unwrap().unwrap();
        assert_eq!(record.shared_secret, "backward");
    }

    #[tokio::test]
    async fn test_store_without_phones() {
        let store = store().await;
        store
            .store_secret(NewSharedSecret {
                sender_identifier: "dev-1",
                sender_phone: None,
                receiver_identifier: "dev-2",
                receiver_phone: None,
                shared_secret: "s3cr3t",
            })
            .await
            .unwrap();

        let record = store.get_by_identifiers("dev-1", "dev-2").await.unwrap();
        assert!(record.sender_phone.is_none());
        assert!(record.receiver_phone.is_none());
    }

    #[tokio::test]
    async fn test_store_rejects_empty_fields() {
        let store = store().await;

        let cases = [
            secret("", "A", "dev-2", "B", "s"),
            secret("dev-1", "A", "", "B", "s"),
            secret("dev-1", "A", "dev-2", "B", ""),
        ];
        for case in cases {
            assert!(matches!(
                store.store_secret(case).await,
                Err(ExchangeError::Validation(_))
            ));
        }
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let record = SharedSecretRecord {
            sender_identifier: "dev-1".into(),
            sender_phone: None,
            receiver_identifier: "dev-2".into(),
            receiver_phone: None,
            shared_secret: "do-not-print".into(),
            created_at: Utc::now(),
        };

        let debug = format!("{:?}", record);
        assert!(!debug.contains("do-not-print"));
        assert!(debug.contains("[REDACTED]"));
    }
}
