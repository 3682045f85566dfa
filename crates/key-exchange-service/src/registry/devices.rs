//! Device registration and lookup.

use super::{phone_variants, Device};
use crate::db::{is_unique_violation, Database};
use crate::error::{require, ExchangeError};
use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info, instrument, warn};

const SELECT_DEVICE: &str =
    "SELECT identifier, registration_code, phone_number, created_at FROM devices";

/// Device registry over the shared connection pool.
#[derive(Clone, Debug)]
pub struct DeviceRegistry {
    db: Database,
}

impl DeviceRegistry {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create or update the device named by `identifier`.
    ///
    /// A repeat registration overwrites the code and phone number but keeps the
    /// original creation time. Claiming a phone number that another identifier
    /// already owns, under either spelling of the international prefix, fails
    /// with [`ExchangeError::Conflict`] and leaves the table untouched.
    #[instrument(skip(self, registration_code))]
    pub async fn register_device(
        &self,
        identifier: &str,
        registration_code: &str,
        phone_number: &str,
    ) -> Result<(), ExchangeError> {
        require("identifier", identifier)?;
        require("registrationCode", registration_code)?;
        require("phoneNumber", phone_number)?;

        let mut tx = self.db.begin().await?;

        if let Err(e) = upsert_device(&mut tx, identifier, registration_code, phone_number).await {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback after failed registration also failed");
            }
            return Err(e);
        }

        tx.commit().await?;

        info!(%identifier, %phone_number, "Device registered");
        Ok(())
    }

    /// Identifier of the device registered under `phone_number`, with or
    /// without the international prefix.
    pub async fn find_by_phone(&self, phone_number: &str) -> Result<String, ExchangeError> {
        self.find_device_record(phone_number)
            .await
            .map(|device| device.identifier)
    }

    /// Full device record for `phone_number`, with or without the
    /// international prefix. An exact spelling match wins over the variant.
    #[instrument(skip(self))]
    pub async fn find_device_record(&self, phone_number: &str) -> Result<Device, ExchangeError> {
        require("phoneNumber", phone_number)?;
        let [exact, alternate] = phone_variants(phone_number);

        let device = sqlx::query_as::<_, Device>(&format!(
            "{} WHERE phone_number = ? OR phone_number = ? ORDER BY phone_number = ? DESC LIMIT 1",
            SELECT_DEVICE
        ))
        .bind(&exact)
        .bind(&alternate)
        .bind(&exact)
        .fetch_optional(&*self.db)
        .await?;

        match device {
            Some(device) => {
                debug!(identifier = %device.identifier, "Device found by phone number");
                Ok(device)
            }
            None => Err(ExchangeError::not_found(format!(
                "No device registered for {}",
                phone_number
            ))),
        }
    }

    /// Device registered under `identifier`, if any.
    pub async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<Device>, ExchangeError> {
        let device = sqlx::query_as::<_, Device>(&format!(
            "{} WHERE identifier = ?",
            SELECT_DEVICE
        ))
        .bind(identifier)
        .fetch_optional(&*self.db)
        .await?;

        Ok(device)
    }

    /// Number of registered devices.
    pub async fn count(&self) -> Result<usize, ExchangeError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM devices")
            .fetch_one(&*self.db)
            .await?;
        Ok(count as usize)
    }
}

fn phone_conflict(identifier: &str, phone_number: &str) -> ExchangeError {
    warn!(%identifier, %phone_number, "Phone number already owned by another device");
    ExchangeError::Conflict(format!(
        "Phone number {} is registered to another device",
        phone_number
    ))
}

async fn upsert_device(
    tx: &mut Transaction<'_, Sqlite>,
    identifier: &str,
    registration_code: &str,
    phone_number: &str,
) -> Result<(), ExchangeError> {
    // The unique index only sees the exact spelling.
    let [_, alternate] = phone_variants(phone_number);
    let alternate_owner: Option<String> = sqlx::query_scalar(
        "SELECT identifier FROM devices WHERE phone_number = ? AND identifier != ?",
    )
    .bind(&alternate)
    .bind(identifier)
    .fetch_optional(&mut **tx)
    .await?;

    if alternate_owner.is_some() {
        return Err(phone_conflict(identifier, phone_number));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO devices (identifier, registration_code, phone_number, created_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (identifier) DO UPDATE SET
            registration_code = excluded.registration_code,
            phone_number = excluded.phone_number
        "#,
    )
    .bind(identifier)
    .bind(registration_code)
    .bind(phone_number)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => Err(phone_conflict(identifier, phone_number)),
        Err(e) => Err(e.into()),
    }
}
