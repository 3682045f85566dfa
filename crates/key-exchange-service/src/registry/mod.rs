//! Device registry backed by the `devices` table.

mod devices;

pub use devices::DeviceRegistry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marker for the international dialling prefix.
pub const INTERNATIONAL_PREFIX: char = '+';

/// A registered device.
///
/// The table's surrogate `id` stays in storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Client-chosen identifier, unique across devices
    pub identifier: String,

    /// Opaque code supplied at registration
    pub registration_code: String,

    /// Phone number as registered, unique across devices
    pub phone_number: String,

    /// When the device was first registered
    pub created_at: DateTime<Utc>,
}

/// The two spellings a phone number may have been registered under.
///
/// The query value always comes first; the second entry has the leading `+`
/// removed if present, or added if absent.
pub fn phone_variants(phone_number: &str) -> [String; 2] {
    let alternate = match phone_number.strip_prefix(INTERNATIONAL_PREFIX) {
        Some(rest) => rest.to_string(),
        None => format!("{}{}", INTERNATIONAL_PREFIX, phone_number),
    };
    [phone_number.to_string(), alternate]
}
