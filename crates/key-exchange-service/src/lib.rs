//! Device key exchange service.
//!
//! Devices register under a client-chosen identifier and a phone number, look
//! each other up by phone, and agree a secp256k1 ECDH secret that is kept per
//! ordered device pair:
//! - `registry`: device upsert and phone-number lookup
//! - `exchange`: public-key validation and receiver-side key agreement
//! - `secrets`: shared-secret persistence and pair lookups

pub mod api;
pub mod config;
pub mod curve;
pub mod db;
pub mod error;
pub mod exchange;
pub mod registry;
pub mod secrets;

pub use crate::config::Config;
pub use crate::db::Database;
pub use crate::error::ExchangeError;
pub use crate::exchange::{ExchangeResult, KeyExchangeCoordinator};
pub use crate::registry::{Device, DeviceRegistry};
pub use crate::secrets::{NewSharedSecret, SecretStore, SharedSecretRecord};
