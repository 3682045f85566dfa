//! Key exchange between a registered sender and a target device.

use crate::curve::{generate_key_pair, parse_public_key_hex};
use crate::error::{require, ExchangeError};
use crate::registry::DeviceRegistry;
use crate::secrets::{NewSharedSecret, SecretStore};
use serde::Serialize;
use tracing::{info, instrument};

/// What the sender needs to finish its half of the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeResult {
    pub target_identifier: String,
    /// Receiver's fresh public key, uncompressed hex
    pub target_public_key: String,
    pub target_phone: String,
}

/// Coordinates key agreement between a sender and the device behind a phone
/// number.
#[derive(Clone, Debug)]
pub struct KeyExchangeCoordinator {
    registry: DeviceRegistry,
    secrets: SecretStore,
}

impl KeyExchangeCoordinator {
    pub fn new(registry: DeviceRegistry, secrets: SecretStore) -> Self {
        Self { registry, secrets }
    }

    /// Agree a secret between `sender_identifier` and the device registered
    /// under `target_phone`.
    ///
    /// A key pair is generated for the receiving side and combined with the
    /// sender's public key. The resulting secret is stored under
    /// `(sender, target)` so the target device can fetch it; the sender
    /// derives the same value from `target_public_key` and its own private key.
    /// The receiver's private key never leaves this call.
    ///
    /// Nothing is written unless the key is valid and the target exists.
    #[instrument(skip(self, sender_public_key))]
    pub async fn initiate_exchange(
        &self,
        sender_identifier: &str,
        sender_public_key: &str,
        target_phone: &str,
    ) -> Result<ExchangeResult, ExchangeError> {
        require("senderIdentifier", sender_identifier)?;
        require("senderPublicKey", sender_public_key)?;
        require("targetPhoneNumber", target_phone)?;

        let sender_key = parse_public_key_hex(sender_public_key)?;

        let target = self.registry.find_device_record(target_phone).await?;

        let receiver_keys = generate_key_pair()?;
        let shared_secret = receiver_keys.diffie_hellman(&sender_key);

        // The sender need not be registered; its phone is captured when known.
        let sender_phone = self
            .registry
            .find_by_identifier(sender_identifier)
            .await?
            .map(|device| device.phone_number);

        self.secrets
            .store_secret(NewSharedSecret {
                sender_identifier,
                sender_phone: sender_phone.as_deref(),
                receiver_identifier: &target.identifier,
                receiver_phone: Some(&target.phone_number),
                shared_secret: &shared_secret,
            })
            .await?;

        info!(
            %sender_identifier,
            target_identifier = %target.identifier,
            "Key exchange completed"
        );

        Ok(ExchangeResult {
            target_identifier: target.identifier,
            target_public_key: receiver_keys.public_key_hex(),
            target_phone: target.phone_number,
        })
    }
}
