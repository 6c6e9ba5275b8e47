use aries_vcx_wallet::wallet::base_wallet::BaseWallet;
use messages::{
    msg_fields::protocols::routing::{Forward, ForwardContent},
    misc::NoDecorators,
    AriesMessage,
};
use public_key::Key;
use uuid::Uuid;

use crate::errors::error::prelude::*;

#[derive(Debug)]
pub struct EncryptionEnvelope(pub Vec<u8>);

/// Plaintext message together with the keys of the envelope it arrived in.
#[derive(Debug, Clone)]
pub struct UnpackedMessage {
    pub message: AriesMessage,
    /// `None` for anoncrypted envelopes.
    pub sender_vk: Option<String>,
    pub recipient_vk: String,
}

fn parse_key(key: &str) -> VcxResult<Key> {
    Key::from_verkey_or_did_key(key).map_err(|err| {
        AriesVcxError::from_msg(
            AriesVcxErrorKind::InvalidInput,
            format!("Invalid verkey {key}: {err}"),
        )
    })
}

impl EncryptionEnvelope {
    /// Packs `data` for `recipient_key` (authcrypted when `sender_vk` is given), then wraps
    /// it into one `forward` layer per routing key, outermost layer last.
    pub async fn create_from_keys(
        wallet: &dyn BaseWallet,
        data: &[u8],
        sender_vk: Option<&str>,
        recipient_key: &str,
        routing_keys: &[String],
    ) -> VcxResult<EncryptionEnvelope> {
        trace!(
            "EncryptionEnvelope::create_from_keys >>> sender_vk: {:?}, recipient_key: {}, \
             routing_keys: {:?}",
            sender_vk,
            recipient_key,
            routing_keys
        );
        let message =
            EncryptionEnvelope::encrypt_for_pairwise(wallet, data, sender_vk, recipient_key)
                .await?;
        EncryptionEnvelope::wrap_into_forward_messages(wallet, message, recipient_key, routing_keys)
            .await
            .map(EncryptionEnvelope)
    }

    async fn encrypt_for_pairwise(
        wallet: &dyn BaseWallet,
        data: &[u8],
        sender_vk: Option<&str>,
        recipient_key: &str,
    ) -> VcxResult<Vec<u8>> {
        debug!(
            "Encrypting for pairwise; sender_vk: {:?}, recipient_key: {}",
            sender_vk, recipient_key
        );
        let sender_vk = sender_vk.map(parse_key).transpose()?;
        let recipient_key = parse_key(recipient_key)?;
        Ok(wallet
            .pack_message(sender_vk, vec![recipient_key], data)
            .await?)
    }

    async fn wrap_into_forward_messages(
        wallet: &dyn BaseWallet,
        mut message: Vec<u8>,
        recipient_key: &str,
        routing_keys: &[String],
    ) -> VcxResult<Vec<u8>> {
        let mut to = recipient_key.to_owned();
        for routing_key in routing_keys {
            debug!("Wrapping message in forward to {to}, routing key {routing_key}");
            message = EncryptionEnvelope::wrap_into_forward(wallet, message, &to, routing_key).await?;
            to = routing_key.clone();
        }
        Ok(message)
    }

    async fn wrap_into_forward(
        wallet: &dyn BaseWallet,
        message: Vec<u8>,
        to: &str,
        routing_key: &str,
    ) -> VcxResult<Vec<u8>> {
        let content = ForwardContent::builder()
            .to(to.to_owned())
            .msg(serde_json::from_slice(&message)?)
            .build();
        let forward: AriesMessage = Forward::builder()
            .id(Uuid::new_v4().to_string())
            .content(content)
            .decorators(NoDecorators::default())
            .build()
            .into();

        let routing_key = parse_key(routing_key)?;
        Ok(wallet
            .pack_message(None, vec![routing_key], &forward.to_vec()?)
            .await?)
    }

    /// Decrypts and decodes a packed message, peeling off `forward` layers addressed to keys
    /// this wallet holds.
    pub async fn unpack_aries_msg(
        wallet: &dyn BaseWallet,
        payload: &[u8],
    ) -> VcxResult<UnpackedMessage> {
        trace!(
            "EncryptionEnvelope::unpack_aries_msg >>> processing payload of {} bytes",
            payload.len()
        );
        let mut payload = payload.to_vec();
        loop {
            let unpacked = Self::anon_unpack(wallet, &payload).await?;
            match unpacked.message {
                AriesMessage::Routing(forward) => {
                    debug!("Unwrapping forward addressed to {}", forward.content.to);
                    payload = serde_json::to_vec(&forward.content.msg)?;
                }
                _ => return Ok(unpacked),
            }
        }
    }

    /// Decrypts without any expectation on the sender.
    pub async fn anon_unpack(wallet: &dyn BaseWallet, payload: &[u8]) -> VcxResult<UnpackedMessage> {
        let unpacked = wallet.unpack_message(payload).await?;
        let message = AriesMessage::from_slice(unpacked.message.as_bytes())?;
        Ok(UnpackedMessage {
            message,
            sender_vk: unpacked.sender_verkey,
            recipient_vk: unpacked.recipient_verkey,
        })
    }

    /// Decrypts and requires the envelope to be authcrypted by `expected_vk`.
    pub async fn auth_unpack(
        wallet: &dyn BaseWallet,
        payload: &[u8],
        expected_vk: &str,
    ) -> VcxResult<AriesMessage> {
        trace!(
            "EncryptionEnvelope::auth_unpack >>> processing payload of {} bytes, expected_vk: {}",
            payload.len(),
            expected_vk
        );
        let unpacked = Self::anon_unpack(wallet, payload).await?;
        check_sender(unpacked.sender_vk.as_deref(), expected_vk)?;
        Ok(unpacked.message)
    }
}

/// Sender authentication for messages on an established pairwise channel.
pub fn check_sender(sender_vk: Option<&str>, expected_vk: &str) -> VcxResult<()> {
    match sender_vk {
        Some(sender_vk) if sender_vk == expected_vk => Ok(()),
        Some(sender_vk) => {
            error!(
                "auth_unpack  sender_vk != expected_vk.... sender_vk: {}, expected_vk: {}",
                sender_vk, expected_vk
            );
            Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::AuthenticationError,
                format!(
                    "Message did not pass authentication check. Expected sender verkey was {}, \
                     but actually was {}",
                    expected_vk, sender_vk
                ),
            ))
        }
        None => {
            error!("auth_unpack  message was anoncrypted");
            Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::AuthenticationError,
                "Can't authenticate message because it was anoncrypted.",
            ))
        }
    }
}

#[cfg(test)]
pub mod unit_tests {
    use aries_vcx_wallet::wallet::base_wallet::did_wallet::DidWallet;
    use messages::msg_fields::protocols::trust_ping::ping::{Ping, PingContent, PingDecorators};
    use test_utils::dev_wallet::DevWallet;

    use super::*;

    fn make_ping() -> AriesMessage {
        Ping::builder()
            .id("ping-1".to_owned())
            .content(PingContent::builder().response_requested(true).build())
            .decorators(PingDecorators::default())
            .build()
            .into()
    }

    async fn create_key(wallet: &DevWallet) -> String {
        wallet
            .create_and_store_my_did(None)
            .await
            .unwrap()
            .verkey()
            .base58()
    }

    #[tokio::test]
    async fn test_encryption_envelope_works_for_recipient_only() {
        let wallet = DevWallet::new();
        let sender_key = create_key(&wallet).await;
        let recipient_key = create_key(&wallet).await;
        let message = make_ping();

        let envelope = EncryptionEnvelope::create_from_keys(
            &wallet,
            &message.to_vec().unwrap(),
            Some(&sender_key),
            &recipient_key,
            &[],
        )
        .await
        .unwrap();
        let unpacked = EncryptionEnvelope::anon_unpack(&wallet, &envelope.0)
            .await
            .unwrap();
        assert_eq!(unpacked.message, message);
        assert_eq!(unpacked.sender_vk, Some(sender_key));
        assert_eq!(unpacked.recipient_vk, recipient_key);
    }

    #[tokio::test]
    async fn test_encryption_envelope_works_for_routing_keys() {
        let wallet = DevWallet::new();
        let sender_key = create_key(&wallet).await;
        let recipient_key = create_key(&wallet).await;
        let key_1 = create_key(&wallet).await;
        let key_2 = create_key(&wallet).await;
        let message = make_ping();

        let envelope = EncryptionEnvelope::create_from_keys(
            &wallet,
            &message.to_vec().unwrap(),
            Some(&sender_key),
            &recipient_key,
            &[key_1.clone(), key_2.clone()],
        )
        .await
        .unwrap();

        let outer = EncryptionEnvelope::anon_unpack(&wallet, &envelope.0)
            .await
            .unwrap();
        assert_eq!(outer.recipient_vk, key_2);
        let AriesMessage::Routing(forward) = outer.message else {
            panic!("expected forward");
        };
        assert_eq!(forward.content.to, key_1);

        let unpacked = EncryptionEnvelope::unpack_aries_msg(&wallet, &envelope.0)
            .await
            .unwrap();
        assert_eq!(unpacked.message, message);
        assert_eq!(unpacked.recipient_vk, recipient_key);
    }

    #[tokio::test]
    async fn test_auth_unpack_checks_sender() {
        let wallet = DevWallet::new();
        let sender_key = create_key(&wallet).await;
        let other_key = create_key(&wallet).await;
        let recipient_key = create_key(&wallet).await;
        let data = make_ping().to_vec().unwrap();

        let envelope = EncryptionEnvelope::create_from_keys(
            &wallet,
            &data,
            Some(&sender_key),
            &recipient_key,
            &[],
        )
        .await
        .unwrap();
        EncryptionEnvelope::auth_unpack(&wallet, &envelope.0, &sender_key)
            .await
            .unwrap();
        let err = EncryptionEnvelope::auth_unpack(&wallet, &envelope.0, &other_key)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), AriesVcxErrorKind::AuthenticationError);

        let anon = EncryptionEnvelope::create_from_keys(&wallet, &data, None, &recipient_key, &[])
            .await
            .unwrap();
        let err = EncryptionEnvelope::auth_unpack(&wallet, &anon.0, &sender_key)
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Crypto);
    }

    #[tokio::test]
    async fn test_unknown_recipient_is_crypto_failure() {
        let sender = DevWallet::new();
        let stranger = DevWallet::new();
        let recipient_key = create_key(&sender).await;
        let envelope = EncryptionEnvelope::create_from_keys(
            &sender,
            &make_ping().to_vec().unwrap(),
            None,
            &recipient_key,
            &[],
        )
        .await
        .unwrap();
        let err = EncryptionEnvelope::unpack_aries_msg(&stranger, &envelope.0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), AriesVcxErrorKind::AuthenticationError);
    }
}
