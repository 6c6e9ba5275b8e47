//! In-memory ed25519 wallet for tests and local development.
//!
//! Envelopes: a random content key seals the payload with ChaCha20-Poly1305; the content
//! key is wrapped for every recipient with a key derived from an ephemeral X25519 exchange
//! against the recipient's verkey. Authcrypted payloads carry the sender verkey and its
//! signature inside the ciphertext.

use std::{collections::HashMap, sync::RwLock};

use aries_vcx_wallet::{
    errors::error::{VcxWalletError, VcxWalletResult},
    wallet::{
        base_wallet::{did_data::DidData, did_wallet::DidWallet, encoding::AttributeEncoder},
        structs_io::UnpackMessageOutput,
        utils::encode_attribute_value,
    },
};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key as CipherKey, Nonce,
};
use curve25519_dalek::{constants::X25519_BASEPOINT, montgomery::MontgomeryPoint};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use public_key::{Key, KeyType};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const ALG_AUTHCRYPT: &str = "Authcrypt";
const ALG_ANONCRYPT: &str = "Anoncrypt";

#[derive(Debug, Default)]
pub struct DevWallet {
    keys: RwLock<HashMap<String, SigningKey>>,
    dids: RwLock<HashMap<String, String>>,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    alg: String,
    recipients: Vec<WrappedKey>,
    iv: String,
    ciphertext: String,
}

#[derive(Serialize, Deserialize)]
struct WrappedKey {
    kid: String,
    epk: String,
    nonce: String,
    encrypted_key: String,
}

#[derive(Serialize, Deserialize)]
struct SealedPayload {
    msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

fn b64(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

fn unb64(value: &str) -> VcxWalletResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|err| VcxWalletError::DecryptionFailed(format!("invalid base64: {err}")))
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

fn verifying_key(key: &Key) -> VcxWalletResult<VerifyingKey> {
    key.validate_key_type(KeyType::Ed25519)?;
    let bytes: [u8; 32] = key
        .key()
        .try_into()
        .map_err(|_| VcxWalletError::InvalidInput(format!("invalid key length: {key}")))?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|err| VcxWalletError::InvalidInput(format!("invalid ed25519 key {key}: {err}")))
}

fn key_encryption_key(shared: &MontgomeryPoint, epk: &MontgomeryPoint, kid: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(shared.as_bytes());
    hasher.update(epk.as_bytes());
    hasher.update(kid.as_bytes());
    hasher.finalize().into()
}

fn seal(key: &[u8; 32], nonce: &[u8; 12], plaintext: &[u8]) -> VcxWalletResult<Vec<u8>> {
    ChaCha20Poly1305::new(CipherKey::from_slice(key))
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|err| VcxWalletError::InvalidInput(format!("encryption failed: {err}")))
}

fn open(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> VcxWalletResult<Vec<u8>> {
    if key.len() != 32 || nonce.len() != 12 {
        return Err(VcxWalletError::DecryptionFailed(
            "invalid key or nonce length".to_owned(),
        ));
    }
    ChaCha20Poly1305::new(CipherKey::from_slice(key))
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| VcxWalletError::DecryptionFailed("authentication tag mismatch".to_owned()))
}

/// Bytes covered by the sender signature: the payload bound to its recipients.
fn signed_bytes(msg: &[u8], recipients: &[WrappedKey]) -> Vec<u8> {
    let mut bytes = msg.to_vec();
    for recipient in recipients {
        bytes.extend_from_slice(recipient.kid.as_bytes());
    }
    bytes
}

impl DevWallet {
    pub fn new() -> Self {
        Self::default()
    }

    fn signing_key(&self, key: &Key) -> VcxWalletResult<SigningKey> {
        self.keys
            .read()?
            .get(&key.base58())
            .cloned()
            .ok_or_else(|| VcxWalletError::record_not_found(&key.base58()))
    }

    fn wrap_for_recipient(&self, cek: &[u8; 32], recipient: &Key) -> VcxWalletResult<WrappedKey> {
        let recipient_point = verifying_key(recipient)?.to_montgomery();
        let ephemeral: [u8; 32] = random_bytes();
        let epk = X25519_BASEPOINT.mul_clamped(ephemeral);
        let shared = recipient_point.mul_clamped(ephemeral);
        let kid = recipient.base58();
        let kek = key_encryption_key(&shared, &epk, &kid);
        let nonce: [u8; 12] = random_bytes();
        Ok(WrappedKey {
            encrypted_key: b64(&seal(&kek, &nonce, cek)?),
            epk: b64(epk.as_bytes()),
            nonce: b64(&nonce),
            kid,
        })
    }

    fn unwrap_content_key(&self, envelope: &Envelope) -> VcxWalletResult<(String, Vec<u8>)> {
        let keys = self.keys.read()?;
        let (wrapped, signing_key) = envelope
            .recipients
            .iter()
            .find_map(|wrapped| keys.get(&wrapped.kid).map(|key| (wrapped, key)))
            .ok_or(VcxWalletError::NoRecipientKeyFound)?;

        let epk_bytes: [u8; 32] = unb64(&wrapped.epk)?
            .try_into()
            .map_err(|_| VcxWalletError::DecryptionFailed("invalid ephemeral key".to_owned()))?;
        let epk = MontgomeryPoint(epk_bytes);
        let shared = epk.mul_clamped(signing_key.to_scalar_bytes());
        let kek = key_encryption_key(&shared, &epk, &wrapped.kid);
        let cek = open(&kek, &unb64(&wrapped.nonce)?, &unb64(&wrapped.encrypted_key)?)?;
        Ok((wrapped.kid.clone(), cek))
    }
}

#[async_trait]
impl DidWallet for DevWallet {
    async fn create_and_store_my_did(&self, seed: Option<&str>) -> VcxWalletResult<DidData> {
        let secret: [u8; 32] = match seed {
            Some(seed) => Sha256::digest(seed.as_bytes()).into(),
            None => random_bytes(),
        };
        let signing_key = SigningKey::from_bytes(&secret);
        let verkey = Key::new(
            signing_key.verifying_key().to_bytes().to_vec(),
            KeyType::Ed25519,
        )?;
        let did = bs58::encode(&verkey.key()[..16]).into_string();

        self.keys.write()?.insert(verkey.base58(), signing_key);
        self.dids.write()?.insert(did.clone(), verkey.base58());
        Ok(DidData::new(&did, &verkey))
    }

    async fn key_count(&self) -> VcxWalletResult<usize> {
        Ok(self.keys.read()?.len())
    }

    async fn key_for_did(&self, did: &str) -> VcxWalletResult<Key> {
        let dids = self.dids.read()?;
        let verkey = dids
            .get(did)
            .ok_or_else(|| VcxWalletError::record_not_found(did))?;
        Ok(Key::from_base58(verkey, KeyType::Ed25519)?)
    }

    async fn sign(&self, key: &Key, msg: &[u8]) -> VcxWalletResult<Vec<u8>> {
        Ok(self.signing_key(key)?.sign(msg).to_bytes().to_vec())
    }

    async fn verify(&self, key: &Key, msg: &[u8], signature: &[u8]) -> VcxWalletResult<bool> {
        let signature = Signature::from_slice(signature)
            .map_err(|err| VcxWalletError::InvalidInput(format!("invalid signature: {err}")))?;
        Ok(verifying_key(key)?.verify(msg, &signature).is_ok())
    }

    async fn pack_message(
        &self,
        sender_vk: Option<Key>,
        receiver_keys: Vec<Key>,
        msg: &[u8],
    ) -> VcxWalletResult<Vec<u8>> {
        if receiver_keys.is_empty() {
            return Err(VcxWalletError::InvalidInput(
                "Empty RecipientKeys has been passed".into(),
            ));
        }

        let cek: [u8; 32] = random_bytes();
        let recipients = receiver_keys
            .iter()
            .map(|key| self.wrap_for_recipient(&cek, key))
            .collect::<VcxWalletResult<Vec<_>>>()?;

        let (alg, payload) = match sender_vk {
            Some(sender_vk) => {
                let signature = self
                    .signing_key(&sender_vk)?
                    .sign(&signed_bytes(msg, &recipients));
                (
                    ALG_AUTHCRYPT,
                    SealedPayload {
                        msg: b64(msg),
                        sender: Some(sender_vk.base58()),
                        signature: Some(b64(&signature.to_bytes())),
                    },
                )
            }
            None => (
                ALG_ANONCRYPT,
                SealedPayload {
                    msg: b64(msg),
                    sender: None,
                    signature: None,
                },
            ),
        };

        let iv: [u8; 12] = random_bytes();
        let ciphertext = seal(&cek, &iv, &serde_json::to_vec(&payload)?)?;
        Ok(serde_json::to_vec(&Envelope {
            alg: alg.to_owned(),
            recipients,
            iv: b64(&iv),
            ciphertext: b64(&ciphertext),
        })?)
    }

    async fn unpack_message(&self, msg: &[u8]) -> VcxWalletResult<UnpackMessageOutput> {
        let envelope: Envelope = serde_json::from_slice(msg)?;
        let (recipient_verkey, cek) = self.unwrap_content_key(&envelope)?;
        let plaintext = open(&cek, &unb64(&envelope.iv)?, &unb64(&envelope.ciphertext)?)?;
        let payload: SealedPayload = serde_json::from_slice(&plaintext)?;
        let message = unb64(&payload.msg)?;

        let sender_verkey = match (envelope.alg.as_str(), payload.sender, payload.signature) {
            (ALG_AUTHCRYPT, Some(sender), Some(signature)) => {
                let sender_key = Key::from_base58(&sender, KeyType::Ed25519)?;
                let signature = Signature::from_slice(&unb64(&signature)?).map_err(|err| {
                    VcxWalletError::DecryptionFailed(format!("invalid sender signature: {err}"))
                })?;
                verifying_key(&sender_key)?
                    .verify(&signed_bytes(&message, &envelope.recipients), &signature)
                    .map_err(|_| {
                        VcxWalletError::DecryptionFailed(
                            "sender signature does not verify".to_owned(),
                        )
                    })?;
                Some(sender)
            }
            (ALG_ANONCRYPT, None, None) => None,
            (alg, ..) => {
                return Err(VcxWalletError::DecryptionFailed(format!(
                    "inconsistent {alg} envelope"
                )))
            }
        };

        Ok(UnpackMessageOutput {
            message: String::from_utf8(message)?,
            recipient_verkey,
            sender_verkey,
        })
    }
}

#[async_trait]
impl AttributeEncoder for DevWallet {
    async fn derive_encoding(&self, raw: &str) -> VcxWalletResult<String> {
        Ok(encode_attribute_value(raw))
    }
}
