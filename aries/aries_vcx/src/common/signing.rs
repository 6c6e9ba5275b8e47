use anoncreds_types::data_types::{
    credential::{attribute_signature_input, AttributeValues},
    identifiers::schema_id::SchemaId,
};
use aries_vcx_wallet::wallet::base_wallet::BaseWallet;
use base64::{engine::general_purpose, Engine};
use chrono::Utc;
use messages::msg_fields::protocols::connection::{
    response::{ConnectionSignature, ResponseContent},
    ConnectionData,
};
use public_key::Key;

use crate::errors::error::prelude::*;

const TIMESTAMP_LEN: usize = 8;

fn parse_verkey(key: &str) -> VcxResult<Key> {
    Key::from_verkey_or_did_key(key).map_err(|err| {
        AriesVcxError::from_msg(
            AriesVcxErrorKind::InvalidInput,
            format!("Invalid verkey {key}: {err}"),
        )
    })
}

async fn get_signature_data(
    wallet: &dyn BaseWallet,
    data: String,
    key: &Key,
) -> VcxResult<(Vec<u8>, Vec<u8>)> {
    let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
    let mut sig_data = now.to_be_bytes().to_vec();
    sig_data.extend(data.as_bytes());

    let signature = wallet.sign(key, &sig_data).await?;
    Ok((signature, sig_data))
}

pub async fn sign_connection_response(
    wallet: &dyn BaseWallet,
    key: &str,
    con_data: &ConnectionData,
) -> VcxResult<ConnectionSignature> {
    trace!("sign_connection_response >>> key: {}", key);
    let verkey = parse_verkey(key)?;
    let con_data = serde_json::to_string(con_data)?;
    let (signature, sig_data) = get_signature_data(wallet, con_data, &verkey).await?;

    Ok(ConnectionSignature::builder()
        .signature(general_purpose::URL_SAFE.encode(signature))
        .sig_data(general_purpose::URL_SAFE.encode(sig_data))
        .signer(key.to_owned())
        .build())
}

fn key_agreement_err(msg: impl Into<String>) -> AriesVcxError {
    let msg = msg.into();
    error!("decode_signed_connection_response: {msg}");
    AriesVcxError::from_msg(AriesVcxErrorKind::KeyAgreementFailed, msg)
}

/// Verifies `connection~sig` against the key the invitation was addressed with and returns
/// the inviter's pairwise connection data.
pub async fn decode_signed_connection_response(
    wallet: &dyn BaseWallet,
    response: ResponseContent,
    their_vk: &str,
) -> VcxResult<ConnectionData> {
    trace!("decode_signed_connection_response >>> their_vk: {}", their_vk);
    let connection_sig = response.connection_sig;
    if connection_sig.signer != their_vk {
        return Err(key_agreement_err(format!(
            "Signer identity {} does not match the invitation key {}",
            connection_sig.signer, their_vk
        )));
    }

    let signature = general_purpose::URL_SAFE
        .decode(connection_sig.signature.as_bytes())
        .map_err(|err| key_agreement_err(format!("Cannot decode signature: {err}")))?;
    let sig_data = general_purpose::URL_SAFE
        .decode(connection_sig.sig_data.as_bytes())
        .map_err(|err| key_agreement_err(format!("Cannot decode sig_data: {err}")))?;

    let verkey = parse_verkey(their_vk)?;
    let valid = wallet
        .verify(&verkey, &sig_data, &signature)
        .await
        .map_err(|err| key_agreement_err(format!("Cannot verify signature: {err}")))?;
    if !valid {
        return Err(key_agreement_err(
            "ConnectionResponse signature is invalid for original Invite recipient key",
        ));
    }

    if sig_data.len() <= TIMESTAMP_LEN {
        return Err(key_agreement_err("Signed connection data is empty"));
    }
    serde_json::from_slice(&sig_data[TIMESTAMP_LEN..])
        .map_err(|err| key_agreement_err(format!("Cannot parse signed connection data: {err}")))
}

pub async fn sign_attribute(
    wallet: &dyn BaseWallet,
    issuer_vk: &str,
    cred_id: &str,
    schema_id: &SchemaId,
    name: &str,
    encoded: &str,
) -> VcxResult<String> {
    let verkey = parse_verkey(issuer_vk)?;
    let input = attribute_signature_input(cred_id, schema_id, name, encoded);
    let signature = wallet.sign(&verkey, &input).await?;
    Ok(general_purpose::URL_SAFE.encode(signature))
}

/// `Ok(false)` for any signature that does not check out, including undecodable ones.
pub async fn verify_attribute(
    wallet: &dyn BaseWallet,
    issuer_vk: &str,
    cred_id: &str,
    schema_id: &SchemaId,
    name: &str,
    values: &AttributeValues,
) -> VcxResult<bool> {
    let Ok(verkey) = Key::from_verkey_or_did_key(issuer_vk) else {
        return Ok(false);
    };
    let Ok(signature) = general_purpose::URL_SAFE.decode(values.signature.as_bytes()) else {
        return Ok(false);
    };
    let input = attribute_signature_input(cred_id, schema_id, name, &values.encoded);
    Ok(wallet
        .verify(&verkey, &input, &signature)
        .await
        .unwrap_or_else(|err| {
            warn!("Signature of attribute {name} cannot be checked: {err}");
            false
        }))
}
