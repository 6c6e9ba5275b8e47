pub mod invitation;
pub mod invitee;
pub mod inviter;
pub mod pairwise_info;

use messages::msg_fields::protocols::connection::{did_doc::AriesDidDoc, ConnectionData};
use url::Url;

use self::{
    invitation::{service_target, ServiceTarget},
    pairwise_info::PairwiseInfo,
};
use crate::errors::error::prelude::*;

/// The peer's side of an established pairwise relationship.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TheirPairwise {
    pub did: String,
    pub service: ServiceTarget,
}

impl TheirPairwise {
    pub fn verkey(&self) -> &str {
        &self.service.recipient_key
    }
}

/// Reads the peer's pairwise DID and service out of connection data it sent us. Anything
/// unusable is a key agreement failure.
pub(crate) fn their_pairwise(connection: &ConnectionData) -> VcxResult<TheirPairwise> {
    let key_agreement_failed = |msg: String| {
        AriesVcxError::from_msg(
            AriesVcxErrorKind::KeyAgreementFailed,
            format!("Peer connection data of {} unusable: {msg}", connection.did),
        )
    };
    connection
        .did_doc
        .validate()
        .map_err(|err| key_agreement_failed(err.to_string()))?;
    let recipient_keys = connection
        .did_doc
        .recipient_keys()
        .map_err(|err| key_agreement_failed(err.to_string()))?;
    let endpoint = connection
        .did_doc
        .service_endpoint()
        .ok_or_else(|| key_agreement_failed("no service".to_owned()))?;
    let service = service_target(&recipient_keys, &connection.did_doc.routing_keys(), endpoint)
        .map_err(|err| key_agreement_failed(err.msg().to_owned()))?;
    Ok(TheirPairwise {
        did: connection.did.clone(),
        service,
    })
}

/// Connection data we disclose: our pairwise DID, key and service.
pub(crate) fn my_connection_data(
    pairwise_info: &PairwiseInfo,
    service_endpoint: &Url,
    routing_keys: Vec<String>,
) -> ConnectionData {
    let did_doc = AriesDidDoc::new(
        pairwise_info.pw_did.clone(),
        service_endpoint.to_string(),
        vec![pairwise_info.pw_vk.clone()],
        routing_keys,
    );
    ConnectionData::new(pairwise_info.pw_did.clone(), did_doc)
}

/// Snapshot of a connection for callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionInfo {
    pub thread_id: String,
    pub state: String,
    pub my_did: String,
    pub my_vk: String,
    pub their: Option<TheirPairwise>,
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    const VERKEY: &str = "8HH5gYEeNc3z7PYXmd54d4x6qAfCNrqQqEB3nS7Zfu7K";

    #[test]
    fn test_their_pairwise_from_connection_data() {
        let pairwise_info = PairwiseInfo {
            pw_did: "V4SGRU86Z58d6TV7PBUe6f".to_owned(),
            pw_vk: VERKEY.to_owned(),
        };
        let endpoint = Url::parse("http://alice.example.org:8080").unwrap();
        let data = my_connection_data(&pairwise_info, &endpoint, vec![]);

        let their = their_pairwise(&data).unwrap();
        assert_eq!(their.did, pairwise_info.pw_did);
        assert_eq!(their.verkey(), VERKEY);
        assert_eq!(their.service.service_endpoint, endpoint);
    }

    #[test]
    fn test_unusable_did_doc_is_key_agreement_failure() {
        let pairwise_info = PairwiseInfo {
            pw_did: "V4SGRU86Z58d6TV7PBUe6f".to_owned(),
            pw_vk: "not-a-key".to_owned(),
        };
        let endpoint = Url::parse("http://alice.example.org:8080").unwrap();
        let data = my_connection_data(&pairwise_info, &endpoint, vec![]);

        let err = their_pairwise(&data).unwrap_err();
        assert_eq!(err.kind(), AriesVcxErrorKind::KeyAgreementFailed);
    }
}
