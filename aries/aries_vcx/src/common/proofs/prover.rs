use std::collections::{BTreeMap, HashMap};

use anoncreds_types::data_types::{
    credential::Credential,
    pres_request::{PresentationRequestPayload, Restrictions},
    presentation::{
        CredentialProof, Presentation, RequestedProof, RevealedAttribute, SubProofReferent,
    },
};
use aries_vcx_ledger::ledger::base_ledger::AnoncredsLedgerRead;

use crate::{
    common::{credentials::encoding::numeric_value, ledger::resolve_rev_reg},
    errors::error::prelude::*,
    global::settings::LedgerRetryPolicy,
};

/// Referent to index of the credential chosen for it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SelectedCredentials {
    pub attributes: BTreeMap<String, usize>,
    pub predicates: BTreeMap<String, usize>,
}

fn satisfies_restrictions(restrictions: Option<&Restrictions>, credential: &Credential) -> bool {
    let Some(restrictions) = restrictions else {
        return true;
    };
    restrictions
        .schema_id
        .as_ref()
        .map_or(true, |schema_id| *schema_id == credential.schema_id)
        && restrictions
            .issuer_did
            .as_ref()
            .map_or(true, |issuer_did| *issuer_did == credential.issuer_did)
}

fn no_match(referent: &str, name: &str) -> AriesVcxError {
    AriesVcxError::from_msg(
        AriesVcxErrorKind::NoMatchingCredential,
        format!("No stored credential satisfies {referent} ({name})"),
    )
}

/// Picks, for each requested attribute and predicate, the first credential that matches
/// by restrictions and attribute name (and satisfies the predicate).
pub fn select_credentials(
    request: &PresentationRequestPayload,
    credentials: &[Credential],
) -> VcxResult<SelectedCredentials> {
    let mut selected = SelectedCredentials::default();

    for (referent, info) in &request.requested_attributes {
        let index = credentials
            .iter()
            .position(|cred| {
                cred.values.0.contains_key(&info.name)
                    && satisfies_restrictions(info.restrictions.as_ref(), cred)
            })
            .ok_or_else(|| no_match(referent, &info.name))?;
        selected.attributes.insert(referent.clone(), index);
    }

    for (referent, info) in &request.requested_predicates {
        let index = credentials
            .iter()
            .position(|cred| {
                satisfies_restrictions(info.restrictions.as_ref(), cred)
                    && cred
                        .values
                        .0
                        .get(&info.name)
                        .and_then(|values| numeric_value(&values.raw))
                        .is_some_and(|value| info.is_satisfied_by(value))
            })
            .ok_or_else(|| no_match(referent, &info.name))?;
        selected.predicates.insert(referent.clone(), index);
    }

    Ok(selected)
}

pub async fn build_presentation(
    ledger: &dyn AnoncredsLedgerRead,
    policy: &LedgerRetryPolicy,
    request: &PresentationRequestPayload,
    credentials: &[Credential],
) -> VcxResult<Presentation> {
    trace!(
        "build_presentation >>> request: {}, {} credentials available",
        request.name,
        credentials.len()
    );
    let selected = select_credentials(request, credentials)?;

    let mut sub_proofs: HashMap<usize, u32> = HashMap::new();
    let mut proofs: Vec<CredentialProof> = Vec::new();
    let mut requested_proof = RequestedProof::default();

    let mut sub_proof_index = |cred_index: usize, proofs: &mut Vec<CredentialProof>| {
        *sub_proofs.entry(cred_index).or_insert_with(|| {
            let cred = &credentials[cred_index];
            proofs.push(CredentialProof {
                cred_id: cred.cred_id.clone(),
                schema_id: cred.schema_id.clone(),
                issuer_did: cred.issuer_did.clone(),
                issuer_verkey: cred.issuer_verkey.clone(),
                rev_reg_id: cred.rev_reg_id.clone(),
                timestamp: None,
                attributes: BTreeMap::new(),
            });
            (proofs.len() - 1) as u32
        })
    };

    for (referent, cred_index) in &selected.attributes {
        let name = &request.requested_attributes[referent].name;
        let index = sub_proof_index(*cred_index, &mut proofs);
        let values = &credentials[*cred_index].values.0[name];
        proofs[index as usize]
            .attributes
            .insert(name.clone(), values.clone());
        requested_proof.revealed_attrs.insert(
            referent.clone(),
            RevealedAttribute {
                sub_proof_index: index,
                raw: values.raw.clone(),
                encoded: values.encoded.clone(),
            },
        );
    }

    for (referent, cred_index) in &selected.predicates {
        let name = &request.requested_predicates[referent].name;
        let index = sub_proof_index(*cred_index, &mut proofs);
        let values = &credentials[*cred_index].values.0[name];
        proofs[index as usize]
            .attributes
            .insert(name.clone(), values.clone());
        requested_proof.predicates.insert(
            referent.clone(),
            SubProofReferent {
                sub_proof_index: index,
            },
        );
    }

    if let Some(interval) = &request.non_revoked {
        for proof in proofs.iter_mut() {
            if let Some(rev_reg_id) = &proof.rev_reg_id {
                let state = resolve_rev_reg(ledger, policy, rev_reg_id, interval.to).await?;
                proof.timestamp = Some(state.timestamp);
            }
        }
    }

    Ok(Presentation {
        nonce: request.nonce.clone(),
        proofs,
        requested_proof,
    })
}

#[cfg(test)]
mod unit_tests {
    use anoncreds_types::data_types::{
        identifiers::{rev_reg_id::RevocationRegistryId, schema_id::SchemaId},
        ledger::rev_reg::RevocationRegistry,
        pres_request::{AttributeInfo, NonRevokedInterval, PredicateInfo, PredicateTypes},
    };
    use test_utils::{dev_wallet::DevWallet, in_memory_ledger::InMemoryLedger};

    use super::*;
    use crate::common::proofs::test_helpers::TestIssuer;

    const POLICY: LedgerRetryPolicy = LedgerRetryPolicy {
        max_retries: 0,
        backoff_ms: 1,
    };

    fn person_schema() -> SchemaId {
        SchemaId::new_unchecked("V4SGRU86Z58d6TV7PBUe6f:2:person:1.0")
    }

    fn employee_schema() -> SchemaId {
        SchemaId::new_unchecked("V4SGRU86Z58d6TV7PBUe6f:2:employee:1.0")
    }

    async fn wallet_with_credentials() -> (DevWallet, Vec<Credential>) {
        let wallet = DevWallet::new();
        let issuer = TestIssuer::create(&wallet).await;
        let person = issuer
            .issue(&wallet, "cred-1", &person_schema(), None, &[("name", "Alice"), ("age", "17")])
            .await;
        let employee = issuer
            .issue(&wallet, "cred-2", &employee_schema(), None, &[("name", "Alice"), ("age", "30")])
            .await;
        (wallet, vec![person, employee])
    }

    #[tokio::test]
    async fn test_selection_honors_restrictions_and_predicates() {
        let (_, credentials) = wallet_with_credentials().await;
        let request = PresentationRequestPayload::builder()
            .name("employment".to_owned())
            .requested_attributes(
                [(
                    "name_1".to_owned(),
                    AttributeInfo::new("name").restricted_to(employee_schema()),
                )]
                .into(),
            )
            .requested_predicates(
                [(
                    "age_1".to_owned(),
                    PredicateInfo::new("age", PredicateTypes::GE, 18),
                )]
                .into(),
            )
            .build();

        let selected = select_credentials(&request, &credentials).unwrap();
        assert_eq!(selected.attributes["name_1"], 1);
        assert_eq!(selected.predicates["age_1"], 1);
    }

    #[tokio::test]
    async fn test_no_matching_credential() {
        let (_, credentials) = wallet_with_credentials().await;
        let request = PresentationRequestPayload::builder()
            .name("adults".to_owned())
            .requested_predicates(
                [(
                    "age_1".to_owned(),
                    PredicateInfo::new("age", PredicateTypes::GT, 65),
                )]
                .into(),
            )
            .build();

        let err = select_credentials(&request, &credentials).unwrap_err();
        assert_eq!(err.kind(), AriesVcxErrorKind::NoMatchingCredential);
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[tokio::test]
    async fn test_presentation_shares_sub_proofs() {
        let (_, credentials) = wallet_with_credentials().await;
        let ledger = InMemoryLedger::new();
        let request = PresentationRequestPayload::builder()
            .name("employment".to_owned())
            .requested_attributes(
                [
                    (
                        "name_1".to_owned(),
                        AttributeInfo::new("name").restricted_to(employee_schema()),
                    ),
                    (
                        "age_1".to_owned(),
                        AttributeInfo::new("age").restricted_to(employee_schema()),
                    ),
                ]
                .into(),
            )
            .build();

        let presentation = build_presentation(&ledger, &POLICY, &request, &credentials)
            .await
            .unwrap();
        assert_eq!(presentation.nonce, request.nonce);
        assert_eq!(presentation.proofs.len(), 1);
        assert_eq!(presentation.proofs[0].attributes.len(), 2);
        assert_eq!(presentation.requested_proof.revealed_attrs["age_1"].raw, "30");
        assert_eq!(ledger.request_count(), 0);
    }

    #[tokio::test]
    async fn test_revocable_credential_gets_timestamp() {
        let wallet = DevWallet::new();
        let issuer = TestIssuer::create(&wallet).await;
        let rev_reg_id = RevocationRegistryId::new_unchecked("V4SGRU86Z58d6TV7PBUe6f:4:person");
        let credential = issuer
            .issue(&wallet, "cred-1", &person_schema(), Some(rev_reg_id.clone()), &[("name", "Alice")])
            .await;
        let ledger = InMemoryLedger::new();
        ledger.publish_rev_reg(RevocationRegistry::new(rev_reg_id, 1_000));

        let request = PresentationRequestPayload::builder()
            .name("current".to_owned())
            .requested_attributes([("name_1".to_owned(), AttributeInfo::new("name"))].into())
            .non_revoked(NonRevokedInterval::new(None, None))
            .build();
        let presentation = build_presentation(&ledger, &POLICY, &request, &[credential])
            .await
            .unwrap();
        assert_eq!(presentation.proofs[0].timestamp, Some(1_000));
    }
}
