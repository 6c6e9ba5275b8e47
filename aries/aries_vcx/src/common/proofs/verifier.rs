use std::{collections::HashMap, fmt};

use anoncreds_types::data_types::{
    identifiers::schema_id::SchemaId,
    ledger::schema::Schema,
    pres_request::{PresentationRequestPayload, Restrictions},
    presentation::{CredentialProof, Presentation},
};
use aries_vcx_ledger::ledger::base_ledger::AnoncredsLedgerRead;
use aries_vcx_wallet::wallet::base_wallet::BaseWallet;

use crate::{
    common::{
        credentials::encoding::{encoding_matches, numeric_value},
        ledger::{resolve_rev_reg, resolve_schema},
        signing::verify_attribute,
    },
    errors::error::prelude::*,
    global::settings::LedgerRetryPolicy,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    SchemaMismatch,
    MissingAttribute,
    NonceMismatch,
    InvalidSignature,
    EncodingMismatch,
    PredicateNotSatisfied,
    RevocationStateStale,
    CredentialRevoked,
    /// The prover declined, or the peer reported a problem.
    Declined,
}

impl RejectionReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::SchemaMismatch => "schema_mismatch",
            Self::MissingAttribute => "missing_attribute",
            Self::NonceMismatch => "nonce_mismatch",
            Self::InvalidSignature => "invalid_signature",
            Self::EncodingMismatch => "encoding_mismatch",
            Self::PredicateNotSatisfied => "predicate_not_satisfied",
            Self::RevocationStateStale => "revocation_state_stale",
            Self::CredentialRevoked => "credential_revoked",
            Self::Declined => "declined",
        }
    }

    /// Unknown codes read as `Declined`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "schema_mismatch" => Self::SchemaMismatch,
            "missing_attribute" => Self::MissingAttribute,
            "nonce_mismatch" => Self::NonceMismatch,
            "invalid_signature" => Self::InvalidSignature,
            "encoding_mismatch" => Self::EncodingMismatch,
            "predicate_not_satisfied" => Self::PredicateNotSatisfied,
            "revocation_state_stale" => Self::RevocationStateStale,
            "credential_revoked" => Self::CredentialRevoked,
            _ => Self::Declined,
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationResult {
    Verified,
    Rejected {
        reason: RejectionReason,
        detail: String,
    },
}

impl VerificationResult {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }

    pub fn reason(&self) -> Option<RejectionReason> {
        match self {
            Self::Verified => None,
            Self::Rejected { reason, .. } => Some(*reason),
        }
    }
}

fn reject(reason: RejectionReason, detail: impl Into<String>) -> VerificationResult {
    let detail = detail.into();
    info!("Presentation rejected ({reason}): {detail}");
    VerificationResult::Rejected { reason, detail }
}

/// One requested attribute or predicate, flattened.
struct RequestedItem<'a> {
    referent: &'a str,
    name: &'a str,
    restrictions: Option<&'a Restrictions>,
    sub_proof_index: Option<u32>,
}

fn requested_items<'a>(
    request: &'a PresentationRequestPayload,
    presentation: &'a Presentation,
) -> Vec<RequestedItem<'a>> {
    let mut items: Vec<RequestedItem<'a>> = request
        .requested_attributes
        .iter()
        .map(|(referent, info)| RequestedItem {
            referent,
            name: &info.name,
            restrictions: info.restrictions.as_ref(),
            sub_proof_index: presentation
                .requested_proof
                .revealed_attrs
                .get(referent)
                .map(|attr| attr.sub_proof_index),
        })
        .chain(
            request
                .requested_predicates
                .iter()
                .map(|(referent, info)| RequestedItem {
                    referent,
                    name: &info.name,
                    restrictions: info.restrictions.as_ref(),
                    sub_proof_index: presentation
                        .requested_proof
                        .predicates
                        .get(referent)
                        .map(|pred| pred.sub_proof_index),
                }),
        )
        .collect();
    items.sort_by(|a, b| a.referent.cmp(b.referent));
    items
}

fn proof_for<'a>(presentation: &'a Presentation, item: &RequestedItem) -> Option<&'a CredentialProof> {
    item.sub_proof_index
        .and_then(|index| presentation.proofs.get(index as usize))
}

async fn check_schemas(
    ledger: &dyn AnoncredsLedgerRead,
    policy: &LedgerRetryPolicy,
    presentation: &Presentation,
    items: &[RequestedItem<'_>],
) -> VcxResult<Option<VerificationResult>> {
    let mut schemas: HashMap<SchemaId, Option<Schema>> = HashMap::new();
    for item in items {
        let schema_id = item
            .restrictions
            .and_then(|restrictions| restrictions.schema_id.as_ref())
            .or_else(|| proof_for(presentation, item).map(|proof| &proof.schema_id));
        let Some(schema_id) = schema_id else {
            continue;
        };
        if !schemas.contains_key(schema_id) {
            let schema = match resolve_schema(ledger, policy, schema_id).await {
                Ok(schema) => Some(schema),
                Err(err) if err.kind() == AriesVcxErrorKind::LedgerItemNotFound => None,
                Err(err) => return Err(err),
            };
            schemas.insert(schema_id.clone(), schema);
        }
        match schemas.get(schema_id) {
            Some(Some(schema)) if schema.has_attribute(item.name) => {}
            Some(Some(_)) => {
                return Ok(Some(reject(
                    RejectionReason::SchemaMismatch,
                    format!(
                        "{} requests attribute {} which schema {} does not define",
                        item.referent, item.name, schema_id
                    ),
                )))
            }
            _ => {
                return Ok(Some(reject(
                    RejectionReason::SchemaMismatch,
                    format!("Schema {schema_id} is not published"),
                )))
            }
        }
    }
    Ok(None)
}

fn check_presence(
    request: &PresentationRequestPayload,
    presentation: &Presentation,
    items: &[RequestedItem<'_>],
) -> Option<VerificationResult> {
    for item in items {
        let Some(proof) = proof_for(presentation, item) else {
            return Some(reject(
                RejectionReason::MissingAttribute,
                format!("{} ({}) is not presented", item.referent, item.name),
            ));
        };
        let Some(values) = proof.attributes.get(item.name) else {
            return Some(reject(
                RejectionReason::MissingAttribute,
                format!("Sub proof of {} lacks attribute {}", item.referent, item.name),
            ));
        };
        if let Some(restrictions) = item.restrictions {
            let schema_ok = restrictions
                .schema_id
                .as_ref()
                .map_or(true, |id| *id == proof.schema_id);
            let issuer_ok = restrictions
                .issuer_did
                .as_ref()
                .map_or(true, |did| *did == proof.issuer_did);
            if !(schema_ok && issuer_ok) {
                return Some(reject(
                    RejectionReason::MissingAttribute,
                    format!("{} is presented from a credential outside its restrictions", item.referent),
                ));
            }
        }
        if let Some(revealed) = presentation.requested_proof.revealed_attrs.get(item.referent) {
            if request.requested_attributes.contains_key(item.referent)
                && (revealed.raw != values.raw || revealed.encoded != values.encoded)
            {
                return Some(reject(
                    RejectionReason::InvalidSignature,
                    format!("Revealed value of {} differs from the signed one", item.referent),
                ));
            }
        }
    }
    None
}

/// Checks a presentation against its request. Ledger failures are errors; every other
/// finding is a `Rejected` result with the first failing check as reason.
pub async fn verify_presentation(
    wallet: &dyn BaseWallet,
    ledger: &dyn AnoncredsLedgerRead,
    policy: &LedgerRetryPolicy,
    request: &PresentationRequestPayload,
    presentation: &Presentation,
) -> VcxResult<VerificationResult> {
    trace!(
        "verify_presentation >>> request: {}, {} sub proofs",
        request.name,
        presentation.proofs.len()
    );
    let items = requested_items(request, presentation);

    if let Some(rejection) = check_schemas(ledger, policy, presentation, &items).await? {
        return Ok(rejection);
    }
    if let Some(rejection) = check_presence(request, presentation, &items) {
        return Ok(rejection);
    }
    if presentation.nonce != request.nonce {
        return Ok(reject(
            RejectionReason::NonceMismatch,
            "Presentation was built for another request",
        ));
    }

    for proof in &presentation.proofs {
        for (name, values) in &proof.attributes {
            let valid = verify_attribute(
                wallet,
                &proof.issuer_verkey,
                &proof.cred_id,
                &proof.schema_id,
                name,
                values,
            )
            .await?;
            if !valid {
                return Ok(reject(
                    RejectionReason::InvalidSignature,
                    format!("Issuer signature over {name} of {} does not verify", proof.cred_id),
                ));
            }
        }
    }

    for proof in &presentation.proofs {
        for (name, values) in &proof.attributes {
            if !encoding_matches(wallet, &values.raw, &values.encoded).await? {
                return Ok(reject(
                    RejectionReason::EncodingMismatch,
                    format!("Encoding of {name} in {} is not reproducible", proof.cred_id),
                ));
            }
        }
    }

    for (referent, info) in &request.requested_predicates {
        let raw = presentation
            .requested_proof
            .predicates
            .get(referent)
            .and_then(|pred| presentation.proofs.get(pred.sub_proof_index as usize))
            .and_then(|proof| proof.attributes.get(&info.name))
            .map(|values| values.raw.as_str());
        let satisfied = raw
            .and_then(numeric_value)
            .is_some_and(|value| info.is_satisfied_by(value));
        if !satisfied {
            return Ok(reject(
                RejectionReason::PredicateNotSatisfied,
                format!("{referent}: {} {} {} does not hold", info.name, info.p_type, info.p_value),
            ));
        }
    }

    let interval = request.non_revoked.as_ref();
    for proof in &presentation.proofs {
        let Some(rev_reg_id) = &proof.rev_reg_id else {
            continue;
        };
        // without an interval only proofs asserting a registry state are checked
        if interval.is_none() && proof.timestamp.is_none() {
            continue;
        }
        let to = interval.and_then(|interval| interval.to);
        let current = resolve_rev_reg(ledger, policy, rev_reg_id, to).await?;
        if interval.is_some() && proof.timestamp != Some(current.timestamp) {
            return Ok(reject(
                RejectionReason::RevocationStateStale,
                format!(
                    "{} asserts registry state {:?}, ledger has {}",
                    proof.cred_id, proof.timestamp, current.timestamp
                ),
            ));
        }
        if current.is_revoked(&proof.cred_id) {
            return Ok(reject(
                RejectionReason::CredentialRevoked,
                format!("{} is revoked in {}", proof.cred_id, rev_reg_id),
            ));
        }
    }

    Ok(VerificationResult::Verified)
}

#[cfg(test)]
mod unit_tests {
    use anoncreds_types::data_types::{
        identifiers::rev_reg_id::RevocationRegistryId,
        ledger::rev_reg::RevocationRegistry,
        nonce::Nonce,
        pres_request::{AttributeInfo, NonRevokedInterval, PredicateInfo, PredicateTypes},
    };
    use test_utils::{
        constants::ISSUER_DID, dev_wallet::DevWallet, in_memory_ledger::InMemoryLedger,
    };

    use super::*;
    use crate::common::{
        proofs::{prover::build_presentation, test_helpers::TestIssuer},
        signing::sign_attribute,
    };

    const POLICY: LedgerRetryPolicy = LedgerRetryPolicy {
        max_retries: 0,
        backoff_ms: 1,
    };

    struct Fixture {
        wallet: DevWallet,
        ledger: InMemoryLedger,
        issuer: TestIssuer,
        schema_id: SchemaId,
    }

    async fn fixture() -> Fixture {
        let wallet = DevWallet::new();
        let ledger = InMemoryLedger::new();
        let issuer = TestIssuer::create(&wallet).await;
        let schema = ledger.create_schema(ISSUER_DID, "person", &["name", "age"]);
        Fixture {
            wallet,
            ledger,
            issuer,
            schema_id: schema.id,
        }
    }

    fn age_request(schema_id: &SchemaId) -> PresentationRequestPayload {
        PresentationRequestPayload::builder()
            .name("adult".to_owned())
            .requested_attributes(
                [("name_1".to_owned(), AttributeInfo::new("name").restricted_to(schema_id.clone()))]
                    .into(),
            )
            .requested_predicates(
                [(
                    "age_1".to_owned(),
                    PredicateInfo::new("age", PredicateTypes::GE, 18).restricted_to(schema_id.clone()),
                )]
                .into(),
            )
            .build()
    }

    async fn verify(f: &Fixture, request: &PresentationRequestPayload, presentation: &Presentation) -> VerificationResult {
        verify_presentation(&f.wallet, &f.ledger, &POLICY, request, presentation)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_presentation_is_verified() {
        let f = fixture().await;
        let credential = f
            .issuer
            .issue(&f.wallet, "cred-1", &f.schema_id, None, &[("name", "Alice"), ("age", "30")])
            .await;
        let request = age_request(&f.schema_id);
        let presentation = build_presentation(&f.ledger, &POLICY, &request, &[credential])
            .await
            .unwrap();

        assert_eq!(verify(&f, &request, &presentation).await, VerificationResult::Verified);
    }

    #[tokio::test]
    async fn test_attribute_outside_schema_is_schema_mismatch() {
        let f = fixture().await;
        let ledger_schema = f.ledger.create_schema(ISSUER_DID, "nameonly", &["name"]);
        let credential = f
            .issuer
            .issue(&f.wallet, "cred-1", &ledger_schema.id, None, &[("name", "Alice"), ("age", "30")])
            .await;
        let request = age_request(&ledger_schema.id);
        let presentation = build_presentation(&f.ledger, &POLICY, &request, &[credential])
            .await
            .unwrap();

        let result = verify(&f, &request, &presentation).await;
        assert_eq!(result.reason(), Some(RejectionReason::SchemaMismatch));
    }

    #[tokio::test]
    async fn test_missing_and_foreign_presentations_are_rejected() {
        let f = fixture().await;
        let credential = f
            .issuer
            .issue(&f.wallet, "cred-1", &f.schema_id, None, &[("name", "Alice"), ("age", "30")])
            .await;
        let request = age_request(&f.schema_id);
        let mut presentation = build_presentation(&f.ledger, &POLICY, &request, &[credential])
            .await
            .unwrap();

        let mut without_predicate = presentation.clone();
        without_predicate.requested_proof.predicates.clear();
        assert_eq!(
            verify(&f, &request, &without_predicate).await.reason(),
            Some(RejectionReason::MissingAttribute)
        );

        presentation.nonce = Nonce::new();
        assert_eq!(
            verify(&f, &request, &presentation).await.reason(),
            Some(RejectionReason::NonceMismatch)
        );
    }

    #[tokio::test]
    async fn test_tampered_value_fails_signature() {
        let f = fixture().await;
        let credential = f
            .issuer
            .issue(&f.wallet, "cred-1", &f.schema_id, None, &[("name", "Alice"), ("age", "17")])
            .await;
        let request = age_request(&f.schema_id);
        let mut lying = credential.clone();
        let age = lying.values.0.get_mut("age").unwrap();
        age.raw = "30".to_owned();
        age.encoded = "30".to_owned();

        let presentation = build_presentation(&f.ledger, &POLICY, &request, &[lying])
            .await
            .unwrap();
        assert_eq!(
            verify(&f, &request, &presentation).await.reason(),
            Some(RejectionReason::InvalidSignature)
        );
    }

    #[tokio::test]
    async fn test_foreign_encoding_is_rejected() {
        let f = fixture().await;
        let mut credential = f
            .issuer
            .issue(&f.wallet, "cred-1", &f.schema_id, None, &[("name", "Alice"), ("age", "30")])
            .await;
        // signed by the issuer, but not the canonical encoding of "Alice"
        let name = credential.values.0.get_mut("name").unwrap();
        name.encoded = "1139481716457488690172217916278103335".to_owned();
        name.signature = sign_attribute(
            &f.wallet,
            &f.issuer.verkey,
            "cred-1",
            &f.schema_id,
            "name",
            &name.encoded,
        )
        .await
        .unwrap();

        let request = age_request(&f.schema_id);
        let presentation = build_presentation(&f.ledger, &POLICY, &request, &[credential])
            .await
            .unwrap();
        assert_eq!(
            verify(&f, &request, &presentation).await.reason(),
            Some(RejectionReason::EncodingMismatch)
        );
    }

    #[tokio::test]
    async fn test_unsatisfied_predicate() {
        let f = fixture().await;
        let credential = f
            .issuer
            .issue(&f.wallet, "cred-1", &f.schema_id, None, &[("name", "Alice"), ("age", "30")])
            .await;
        let request = age_request(&f.schema_id);
        let presentation = build_presentation(&f.ledger, &POLICY, &request, &[credential])
            .await
            .unwrap();

        let mut stricter = request.clone();
        stricter
            .requested_predicates
            .get_mut("age_1")
            .unwrap()
            .p_value = 40;
        assert_eq!(
            verify(&f, &stricter, &presentation).await.reason(),
            Some(RejectionReason::PredicateNotSatisfied)
        );
    }

    #[tokio::test]
    async fn test_revocation_checks() {
        let f = fixture().await;
        let rev_reg_id = RevocationRegistryId::new_unchecked("V4SGRU86Z58d6TV7PBUe6f:4:person");
        f.ledger
            .publish_rev_reg(RevocationRegistry::new(rev_reg_id.clone(), 100));
        let credential = f
            .issuer
            .issue(
                &f.wallet,
                "cred-1",
                &f.schema_id,
                Some(rev_reg_id.clone()),
                &[("name", "Alice"), ("age", "30")],
            )
            .await;
        let mut request = age_request(&f.schema_id);
        request.non_revoked = Some(NonRevokedInterval::new(None, None));

        let presentation = build_presentation(&f.ledger, &POLICY, &request, &[credential])
            .await
            .unwrap();
        assert!(verify(&f, &request, &presentation).await.is_verified());

        f.ledger.revoke(&rev_reg_id, "cred-2", 200);
        assert_eq!(
            verify(&f, &request, &presentation).await.reason(),
            Some(RejectionReason::RevocationStateStale)
        );

        f.ledger.revoke(&rev_reg_id, "cred-1", 300);
        let mut refreshed = presentation.clone();
        refreshed.proofs[0].timestamp = Some(300);
        assert_eq!(
            verify(&f, &request, &refreshed).await.reason(),
            Some(RejectionReason::CredentialRevoked)
        );
    }

    #[tokio::test]
    async fn test_asserted_registry_state_is_checked_without_interval() {
        let f = fixture().await;
        let rev_reg_id = RevocationRegistryId::new_unchecked("V4SGRU86Z58d6TV7PBUe6f:4:person");
        f.ledger
            .publish_rev_reg(RevocationRegistry::new(rev_reg_id.clone(), 100));
        let credential = f
            .issuer
            .issue(
                &f.wallet,
                "cred-1",
                &f.schema_id,
                Some(rev_reg_id.clone()),
                &[("name", "Alice"), ("age", "30")],
            )
            .await;
        let request = age_request(&f.schema_id);
        assert!(request.non_revoked.is_none());

        let mut presentation = build_presentation(&f.ledger, &POLICY, &request, &[credential])
            .await
            .unwrap();
        presentation.proofs[0].timestamp = Some(100);
        assert!(verify(&f, &request, &presentation).await.is_verified());

        f.ledger.revoke(&rev_reg_id, "cred-1", 300);
        assert_eq!(
            verify(&f, &request, &presentation).await.reason(),
            Some(RejectionReason::CredentialRevoked)
        );
    }

    #[test]
    fn test_reason_codes_round_trip() {
        for reason in [
            RejectionReason::SchemaMismatch,
            RejectionReason::EncodingMismatch,
            RejectionReason::CredentialRevoked,
        ] {
            assert_eq!(RejectionReason::from_code(reason.code()), reason);
        }
        assert_eq!(RejectionReason::from_code("whatever"), RejectionReason::Declined);
    }
}
