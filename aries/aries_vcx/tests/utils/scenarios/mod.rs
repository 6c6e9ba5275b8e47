use anoncreds_types::data_types::{
    identifiers::schema_id::SchemaId,
    ledger::schema::Schema,
    pres_request::{AttributeInfo, PredicateInfo, PredicateTypes, PresentationRequestPayload},
};
use aries_vcx::{
    handlers::correlation::InboundOutcome,
    protocols::{connection::invitation::AnyInvitation, issuance::issuer::OfferInfo},
};
use messages::msg_fields::protocols::cred_issuance::common::CredentialAttr;
use test_utils::constants::ISSUER_DID;

use crate::utils::test_agent::TestAgent;

/// Runs the connection protocol to completion. Returns the connection ids of faber and alice.
pub async fn create_connection(faber: &TestAgent, alice: &TestAgent) -> (String, String) {
    let (faber_connection, invitation) = faber.engine.create_invitation().await.unwrap();
    let alice_connection = alice
        .engine
        .accept_invitation(AnyInvitation::Con(invitation))
        .await
        .unwrap();

    for outcome in alice.deliver_to(faber).await {
        outcome.unwrap();
    }
    for outcome in faber.deliver_to(alice).await {
        outcome.unwrap();
    }
    for outcome in alice.deliver_to(faber).await {
        outcome.unwrap();
    }
    (faber_connection, alice_connection)
}

pub fn publish_person_schema(faber: &TestAgent) -> Schema {
    faber
        .ledger
        .create_schema(ISSUER_DID, "person", &["name", "age"])
}

pub fn person_offer(schema_id: &SchemaId, name: &str, age: u32) -> OfferInfo {
    OfferInfo {
        schema_id: schema_id.clone(),
        attributes: vec![
            CredentialAttr::new("name", name),
            CredentialAttr::new("age", age.to_string()),
        ],
        rev_reg_id: None,
        comment: Some("person credential".to_owned()),
    }
}

/// Offer, request, issue and ack over an established connection. Returns the thread id
/// on the faber side and on the alice side, which are the same.
pub async fn issue_credential(
    faber: &TestAgent,
    alice: &TestAgent,
    faber_connection: &str,
    offer: OfferInfo,
) -> String {
    let thread_id = faber
        .engine
        .offer_credential(faber_connection, offer)
        .await
        .unwrap();

    let outcomes = faber.deliver_to(alice).await;
    assert_eq!(
        outcomes.into_iter().map(Result::unwrap).collect::<Vec<_>>(),
        vec![InboundOutcome::Opened {
            thread_id: thread_id.clone()
        }]
    );
    alice.engine.request_credential(&thread_id).await.unwrap();
    for outcome in alice.deliver_to(faber).await {
        outcome.unwrap();
    }
    for outcome in faber.deliver_to(alice).await {
        outcome.unwrap();
    }
    for outcome in alice.deliver_to(faber).await {
        outcome.unwrap();
    }
    thread_id
}

pub fn adult_name_request(schema_id: &SchemaId) -> PresentationRequestPayload {
    PresentationRequestPayload::builder()
        .name("adult check".to_owned())
        .requested_attributes(
            [(
                "name_ref".to_owned(),
                AttributeInfo::new("name").restricted_to(schema_id.clone()),
            )]
            .into(),
        )
        .requested_predicates(
            [(
                "age_ref".to_owned(),
                PredicateInfo::new("age", PredicateTypes::GE, 18).restricted_to(schema_id.clone()),
            )]
            .into(),
        )
        .build()
}
