use std::error::Error;

use aries_vcx::{
    errors::error::AriesVcxErrorKind,
    handlers::correlation::{InboundOutcome, ProtocolKind},
};
use messages::{
    msg_fields::protocols::discover_features::ProtocolDescriptor,
    msg_types::{MessageKind, Protocol},
};

use crate::utils::{scenarios::create_connection, test_agent::create_test_agents};

pub mod utils;

#[tokio::test]
async fn test_feature_query_is_disclosed() -> Result<(), Box<dyn Error>> {
    let (faber, alice) = create_test_agents();
    let (faber_connection, alice_connection) = create_connection(&faber, &alice).await;

    let query_thread = alice
        .engine
        .send_discovery_features(
            &alice_connection,
            Some("https://didcomm.org/trust_ping/*".to_owned()),
            Some("do you ping?".to_owned()),
        )
        .await?;
    let status = alice.engine.thread_status(&query_thread).await?;
    assert_eq!(status.protocol, ProtocolKind::DiscoverFeatures);
    assert_eq!(status.state, "QuerySent");
    assert_eq!(status.pending, vec![MessageKind::FeatureDisclose]);

    let outcomes = alice.deliver_to(&faber).await;
    assert_eq!(
        outcomes.into_iter().next().unwrap()?,
        InboundOutcome::Applied {
            thread_id: faber_connection.clone(),
            state: "Completed".to_owned()
        }
    );
    let outcomes = faber.deliver_to(&alice).await;
    assert_eq!(
        outcomes.into_iter().next().unwrap()?,
        InboundOutcome::Applied {
            thread_id: query_thread.clone(),
            state: "Disclosed".to_owned()
        }
    );

    assert_eq!(
        alice.engine.disclosed_protocols(&query_thread).await?,
        vec![ProtocolDescriptor::from(Protocol::TrustPing)]
    );
    assert!(alice.engine.thread_status(&query_thread).await?.pending.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_open_query_discloses_every_protocol() -> Result<(), Box<dyn Error>> {
    let (faber, alice) = create_test_agents();
    let (faber_connection, _) = create_connection(&faber, &alice).await;

    let query_thread = faber
        .engine
        .send_discovery_features(&faber_connection, None, None)
        .await?;
    for outcome in faber.deliver_to(&alice).await {
        outcome?;
    }
    for outcome in alice.deliver_to(&faber).await {
        outcome?;
    }

    let protocols = faber.engine.disclosed_protocols(&query_thread).await?;
    assert!(protocols.contains(&ProtocolDescriptor::from(Protocol::Connections)));
    assert!(protocols.contains(&ProtocolDescriptor::from(Protocol::BasicMessage)));
    let err = faber
        .engine
        .disclosed_protocols(&faber_connection)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), AriesVcxErrorKind::InvalidInput);
    Ok(())
}

#[tokio::test]
async fn test_basic_message_is_kept_once_per_connection() -> Result<(), Box<dyn Error>> {
    let (faber, alice) = create_test_agents();
    let (faber_connection, alice_connection) = create_connection(&faber, &alice).await;

    let message_id = alice
        .engine
        .send_generic_message(&alice_connection, "hello faber")
        .await?;
    let packets = alice.transport.take();
    assert_eq!(packets.len(), 1);

    assert_eq!(
        faber.engine.receive_packed(&packets[0]).await?,
        InboundOutcome::Applied {
            thread_id: faber_connection.clone(),
            state: "Completed".to_owned()
        }
    );
    assert_eq!(
        faber.engine.receive_packed(&packets[0]).await?,
        InboundOutcome::Replayed {
            thread_id: faber_connection.clone(),
            resent: false
        }
    );

    let received = faber.engine.received_messages(&faber_connection)?;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].message_id, message_id);
    assert_eq!(received[0].content, "hello faber");
    assert!(alice.engine.received_messages(&alice_connection)?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_connection_must_be_established() -> Result<(), Box<dyn Error>> {
    let (faber, _) = create_test_agents();
    let (faber_connection, _) = faber.engine.create_invitation().await?;

    let err = faber
        .engine
        .send_discovery_features(&faber_connection, None, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), AriesVcxErrorKind::WrongState);
    let err = faber
        .engine
        .send_generic_message(&faber_connection, "too early")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), AriesVcxErrorKind::WrongState);
    assert_eq!(faber.transport.sent_count(), 0);
    Ok(())
}
