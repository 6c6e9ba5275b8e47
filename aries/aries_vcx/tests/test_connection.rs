use std::error::Error;

use aries_vcx::{
    aries_vcx_wallet::wallet::base_wallet::did_wallet::DidWallet,
    errors::error::{AriesVcxErrorKind, ErrorCategory},
    handlers::correlation::{InboundOutcome, ProtocolKind},
    protocols::connection::invitation::AnyInvitation,
};
use chrono::{Duration, Utc};
use messages::msg_types::MessageKind;

use crate::utils::{
    scenarios::create_connection,
    test_agent::{create_test_agents, create_test_agents_with_timeout},
};

pub mod utils;

#[tokio::test]
async fn test_connection_completes_on_both_sides() -> Result<(), Box<dyn Error>> {
    let (faber, alice) = create_test_agents();
    let (faber_connection, alice_connection) = create_connection(&faber, &alice).await;

    let faber_info = faber.engine.connection_info(&faber_connection).await?;
    let alice_info = alice.engine.connection_info(&alice_connection).await?;
    assert_eq!(faber_info.state, "Completed");
    assert_eq!(alice_info.state, "Completed");
    assert_eq!(faber_info.thread_id, alice_info.thread_id);
    assert_eq!(faber_info.their.unwrap().verkey(), alice_info.my_vk);
    assert_eq!(alice_info.their.unwrap().verkey(), faber_info.my_vk);

    let status = faber.engine.thread_status(&faber_connection).await?;
    assert_eq!(status.protocol, ProtocolKind::Connection);
    assert_eq!(status.role, "inviter");
    assert!(status.pending.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_request_is_answered_and_ack_is_expected() -> Result<(), Box<dyn Error>> {
    let (faber, alice) = create_test_agents();
    let (faber_connection, invitation) = faber.engine.create_invitation().await?;
    alice
        .engine
        .accept_invitation(AnyInvitation::Con(invitation))
        .await?;

    let outcomes = alice.deliver_to(&faber).await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(
        outcomes.into_iter().next().unwrap()?,
        InboundOutcome::Applied {
            thread_id: faber_connection.clone(),
            state: "Responded".to_owned()
        }
    );
    let status = faber.engine.thread_status(&faber_connection).await?;
    assert_eq!(status.pending, vec![MessageKind::Ack]);
    assert_eq!(
        faber.transport.endpoints(),
        vec!["http://alice.example.org:8080/didcomm".parse()?]
    );
    Ok(())
}

#[tokio::test]
async fn test_duplicate_ack_is_idempotent() -> Result<(), Box<dyn Error>> {
    let (faber, alice) = create_test_agents();
    let (faber_connection, invitation) = faber.engine.create_invitation().await?;
    alice
        .engine
        .accept_invitation(AnyInvitation::Con(invitation))
        .await?;
    alice.deliver_to(&faber).await;
    faber.deliver_to(&alice).await;

    let ack = alice.transport.take();
    assert_eq!(ack.len(), 1);
    let first = faber.engine.receive_packed(&ack[0]).await?;
    let second = faber.engine.receive_packed(&ack[0]).await?;
    assert_eq!(
        first,
        InboundOutcome::Applied {
            thread_id: faber_connection.clone(),
            state: "Completed".to_owned()
        }
    );
    assert_eq!(
        second,
        InboundOutcome::Replayed {
            thread_id: faber_connection.clone(),
            resent: false
        }
    );
    let status = faber.engine.thread_status(&faber_connection).await?;
    assert_eq!(status.state, "Completed");
    assert!(status.last_error.is_none());
    Ok(())
}

#[tokio::test]
async fn test_request_from_second_invitee_is_refused_without_new_keys(
) -> Result<(), Box<dyn Error>> {
    let (faber, alice) = create_test_agents();
    let (_, carol) = create_test_agents();
    let (faber_connection, invitation) = faber.engine.create_invitation().await?;
    alice
        .engine
        .accept_invitation(AnyInvitation::Con(invitation.clone()))
        .await?;
    carol
        .engine
        .accept_invitation(AnyInvitation::Con(invitation))
        .await?;
    alice.deliver_to(&faber).await;
    let keys = faber.wallet.key_count().await?;

    let outcomes = carol.deliver_to(&faber).await;
    let err = outcomes.into_iter().next().unwrap().unwrap_err();
    assert_eq!(err.kind(), AriesVcxErrorKind::UnexpectedMessage);
    assert_eq!(faber.wallet.key_count().await?, keys);

    let status = faber.engine.thread_status(&faber_connection).await?;
    assert_eq!(status.state, "Responded");
    assert_eq!(status.last_error.unwrap().category, ErrorCategory::State);
    Ok(())
}

#[tokio::test]
async fn test_repeated_request_resends_response() -> Result<(), Box<dyn Error>> {
    let (faber, alice) = create_test_agents();
    let (faber_connection, invitation) = faber.engine.create_invitation().await?;
    alice
        .engine
        .accept_invitation(AnyInvitation::Con(invitation))
        .await?;
    let request = alice.transport.take();

    faber.engine.receive_packed(&request[0]).await?;
    let replay = faber.engine.receive_packed(&request[0]).await?;
    assert_eq!(
        replay,
        InboundOutcome::Replayed {
            thread_id: faber_connection,
            resent: true
        }
    );
    assert_eq!(faber.transport.sent_count(), 2);

    let outcomes = faber.deliver_to(&alice).await;
    assert!(outcomes[0].is_ok());
    assert!(matches!(
        outcomes[1].as_ref().unwrap(),
        InboundOutcome::Replayed { .. }
    ));
    Ok(())
}

#[tokio::test]
async fn test_unanswered_request_is_sent_three_times() -> Result<(), Box<dyn Error>> {
    let (faber, alice) = create_test_agents_with_timeout(500);
    let (_, invitation) = faber.engine.create_invitation().await?;
    let alice_connection = alice
        .engine
        .accept_invitation(AnyInvitation::Con(invitation))
        .await?;

    let mut now = Utc::now();
    for _ in 0..3 {
        now += Duration::milliseconds(501);
        alice.engine.check_timeouts(now).await?;
    }
    assert_eq!(alice.transport.sent_count(), 3);

    let status = alice.engine.thread_status(&alice_connection).await?;
    assert!(status.is_abandoned());
    let error = status.last_error.unwrap();
    assert_eq!(error.kind, AriesVcxErrorKind::ExchangeTimedOut);
    assert_eq!(error.category, ErrorCategory::Timeout);

    // a late response finds the thread abandoned
    for packet in alice.transport.take().iter().take(1) {
        faber.engine.receive_packed(packet).await?;
    }
    let err = faber
        .deliver_to(&alice)
        .await
        .into_iter()
        .next()
        .unwrap()
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::State);
    Ok(())
}

#[tokio::test]
async fn test_trust_ping_round_trip() -> Result<(), Box<dyn Error>> {
    let (faber, alice) = create_test_agents();
    let (_, alice_connection) = create_connection(&faber, &alice).await;

    let ping_thread = alice
        .engine
        .send_ping(&alice_connection, Some("hello".to_owned()), true)
        .await?;
    let status = alice.engine.thread_status(&ping_thread).await?;
    assert_eq!(status.protocol, ProtocolKind::TrustPing);
    assert_eq!(status.pending, vec![MessageKind::PingResponse]);

    for outcome in alice.deliver_to(&faber).await {
        outcome?;
    }
    let outcomes = faber.deliver_to(&alice).await;
    assert_eq!(
        outcomes.into_iter().next().unwrap()?,
        InboundOutcome::Applied {
            thread_id: ping_thread.clone(),
            state: "Completed".to_owned()
        }
    );
    assert!(alice.engine.thread_status(&ping_thread).await?.pending.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_ping_completes_responded_inviter() -> Result<(), Box<dyn Error>> {
    let (faber, alice) = create_test_agents();
    let (faber_connection, invitation) = faber.engine.create_invitation().await?;
    let alice_connection = alice
        .engine
        .accept_invitation(AnyInvitation::Con(invitation))
        .await?;
    alice.deliver_to(&faber).await;
    faber.deliver_to(&alice).await;
    // the ack gets lost
    alice.transport.take();
    assert_eq!(
        faber.engine.thread_status(&faber_connection).await?.state,
        "Responded"
    );

    alice
        .engine
        .send_ping(&alice_connection, None, false)
        .await?;
    for outcome in alice.deliver_to(&faber).await {
        outcome?;
    }
    let status = faber.engine.thread_status(&faber_connection).await?;
    assert_eq!(status.state, "Completed");
    assert!(status.pending.is_empty());
    assert_eq!(faber.transport.take().len(), 0);
    Ok(())
}

#[tokio::test]
async fn test_abandoned_connection_rejects_operations() -> Result<(), Box<dyn Error>> {
    let (faber, alice) = create_test_agents();
    let (faber_connection, alice_connection) = create_connection(&faber, &alice).await;

    let status = alice
        .engine
        .abandon(&alice_connection, "user closed the connection")
        .await?;
    assert_eq!(status.state, "Abandoned");

    let err = alice
        .engine
        .send_ping(&alice_connection, None, true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), AriesVcxErrorKind::WrongState);
    assert_eq!(
        faber.engine.thread_status(&faber_connection).await?.state,
        "Completed"
    );
    Ok(())
}

#[tokio::test]
async fn test_threads_are_listed_oldest_first() -> Result<(), Box<dyn Error>> {
    let (faber, _) = create_test_agents();
    let (first, _) = faber.engine.create_invitation().await?;
    let (second, _) = faber.engine.create_invitation().await?;

    let threads = faber.engine.threads().await?;
    assert_eq!(threads.len(), 2);
    assert!(threads[0].created_at <= threads[1].created_at);
    let ids: Vec<_> = threads.iter().map(|status| status.thread_id.clone()).collect();
    assert!(ids.contains(&first) && ids.contains(&second));
    Ok(())
}
