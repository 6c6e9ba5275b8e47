use std::{error::Error, time::Duration};

use aries_vcx::{
    handlers::correlation::{InboundOutcome, InboundRouter, RouterEvent, RouterHandle},
    protocols::connection::invitation::AnyInvitation,
};
use tokio::{
    sync::mpsc,
    time::{sleep, timeout},
};

use crate::utils::test_agent::{create_test_agents, create_test_agents_with_timeout};

pub mod utils;

async fn next_event(events: &mut mpsc::Receiver<RouterEvent>) -> RouterEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("router went quiet")
        .expect("router stopped")
}

async fn wait_for_retired_workers(router: &RouterHandle) {
    timeout(Duration::from_secs(5), async {
        while router.active_workers() > 0 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("workers never retired")
}

#[tokio::test]
async fn test_router_applies_messages_in_arrival_order() -> Result<(), Box<dyn Error>> {
    let (faber, alice) = create_test_agents();
    let (router, mut events) = InboundRouter::spawn(faber.engine.clone());

    let (faber_connection, invitation) = faber.engine.create_invitation().await?;
    alice
        .engine
        .accept_invitation(AnyInvitation::Con(invitation))
        .await?;
    for packet in alice.transport.take() {
        router.deliver(packet).await?;
    }
    assert_eq!(
        next_event(&mut events).await,
        RouterEvent::Processed(InboundOutcome::Applied {
            thread_id: faber_connection.clone(),
            state: "Responded".to_owned()
        })
    );

    faber.deliver_to(&alice).await;
    let ack = alice.transport.take();
    router.deliver(ack[0].clone()).await?;
    router.deliver(ack[0].clone()).await?;
    assert_eq!(
        next_event(&mut events).await,
        RouterEvent::Processed(InboundOutcome::Applied {
            thread_id: faber_connection.clone(),
            state: "Completed".to_owned()
        })
    );
    assert_eq!(
        next_event(&mut events).await,
        RouterEvent::Processed(InboundOutcome::Replayed {
            thread_id: faber_connection,
            resent: false
        })
    );
    router.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_router_ticker_retries_then_abandons() -> Result<(), Box<dyn Error>> {
    let (faber, alice) = create_test_agents_with_timeout(50);
    let (router, mut events) = InboundRouter::spawn(alice.engine.clone());

    let (_, invitation) = faber.engine.create_invitation().await?;
    let alice_connection = alice
        .engine
        .accept_invitation(AnyInvitation::Con(invitation))
        .await?;

    let mut resent = 0;
    loop {
        match next_event(&mut events).await {
            RouterEvent::TimeoutsChecked(report) if report.abandoned.is_empty() => {
                resent += report.resent.len();
            }
            RouterEvent::TimeoutsChecked(report) => {
                assert_eq!(report.abandoned, vec![alice_connection.clone()]);
                break;
            }
            event => panic!("unexpected event {event:?}"),
        }
    }
    assert_eq!(resent, 2);
    assert_eq!(alice.transport.sent_count(), 3);
    assert!(alice
        .engine
        .thread_status(&alice_connection)
        .await?
        .is_abandoned());
    router.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_router_retires_worker_of_completed_thread() -> Result<(), Box<dyn Error>> {
    let (faber, alice) = create_test_agents();
    let (router, mut events) = InboundRouter::spawn(faber.engine.clone());

    let (faber_connection, invitation) = faber.engine.create_invitation().await?;
    alice
        .engine
        .accept_invitation(AnyInvitation::Con(invitation))
        .await?;
    for packet in alice.transport.take() {
        router.deliver(packet).await?;
    }
    next_event(&mut events).await;
    assert_eq!(router.active_workers(), 1);

    faber.deliver_to(&alice).await;
    let ack = alice.transport.take();
    router.deliver(ack[0].clone()).await?;
    assert_eq!(
        next_event(&mut events).await,
        RouterEvent::Processed(InboundOutcome::Applied {
            thread_id: faber_connection.clone(),
            state: "Completed".to_owned()
        })
    );
    wait_for_retired_workers(&router).await;

    // a late duplicate still gets an answer from a fresh worker
    router.deliver(ack[0].clone()).await?;
    assert_eq!(
        next_event(&mut events).await,
        RouterEvent::Processed(InboundOutcome::Replayed {
            thread_id: faber_connection,
            resent: false
        })
    );
    wait_for_retired_workers(&router).await;
    router.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_router_retires_idle_worker() -> Result<(), Box<dyn Error>> {
    let (faber, alice) = create_test_agents();
    let (router, mut events) =
        InboundRouter::spawn_with_idle_timeout(faber.engine.clone(), Duration::from_millis(50));

    let (faber_connection, invitation) = faber.engine.create_invitation().await?;
    alice
        .engine
        .accept_invitation(AnyInvitation::Con(invitation))
        .await?;
    for packet in alice.transport.take() {
        router.deliver(packet).await?;
    }
    assert_eq!(
        next_event(&mut events).await,
        RouterEvent::Processed(InboundOutcome::Applied {
            thread_id: faber_connection.clone(),
            state: "Responded".to_owned()
        })
    );
    wait_for_retired_workers(&router).await;

    faber.deliver_to(&alice).await;
    for packet in alice.transport.take() {
        router.deliver(packet).await?;
    }
    assert_eq!(
        next_event(&mut events).await,
        RouterEvent::Processed(InboundOutcome::Applied {
            thread_id: faber_connection,
            state: "Completed".to_owned()
        })
    );
    router.shutdown();
    Ok(())
}
