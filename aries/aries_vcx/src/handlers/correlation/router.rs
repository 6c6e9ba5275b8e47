use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::Utc;
use tokio::{
    sync::mpsc::{self, error::SendError},
    task::JoinHandle,
    time::{interval, timeout, MissedTickBehavior},
};

use super::{
    engine::{ExchangeEngine, InboundOutcome, TimeoutReport},
    thread::ThreadError,
};
use crate::{errors::error::prelude::*, utils::encryption_envelope::UnpackedMessage};

const INBOX_CAPACITY: usize = 64;
const MAILBOX_CAPACITY: usize = 16;
const WORKER_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub enum RouterEvent {
    Processed(InboundOutcome),
    Failed {
        thread_id: Option<String>,
        error: ThreadError,
    },
    TimeoutsChecked(TimeoutReport),
}

/// Feeds packed inbound messages to the engine. Messages of one thread are applied in
/// arrival order by a dedicated worker; distinct threads proceed concurrently.
///
/// A worker retires once its thread is terminal or has been idle for a while. A later
/// message for the same thread starts a fresh worker, which waits for the retiring one.
pub struct InboundRouter;

impl InboundRouter {
    pub fn spawn(engine: Arc<ExchangeEngine>) -> (RouterHandle, mpsc::Receiver<RouterEvent>) {
        Self::spawn_with_idle_timeout(engine, WORKER_IDLE_TIMEOUT)
    }

    pub fn spawn_with_idle_timeout(
        engine: Arc<ExchangeEngine>,
        idle_timeout: Duration,
    ) -> (RouterHandle, mpsc::Receiver<RouterEvent>) {
        let (inbox, packets) = mpsc::channel(INBOX_CAPACITY);
        let (events_sender, events) = mpsc::channel(INBOX_CAPACITY);
        let tick = engine.config().timeout_tick();
        let workers = WorkerPool {
            engine: engine.clone(),
            events: events_sender.clone(),
            idle_timeout,
            active: Arc::new(AtomicUsize::new(0)),
        };
        let active_workers = workers.active.clone();

        let dispatcher = tokio::spawn(dispatch(workers, packets));
        let ticker = tokio::spawn(async move {
            let mut interval = interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let event = match engine.check_timeouts(Utc::now()).await {
                    Ok(report) if report.is_empty() => continue,
                    Ok(report) => RouterEvent::TimeoutsChecked(report),
                    Err(err) => {
                        error!("Timeout check failed: {err}");
                        RouterEvent::Failed {
                            thread_id: None,
                            error: ThreadError::from(&err),
                        }
                    }
                };
                if events_sender.send(event).await.is_err() {
                    break;
                }
            }
        });

        (
            RouterHandle {
                inbox,
                tasks: vec![dispatcher, ticker],
                active_workers,
            },
            events,
        )
    }
}

#[derive(Clone)]
struct WorkerPool {
    engine: Arc<ExchangeEngine>,
    events: mpsc::Sender<RouterEvent>,
    idle_timeout: Duration,
    active: Arc<AtomicUsize>,
}

struct Mailbox {
    sender: mpsc::Sender<UnpackedMessage>,
    worker: JoinHandle<()>,
}

async fn dispatch(workers: WorkerPool, mut packets: mpsc::Receiver<Vec<u8>>) {
    let mut mailboxes: HashMap<String, Mailbox> = HashMap::new();
    while let Some(packet) = packets.recv().await {
        let unpacked = match workers.engine.unpack(&packet).await {
            Ok(unpacked) => unpacked,
            Err(err) => {
                warn!("Dropping inbound packet: {err}");
                let event = RouterEvent::Failed {
                    thread_id: None,
                    error: ThreadError::from(&err),
                };
                if workers.events.send(event).await.is_err() {
                    return;
                }
                continue;
            }
        };
        let thread_id = unpacked.message.thread_id().to_owned();
        mailboxes.retain(|_, mailbox| !mailbox.worker.is_finished());
        let sent = mailboxes
            .entry(thread_id.clone())
            .or_insert_with(|| workers.spawn(None))
            .sender
            .send(unpacked)
            .await;
        if let Err(SendError(unpacked)) = sent {
            debug!("Worker of thread {thread_id} retired, starting a new one");
            let retired = mailboxes.remove(&thread_id).map(|mailbox| mailbox.worker);
            let mailbox = workers.spawn(retired);
            if mailbox.sender.send(unpacked).await.is_err() {
                error!("Worker of thread {thread_id} is gone");
                continue;
            }
            mailboxes.insert(thread_id, mailbox);
        }
    }
    debug!("Router inbox closed");
}

impl WorkerPool {
    fn spawn(&self, predecessor: Option<JoinHandle<()>>) -> Mailbox {
        let (sender, messages) = mpsc::channel::<UnpackedMessage>(MAILBOX_CAPACITY);
        let worker = tokio::spawn(self.clone().run(messages, predecessor));
        Mailbox { sender, worker }
    }

    async fn run(
        self,
        mut messages: mpsc::Receiver<UnpackedMessage>,
        predecessor: Option<JoinHandle<()>>,
    ) {
        if let Some(predecessor) = predecessor {
            let _ = predecessor.await;
        }
        self.active.fetch_add(1, Ordering::SeqCst);
        loop {
            // a closed mailbox still yields what was buffered before `None`
            let message = match timeout(self.idle_timeout, messages.recv()).await {
                Ok(Some(message)) => message,
                Ok(None) => break,
                Err(_) => {
                    messages.close();
                    continue;
                }
            };
            let thread_id = message.message.thread_id().to_owned();
            let event = match self.engine.receive_message(message).await {
                Ok(outcome) => {
                    if self.is_finished(outcome.thread_id()).await {
                        messages.close();
                    }
                    RouterEvent::Processed(outcome)
                }
                Err(err) => RouterEvent::Failed {
                    thread_id: Some(thread_id),
                    error: ThreadError::from(&err),
                },
            };
            if self.events.send(event).await.is_err() {
                break;
            }
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    async fn is_finished(&self, thread_id: &str) -> bool {
        self.engine
            .thread_status(thread_id)
            .await
            .is_ok_and(|status| status.is_terminal())
    }
}

pub struct RouterHandle {
    inbox: mpsc::Sender<Vec<u8>>,
    tasks: Vec<JoinHandle<()>>,
    active_workers: Arc<AtomicUsize>,
}

impl RouterHandle {
    pub async fn deliver(&self, packed: Vec<u8>) -> VcxResult<()> {
        self.inbox.send(packed).await.map_err(|_| {
            AriesVcxError::from_msg(AriesVcxErrorKind::InvalidState, "Router has been shut down")
        })
    }

    /// Threads that currently hold a worker.
    pub fn active_workers(&self) -> usize {
        self.active_workers.load(Ordering::SeqCst)
    }

    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}
