use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use aries_vcx::{
    errors::error::VcxResult,
    global::settings::AgentConfig,
    handlers::correlation::{ExchangeEngine, InboundOutcome},
    transport::Transport,
};
use aries_vcx_ledger::ledger::response_cacher::in_memory::{
    CachingLedgerRead, InMemoryResponseCacherConfig,
};
use async_trait::async_trait;
use test_utils::{
    dev_wallet::DevWallet,
    devsetup::{build_setup_profile_pair, SetupProfile},
    in_memory_ledger::InMemoryLedger,
};
use url::Url;

/// Keeps every packet handed to it until the test delivers it.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    outbox: Mutex<Vec<(Url, Vec<u8>)>>,
    sent: AtomicUsize,
}

impl RecordingTransport {
    pub fn sent_count(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn take(&self) -> Vec<Vec<u8>> {
        self.outbox
            .lock()
            .unwrap()
            .drain(..)
            .map(|(_, packet)| packet)
            .collect()
    }

    pub fn endpoints(&self) -> Vec<Url> {
        self.outbox
            .lock()
            .unwrap()
            .iter()
            .map(|(endpoint, _)| endpoint.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_message(&self, msg: Vec<u8>, service_endpoint: &Url) -> VcxResult<()> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        self.outbox
            .lock()
            .unwrap()
            .push((service_endpoint.clone(), msg));
        Ok(())
    }
}

pub struct TestAgent {
    pub engine: Arc<ExchangeEngine>,
    pub transport: Arc<RecordingTransport>,
    pub wallet: Arc<DevWallet>,
    pub ledger: Arc<InMemoryLedger>,
}

impl TestAgent {
    /// Delivers everything this agent sent to `to`, in sending order.
    pub async fn deliver_to(&self, to: &TestAgent) -> Vec<VcxResult<InboundOutcome>> {
        let mut outcomes = Vec::new();
        for packet in self.transport.take() {
            outcomes.push(to.engine.receive_packed(&packet).await);
        }
        outcomes
    }
}

pub fn agent_config(label: &str, reply_timeout_ms: u64) -> AgentConfig {
    AgentConfig::builder()
        .label(label)
        .service_endpoint(Url::parse(&format!("http://{label}.example.org:8080/didcomm")).unwrap())
        .reply_timeout_ms(reply_timeout_ms)
        .max_retries(2)
        .ledger_max_retries(1)
        .ledger_backoff_ms(1)
        .timeout_tick_ms(20)
        .build()
}

pub fn create_test_agent(setup: SetupProfile, config: AgentConfig) -> TestAgent {
    let transport = Arc::new(RecordingTransport::default());
    let cache_config = InMemoryResponseCacherConfig::new(Duration::from_secs(60), 64).unwrap();
    let engine = ExchangeEngine::new(
        config,
        setup.wallet.clone(),
        Arc::new(CachingLedgerRead::new(setup.ledger.clone(), cache_config)),
        transport.clone(),
    )
    .unwrap();
    TestAgent {
        engine: Arc::new(engine),
        transport,
        wallet: setup.wallet,
        ledger: setup.ledger,
    }
}

/// Faber and Alice, reading the same ledger.
pub fn create_test_agents() -> (TestAgent, TestAgent) {
    create_test_agents_with_timeout(30_000)
}

pub fn create_test_agents_with_timeout(reply_timeout_ms: u64) -> (TestAgent, TestAgent) {
    let (faber, alice) = build_setup_profile_pair();
    (
        create_test_agent(faber, agent_config("faber", reply_timeout_ms)),
        create_test_agent(alice, agent_config("alice", reply_timeout_ms)),
    )
}
