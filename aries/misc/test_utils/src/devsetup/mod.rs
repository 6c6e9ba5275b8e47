use std::sync::Arc;

use log::info;

use crate::{dev_wallet::DevWallet, in_memory_ledger::InMemoryLedger, logger::init_logger};

/// Collaborators of one agent under test.
#[derive(Debug, Clone)]
pub struct SetupProfile {
    pub wallet: Arc<DevWallet>,
    pub ledger: Arc<InMemoryLedger>,
}

/// Fresh wallet and ledger; the logger is installed on first use.
pub fn build_setup_profile() -> SetupProfile {
    init_logger();
    info!("build_setup_profile >>");
    SetupProfile {
        wallet: Arc::new(DevWallet::new()),
        ledger: Arc::new(InMemoryLedger::new()),
    }
}

/// Two agents reading the same ledger.
pub fn build_setup_profile_pair() -> (SetupProfile, SetupProfile) {
    let first = build_setup_profile();
    let second = SetupProfile {
        wallet: Arc::new(DevWallet::new()),
        ledger: first.ledger.clone(),
    };
    (first, second)
}
