pub mod did_data;
pub mod did_wallet;
pub mod encoding;

use std::fmt::Debug;

use self::{did_wallet::DidWallet, encoding::AttributeEncoder};

/// Everything the agent needs from its crypto and key storage collaborator.
pub trait BaseWallet: DidWallet + AttributeEncoder + Send + Sync + Debug {}

impl<T> BaseWallet for T where T: DidWallet + AttributeEncoder + Send + Sync + Debug {}
