use std::sync::PoisonError;

use super::error::VcxWalletError;

impl<T> From<PoisonError<T>> for VcxWalletError {
    fn from(err: PoisonError<T>) -> Self {
        VcxWalletError::InvalidInput(format!("wallet lock poisoned: {err}"))
    }
}
