pub(crate) mod utils;

use serde::{Deserialize, Serialize};

/// Decorators placeholder for messages that carry none.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct NoDecorators {}
