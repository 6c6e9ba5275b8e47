use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use typed_builder::TypedBuilder;

/// Struct representing the `~thread` decorator from its [RFC](<https://github.com/hyperledger/aries-rfcs/blob/main/concepts/0008-message-id-and-threading/README.md>).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TypedBuilder)]
pub struct Thread {
    pub thid: String,
    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pthid: Option<String>,
    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_order: Option<u32>,
    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_orders: Option<HashMap<String, u32>>,
    /// Fields this crate does not model, kept so a relayed decorator round-trips.
    #[builder(default)]
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl Thread {
    pub fn new(thid: impl Into<String>) -> Self {
        Self::builder().thid(thid.into()).build()
    }
}

#[cfg(test)]
pub mod tests {
    use serde_json::json;

    use super::*;
    use crate::misc::test_utils;

    pub fn make_minimal_thread() -> Thread {
        Thread::new("test_thid")
    }

    pub fn make_extended_thread() -> Thread {
        let mut received_orders = HashMap::new();
        received_orders.insert("a".to_owned(), 1);

        Thread::builder()
            .thid("test_thid".to_owned())
            .pthid("test_pthid".to_owned())
            .sender_order(5)
            .received_orders(received_orders)
            .build()
    }

    #[test]
    fn test_minimal_thread() {
        let thread = make_minimal_thread();
        let expected = json!({ "thid": thread.thid });

        test_utils::test_serde(thread, expected);
    }

    #[test]
    fn test_extended_thread() {
        let thread = make_extended_thread();

        let expected = json!({
            "thid": thread.thid,
            "pthid": thread.pthid,
            "sender_order": thread.sender_order,
            "received_orders": thread.received_orders
        });

        test_utils::test_serde(thread, expected);
    }

    #[test]
    fn test_unmodelled_fields_are_kept() {
        let wire = json!({ "thid": "t-1", "x-vendor-order": 7 });
        let thread: Thread = serde_json::from_value(wire.clone()).unwrap();

        assert_eq!(thread.thid, "t-1");
        assert_eq!(thread.extra["x-vendor-order"], json!(7));
        assert_eq!(serde_json::to_value(&thread).unwrap(), wire);
    }
}
