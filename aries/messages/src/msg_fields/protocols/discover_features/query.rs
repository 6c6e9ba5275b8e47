use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use typed_builder::TypedBuilder;

use super::ProtocolDescriptor;
use crate::{decorators::timing::Timing, msg_parts::MsgParts, msg_types::Protocol};

pub type Query = MsgParts<QueryContent, QueryDecorators>;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, TypedBuilder)]
pub struct QueryContent {
    pub query: String,
    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl QueryContent {
    /// Supported protocols whose URI starts with the part of the query before the first `*`.
    pub fn lookup(&self) -> Vec<ProtocolDescriptor> {
        let prefix = self.query.split('*').next().unwrap_or_default();
        Protocol::iter()
            .filter(|protocol| protocol.pid().starts_with(prefix))
            .map(ProtocolDescriptor::from)
            .collect()
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, Default, PartialEq, TypedBuilder)]
pub struct QueryDecorators {
    #[builder(default, setter(strip_option))]
    #[serde(rename = "~timing")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        decorators::timing::tests::make_extended_timing, misc::test_utils, msg_types::MessageKind,
    };

    #[test]
    fn test_minimal_query() {
        let content = QueryContent::builder().query("*".to_owned()).build();
        let decorators = QueryDecorators::default();

        let expected = json!({
            "query": content.query
        });

        test_utils::test_msg(content, decorators, MessageKind::FeatureQuery, expected);
    }

    #[test]
    fn test_extended_query() {
        let content = QueryContent::builder()
            .query("*".to_owned())
            .comment("test_comment".to_owned())
            .build();
        let decorators = QueryDecorators::builder()
            .timing(make_extended_timing())
            .build();

        let expected = json!({
            "query": content.query,
            "comment": content.comment,
            "~timing": decorators.timing
        });

        test_utils::test_msg(content, decorators, MessageKind::FeatureQuery, expected);
    }

    #[test]
    fn test_lookup_match_all() {
        let matched = QueryContent::builder().query("*".to_owned()).build().lookup();
        assert_eq!(matched.len(), Protocol::iter().count());
    }

    #[test]
    fn test_lookup_match_protocol() {
        let matched = QueryContent::builder()
            .query("https://didcomm.org/connections/*".to_owned())
            .build()
            .lookup();
        assert_eq!(
            matched,
            vec![ProtocolDescriptor::from(Protocol::Connections)]
        );
        assert_eq!(matched[0].pid, "https://didcomm.org/connections/1.0");
    }

    #[test]
    fn test_lookup_match_version() {
        let matched = QueryContent::builder()
            .query("https://didcomm.org/out-of-band/1.*".to_owned())
            .build()
            .lookup();
        assert_eq!(matched, vec![ProtocolDescriptor::from(Protocol::OutOfBand)]);
    }

    #[test]
    fn test_lookup_match_none() {
        let matched = QueryContent::builder()
            .query("https://didcomm.org/non-existent/*".to_owned())
            .build()
            .lookup();
        assert!(matched.is_empty());
    }
}
