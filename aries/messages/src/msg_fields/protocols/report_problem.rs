//! Module containing the `report problem` protocol messages, as defined in the [RFC](<https://github.com/hyperledger/aries-rfcs/blob/main/features/0035-report-problem/README.md>).

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::{
    decorators::{thread::Thread, timing::Timing},
    msg_parts::MsgParts,
};

pub type ProblemReport = MsgParts<ProblemReportContent, ProblemReportDecorators>;

impl ProblemReport {
    /// Problem code, from `description.code` or the legacy `problem-code` field.
    pub fn code(&self) -> Option<&str> {
        self.content
            .description
            .as_ref()
            .map(|d| d.code.as_str())
            .or_else(|| self.extra.get("problem-code").and_then(|v| v.as_str()))
    }

    pub fn explain(&self) -> Option<&str> {
        self.content
            .description
            .as_ref()
            .and_then(|d| d.en.as_deref())
            .or(self.content.explain.as_deref())
            .or_else(|| self.extra.get("comment").and_then(|v| v.as_str()))
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, TypedBuilder)]
pub struct ProblemReportContent {
    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Description>,
    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, TypedBuilder)]
pub struct Description {
    #[builder(default, setter(strip_option))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
    pub code: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, TypedBuilder)]
pub struct ProblemReportDecorators {
    #[serde(rename = "~thread")]
    pub thread: Thread,
    #[builder(default, setter(strip_option))]
    #[serde(rename = "~timing")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
}
