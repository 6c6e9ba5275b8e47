use std::{collections::HashMap, fmt};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    data_types::{identifiers::schema_id::SchemaId, nonce::Nonce},
    error::{Error, ErrorKind},
    utils::validation::Validatable,
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, typed_builder::TypedBuilder)]
pub struct PresentationRequestPayload {
    #[builder(default)]
    pub nonce: Nonce,
    pub name: String,
    #[builder(default = "1.0".to_owned())]
    pub version: String,
    #[serde(default)]
    #[builder(default)]
    pub requested_attributes: HashMap<String, AttributeInfo>,
    #[serde(default)]
    #[builder(default)]
    pub requested_predicates: HashMap<String, PredicateInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub non_revoked: Option<NonRevokedInterval>,
}

#[derive(Clone, Default, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct NonRevokedInterval {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<u64>,
}

impl NonRevokedInterval {
    pub fn new(from: Option<u64>, to: Option<u64>) -> Self {
        Self { from, to }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct AttributeInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<Restrictions>,
}

impl AttributeInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            restrictions: None,
        }
    }

    pub fn restricted_to(mut self, schema_id: SchemaId) -> Self {
        self.restrictions = Some(Restrictions {
            schema_id: Some(schema_id),
            issuer_did: None,
        });
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Restrictions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<SchemaId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_did: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct PredicateInfo {
    pub name: String,
    pub p_type: PredicateTypes,
    pub p_value: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<Restrictions>,
}

impl PredicateInfo {
    pub fn new(name: impl Into<String>, p_type: PredicateTypes, p_value: i32) -> Self {
        Self {
            name: name.into(),
            p_type,
            p_value,
            restrictions: None,
        }
    }

    pub fn restricted_to(mut self, schema_id: SchemaId) -> Self {
        self.restrictions = Some(Restrictions {
            schema_id: Some(schema_id),
            issuer_did: None,
        });
        self
    }

    pub fn is_satisfied_by(&self, value: i64) -> bool {
        self.p_type.is_satisfied(value, i64::from(self.p_value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredicateTypes {
    GE,
    LE,
    GT,
    LT,
}

impl PredicateTypes {
    pub fn is_satisfied(&self, value: i64, bound: i64) -> bool {
        match self {
            Self::GE => value >= bound,
            Self::LE => value <= bound,
            Self::GT => value > bound,
            Self::LT => value < bound,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GE => ">=",
            Self::LE => "<=",
            Self::GT => ">",
            Self::LT => "<",
        }
    }
}

impl fmt::Display for PredicateTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for PredicateTypes {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            ">=" | "GE" => Ok(Self::GE),
            "<=" | "LE" => Ok(Self::LE),
            ">" | "GT" => Ok(Self::GT),
            "<" | "LT" => Ok(Self::LT),
            other => Err(Error::from_msg(
                ErrorKind::Conversion,
                format!("Unknown predicate type: {other}"),
            )),
        }
    }
}

impl Serialize for PredicateTypes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PredicateTypes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        PredicateTypes::try_from(value.as_str()).map_err(de::Error::custom)
    }
}

impl Validatable for PresentationRequestPayload {
    fn validate(&self) -> Result<(), Error> {
        if self.requested_attributes.is_empty() && self.requested_predicates.is_empty() {
            return Err(Error::from_msg(
                ErrorKind::Validation,
                "Presentation request validation failed: both `requested_attributes` and \
                 `requested_predicates` are empty",
            ));
        }
        for (referent, info) in &self.requested_attributes {
            if info.name.is_empty() {
                return Err(Error::from_msg(
                    ErrorKind::Validation,
                    format!("Requested attribute {referent} has an empty name"),
                ));
            }
        }
        Ok(())
    }
}
