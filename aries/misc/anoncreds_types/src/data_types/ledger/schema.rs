use std::collections::HashSet;

use crate::{
    data_types::identifiers::schema_id::SchemaId,
    error::{Error, ErrorKind},
    utils::validation::Validatable,
};

pub const MAX_ATTRIBUTES_COUNT: usize = 125;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub id: SchemaId,
    pub name: String,
    pub version: String,
    pub attr_names: AttributeNames,
    pub issuer_id: String,
}

impl Schema {
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attr_names.0.iter().any(|attr| attr == name)
    }
}

impl Validatable for Schema {
    fn validate(&self) -> Result<(), Error> {
        self.id.validate()?;
        self.attr_names.validate()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeNames(pub Vec<String>);

impl AttributeNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set equality, order of declaration is irrelevant.
    pub fn same_set<'a, I: IntoIterator<Item = &'a String>>(&self, other: I) -> bool {
        let mine: HashSet<&String> = self.0.iter().collect();
        let theirs: HashSet<&String> = other.into_iter().collect();
        mine == theirs
    }
}

impl From<&[&str]> for AttributeNames {
    fn from(attrs: &[&str]) -> Self {
        Self(attrs.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Vec<String>> for AttributeNames {
    fn from(attrs: Vec<String>) -> Self {
        Self(attrs)
    }
}

impl From<AttributeNames> for Vec<String> {
    fn from(a: AttributeNames) -> Self {
        a.0
    }
}

impl Validatable for AttributeNames {
    fn validate(&self) -> Result<(), Error> {
        let mut unique = HashSet::new();
        for attr in &self.0 {
            if !unique.insert(attr) {
                return Err(Error::from_msg(
                    ErrorKind::Validation,
                    format!("Duplicate attribute name: {attr}"),
                ));
            }
        }

        if self.0.is_empty() {
            return Err(Error::from_msg(
                ErrorKind::Validation,
                "Empty list of Schema attributes has been passed",
            ));
        }

        if self.0.len() > MAX_ATTRIBUTES_COUNT {
            return Err(Error::from_msg(
                ErrorKind::Validation,
                format!(
                    "The number of Schema attributes {} cannot be greater than {}",
                    self.0.len(),
                    MAX_ATTRIBUTES_COUNT
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test_schema_validation {
    use super::*;

    fn schema_json() -> serde_json::Value {
        json!({
            "id": "NcYxiDXkpYi6ov5FcYDi1e:2:employee:1.0",
            "name": "employee",
            "version": "1.0",
            "attrNames": ["name", "age"],
            "issuerId": "NcYxiDXkpYi6ov5FcYDi1e",
        })
    }

    #[test]
    fn test_valid_schema() {
        let schema: Schema = serde_json::from_value(schema_json()).unwrap();
        schema.validate().unwrap();
        assert!(schema.has_attribute("age"));
        assert!(!schema.has_attribute("salary"));
    }

    #[test]
    fn test_duplicate_attribute_names() {
        let mut schema: Schema = serde_json::from_value(schema_json()).unwrap();
        schema.attr_names.0.push("name".into());
        assert_eq!(
            schema.validate().unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_same_set_ignores_order() {
        let names = AttributeNames::from(&["name", "age"][..]);
        let other = vec!["age".to_string(), "name".to_string()];
        assert!(names.same_set(&other));
        assert!(!names.same_set(&vec!["age".to_string()]));
    }
}
