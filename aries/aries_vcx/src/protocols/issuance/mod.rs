pub mod holder;
pub mod issuer;

use messages::msg_fields::protocols::cred_issuance::common::CredentialAttr;

use crate::errors::error::prelude::*;

/// Attribute names must be unique; issuance and presentation address them by name.
pub(crate) fn ensure_unique_names(attributes: &[CredentialAttr]) -> VcxResult<()> {
    let mut seen = std::collections::HashSet::new();
    for attr in attributes {
        if !seen.insert(attr.name.as_str()) {
            return Err(AriesVcxError::from_msg(
                AriesVcxErrorKind::SchemaMismatch,
                format!("Attribute {} is given more than once", attr.name),
            ));
        }
    }
    Ok(())
}
