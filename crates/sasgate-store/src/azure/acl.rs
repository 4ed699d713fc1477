//! `SignedIdentifiers` request bodies for container ACLs.

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::types::{SignedIdentifier, format_sas_time};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

/// Wire form of a set-container-ACL body.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename = "SignedIdentifiers")]
struct SignedIdentifiersXml {
    #[serde(rename = "SignedIdentifier", default)]
    identifiers: Vec<SignedIdentifierXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SignedIdentifierXml {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "AccessPolicy")]
    access_policy: AccessPolicyXml,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessPolicyXml {
    #[serde(rename = "Start", skip_serializing_if = "Option::is_none", default)]
    start: Option<String>,
    #[serde(rename = "Expiry", skip_serializing_if = "Option::is_none", default)]
    expiry: Option<String>,
    #[serde(rename = "Permission")]
    permission: String,
}

impl From<&SignedIdentifier> for SignedIdentifierXml {
    fn from(identifier: &SignedIdentifier) -> Self {
        let policy = identifier.policy();
        Self {
            id: identifier.id().to_owned(),
            access_policy: AccessPolicyXml {
                start: policy.starts_on.map(format_sas_time),
                expiry: policy.expires_on.map(format_sas_time),
                permission: policy.permissions.to_string(),
            },
        }
    }
}

/// Renders the body of a set-container-ACL request.
///
/// # Errors
///
/// Returns an error if the identifiers cannot be serialized.
pub fn signed_identifiers_xml(identifiers: &[SignedIdentifier]) -> StoreResult<String> {
    let body = SignedIdentifiersXml {
        identifiers: identifiers.iter().map(SignedIdentifierXml::from).collect(),
    };

    let xml = quick_xml::se::to_string(&body)
        .map_err(|e| StoreError::other("failed to serialize signed identifiers").with_source(e))?;

    Ok(format!("{XML_DECLARATION}{xml}"))
}
