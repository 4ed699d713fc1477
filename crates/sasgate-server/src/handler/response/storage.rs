//! Storage response types.

use sasgate_store::types::SignedUri;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Read-only capability URI for a copied file, serialized as a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct FileCapability(pub String);

impl From<SignedUri> for FileCapability {
    fn from(uri: SignedUri) -> Self {
        Self(uri.into_url().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_a_string() {
        let capability = FileCapability("https://acme.blob.core.windows.net/c/o?sig=x".to_owned());
        assert_eq!(
            serde_json::to_string(&capability).unwrap(),
            "\"https://acme.blob.core.windows.net/c/o?sig=x\""
        );
    }
}
