//! Storage request types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Path parameters for the file capability route.
#[must_use]
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FilePathParams {
    /// Name the copy is stored under in the external container.
    pub new_file_name: String,
}

/// Location of the file to copy out of the internal store.
#[must_use]
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InternalFileQuery {
    /// Container holding the file in the internal store.
    pub internal_container_name: String,
    /// Name of the file in the internal container.
    pub internal_file_name: String,
}

/// Container to delete from the external store.
#[must_use]
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerQuery {
    /// Name of the external container, e.g. `sas-container-638501616000000000`.
    pub container_name: String,
}
