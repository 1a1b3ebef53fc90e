use serde::{Deserialize, Serialize};

/// Source row for question-batch construction. Not retained after a batch
/// has been built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Bird {
    pub name: String,
    pub image_ref: String,
    pub category: String,
}
