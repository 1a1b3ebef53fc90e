use serde::{Deserialize, Serialize};

/// Who is playing. Passed explicitly into whatever constructs a session and
/// recorded with the attempt; kiosks without sign-in use [`PlayerContext::anonymous`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerContext {
    pub first_name: String,
    pub email: String,
}

impl PlayerContext {
    pub fn new(first_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            email: email.into(),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}
