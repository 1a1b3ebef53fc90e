use serde::{Deserialize, Serialize};

/// Every question shows exactly three answer choices. The physical panel has
/// a fourth (white) button, reserved for a future option slot.
pub const OPTIONS_PER_QUESTION: usize = 3;

/// One multiple-choice question. `options` is the display order and always
/// contains `correct_answer` exactly once; batches are shuffled when built,
/// so the order differs every run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub correct_answer: String,
    /// Opaque image locator, resolved by the presentation layer.
    pub image_ref: String,
    pub options: Vec<String>,
}

impl Question {
    pub fn correct_option_index(&self) -> Option<usize> {
        self.options.iter().position(|o| o == &self.correct_answer)
    }
}
