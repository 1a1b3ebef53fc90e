mod attempt;
mod bird;
mod player;
mod question;

pub use attempt::{AttemptRecord, BestEntry};
pub use bird::Bird;
pub use player::PlayerContext;
pub use question::{Question, OPTIONS_PER_QUESTION};
