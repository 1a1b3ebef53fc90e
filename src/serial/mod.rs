pub mod debounce;
pub mod dispatch;
pub mod framing;
pub mod link;
pub mod supervisor;

pub use debounce::DebounceFilter;
pub use dispatch::token_to_action;
pub use framing::LineAccumulator;
pub use supervisor::{LinkState, SerialHandle, SerialSupervisor};
