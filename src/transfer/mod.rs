//! Cross-backend transfer engine: modularized.

mod condition;
mod copy;
mod optimize;
mod orchestrate;

pub use condition::Condition;
pub use copy::copy_file;
pub use optimize::try_optimized_move;
pub use orchestrate::{DEFAULT_LOCK_TIMEOUT, Mover, TransferOutcome, TransferRequest};
