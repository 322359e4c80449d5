//! Work-item model and the queues that carry items between stages.

pub mod item;
pub mod queue;

pub use item::{derive_identifier, InputItem, Stage1Item, Stage2Item};
pub use queue::{stage2_queue, Stage1Queue, Stage2Receiver, Stage2Sender};
