pub mod counters;
pub mod interaction;
pub mod vote;

pub use counters::*;
pub use interaction::*;
pub use vote::*;
