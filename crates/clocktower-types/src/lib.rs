//! Shared types for the Clocktower bot
//!
//! Persisted town records, the live guild entities they point at, and the
//! shapes used to answer queued interactions.

pub mod entities;
pub mod interaction;
pub mod town;

pub use entities::*;
pub use interaction::*;
pub use town::*;
