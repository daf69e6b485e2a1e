//! # clocktower-core
//!
//! Coordination layer of the Clocktower bot.
//!
//! - [`InteractionQueue`]: per-key FIFO of deferred interaction work, one
//!   drain loop per key, cooperative shutdown draining.
//! - [`CallbackScheduler`]: single pending timer per key; rescheduling a key
//!   replaces its timer.
//! - [`TownMaintenance`]: resumable, batched sweep over every persisted town.
//! - [`TownResolver`]: resolves a persisted town record against the live
//!   guild and refreshes the record when entities were renamed or removed.
//!
//! The remote platform and the town database are consumed through the traits
//! in [`traits`]; in-memory doubles live in `mocks` behind the `test-support`
//! feature.

pub mod callbacks;
pub mod config;
pub mod error;
pub mod interaction;
pub mod maintenance;
pub mod resolver;
pub mod shutdown;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod mocks;

pub use callbacks::{CallbackScheduler, SingleCallbackScheduler};
pub use config::{CoreConfig, InteractionConfig, MaintenanceConfig};
pub use error::{Error, Result};
pub use interaction::{GuildInteractionQueue, InteractionQueue};
pub use maintenance::TownMaintenance;
pub use resolver::TownResolver;
pub use shutdown::{Shutdown, ShutdownPreventer};
pub use traits::{BotClient, InteractionContext, TownDatabase};
