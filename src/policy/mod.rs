//! Policy Module
//!
//! Strategies the cache composes: expiration, write propagation and refresh.
//!
//! # Policies
//! - Expiration: [`SinceCreation`], [`SinceLastAccess`], [`SinceLastWrite`]
//! - Write propagation: [`WriteThrough`], [`WriteBack`]
//! - Refresh: [`FixedDurationRefresh`]

mod expiration;
mod refresh;
mod write;

pub use expiration::{ExpirationPolicy, SinceCreation, SinceLastAccess, SinceLastWrite};
pub use refresh::{FixedDurationRefresh, RefreshPolicy, Refreshable};
pub use write::{WriteBack, WritePolicy, WriteThrough};
