//! Voyage Common Types
//!
//! Shared types used across the Voyage currency layer, including currency
//! codes, monetary amounts, the display currency catalog, booking records and
//! the clock abstraction.

pub mod booking;
pub mod catalog;
pub mod monetary;
pub mod time;

pub use booking::*;
pub use catalog::*;
pub use monetary::*;
pub use time::*;
