//! Home feed: zone-driven block assembly.

pub mod blocks;
pub mod engine;
pub mod handlers;
