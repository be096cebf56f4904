//! Command implementations.

pub mod alloc;
pub mod list;
pub mod resolve;
pub mod seal;
