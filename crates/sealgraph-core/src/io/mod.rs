//! IO modules - side effects (git, filesystem)

pub mod fetch;
pub mod snapshot;
