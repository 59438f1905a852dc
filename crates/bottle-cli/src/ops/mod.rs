//! Operations composed from the resolution core.

pub mod build;
pub mod context;
pub mod exec;
pub mod sync;
