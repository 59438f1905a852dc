pub mod build;
pub mod exec;
pub mod which;
