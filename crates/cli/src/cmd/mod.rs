//! CLI command implementations

pub mod init;
pub mod commit;
pub mod log;
pub mod revert;
pub mod show;
pub mod label;
