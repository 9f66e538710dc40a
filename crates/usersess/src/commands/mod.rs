//! Command implementations for the usersess CLI.

pub mod gc;
pub mod init;
pub mod sessions;
pub mod stats;
