//! # tapdesk-client
//!
//! Host-side glue around `tapdesk-core`: reads the TOML configuration,
//! renders the remote frame into a software surface, and routes window
//! input through the session as remote pointer and key commands.

pub mod config;
pub mod surface;
pub mod view;
