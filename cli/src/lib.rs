//! gbox CLI - a thin HTTP client for the gbox sandbox control plane.

pub mod client;
pub mod commands;
pub mod output;
