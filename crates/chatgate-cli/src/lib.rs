//! # chatgate-cli
//!
//! The `chatgate` binary: argument parsing, configuration bootstrap and the
//! command handlers behind `serve`, `ask`, `models` and `prompt`.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by the binary target only
use dotenvy as _;

pub mod bootstrap;
pub mod commands;
pub mod handlers;
pub mod parser;

pub use bootstrap::{gateway_config, init_logging};
pub use commands::Commands;
pub use parser::{Cli, GatewayArgs};
