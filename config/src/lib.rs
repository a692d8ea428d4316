//! Command line and config file parsing for the node
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

mod cli;
pub mod parsing;
mod validation;

pub use cli::{Cli, NodeConfig, RetryConfig};
pub use parsing::{config_file::parse_config_from_file, parse_command_line_args};
