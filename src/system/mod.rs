//! OS network-configuration commands.
//!
//! This module defines the `CommandExecutor` trait and the platform
//! capability objects that decide command syntax. `SystemCommandRunner`
//! combines the two into high-level configuration intents, so the rest
//! of the crate never builds an `ifconfig`/`ip`/`route` argument list.

mod link;
mod platform;
mod process_executor;
mod runner;

pub use link::link_info;
pub use platform::{broadcast_address, detect_platform, prefix_len, BsdCommands, Invocation, LinuxCommands, PlatformCommands};
pub use process_executor::ProcessExecutor;
pub use runner::{parse_gateway, parse_status_output, SystemCommandRunner};

use std::fmt;

use crate::error::CommandError;

/// Exit status and combined stdout+stderr of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub output: String,
}

impl CommandOutput {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            output: output.into(),
        }
    }

    pub fn failed(code: i32, output: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            output: output.into(),
        }
    }
}

impl fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit {}: {}", code, self.output.trim()),
            None => write!(f, "killed: {}", self.output.trim()),
        }
    }
}

/// Runs external programs.
///
/// A non-zero exit is reported through `CommandOutput::success`, not as
/// an error; errors mean the program could not be run to completion.
pub trait CommandExecutor: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, CommandError>;
}
