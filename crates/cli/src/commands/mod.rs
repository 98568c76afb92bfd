//! Subcommand implementations.
//!
//! Results go to stdout; logs go to stderr through tracing.

#![allow(clippy::print_stdout)]

use std::path::PathBuf;

use podforge_client::{ClientError, ConfigError, TransportError};
use podforge_core::DraftId;
use thiserror::Error;

pub mod drafts;
pub mod integrations;

/// Errors that end a command with a non-zero exit.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Failed to read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("Push of draft {0} failed")]
    PushFailed(DraftId),
}
