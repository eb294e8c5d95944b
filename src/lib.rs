//! Command-line front end for the Apollo GraphQL code generation toolchain.
//!
//! The binary parses flags, resolves paths against the working directory,
//! assembles option values and hands them to a [`toolchain::Toolchain`].
//! All schema and code work happens in the TypeScript Apollo CLI.

pub mod cli;
pub mod options;
pub mod paths;
pub mod toolchain;

use std::{io, path::PathBuf};
use thiserror::Error;
use toolchain::ToolchainError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid endpoint URL \"{value}\": {reason}")]
    InvalidUrl { value: String, reason: String },

    #[error("`--custom-scalar-prefix` is required when `--custom-scalar-format` is `passthroughWithPrefix`")]
    MissingCustomScalarPrefix,

    #[error("failed to create directory {}", .path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} exists and is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error(transparent)]
    Toolchain(#[from] ToolchainError),
}

impl Error {
    /// True for errors raised while assembling options, before any side effect.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidUrl { .. } | Self::MissingCustomScalarPrefix)
    }
}
