//! Option values handed to the toolchain.
//!
//! These mirror the shapes the Apollo CLI understands and are kept apart
//! from the clap-facing enums in [`crate::cli`]; the `From`/constructor
//! impls below are the only bridge between the two.

use crate::{cli, paths::ResolvedPath, Error};
use std::path::{Path, PathBuf};
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:4000/graphql";
pub const DEFAULT_INCLUDES: &str = "./**/*.graphql";
pub const SCHEMA_FILE_NAME: &str = "schema.json";

/// Parses a schema endpoint. Relative and non-hierarchical URLs are rejected.
pub fn parse_endpoint(raw: &str) -> Result<Url, Error> {
    let invalid = |reason: String| Error::InvalidUrl {
        value: raw.to_owned(),
        reason,
    };
    let url = Url::parse(raw).map_err(|err| invalid(err.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("expected an absolute URL such as http://host/graphql".into()));
    }
    Ok(url)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaDownloadOptions {
    pub endpoint: Url,
    pub output_dir: ResolvedPath,
    pub tool_dir: ResolvedPath,
}

impl SchemaDownloadOptions {
    /// Where the introspection result is written.
    pub fn schema_file(&self) -> PathBuf {
        self.output_dir.join(SCHEMA_FILE_NAME)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessModifier {
    Public,
    Internal,
    None,
}

impl From<cli::AccessModifier> for AccessModifier {
    fn from(modifier: cli::AccessModifier) -> Self {
        match modifier {
            cli::AccessModifier::Public => Self::Public,
            cli::AccessModifier::Internal => Self::Internal,
            cli::AccessModifier::None => Self::None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CustomScalarPolicy {
    /// Map custom scalars to `String`.
    None,
    /// Emit the scalar's own name as the type.
    Passthrough,
    /// Emit the scalar's name with a prefix.
    PassthroughWithPrefix(String),
}

impl CustomScalarPolicy {
    pub fn new(format: cli::CustomScalarFormat, prefix: Option<String>) -> Result<Self, Error> {
        Ok(match format {
            cli::CustomScalarFormat::None => Self::None,
            cli::CustomScalarFormat::Passthrough => Self::Passthrough,
            cli::CustomScalarFormat::PassthroughWithPrefix => {
                Self::PassthroughWithPrefix(prefix.ok_or(Error::MissingCustomScalarPrefix)?)
            }
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputTarget {
    SingleFile(ResolvedPath),
    MultipleFiles(ResolvedPath),
}

impl OutputTarget {
    pub fn new(format: cli::OutputFormat, output: ResolvedPath) -> Self {
        match format {
            cli::OutputFormat::Single => Self::SingleFile(output),
            cli::OutputFormat::Multiple => Self::MultipleFiles(output),
        }
    }

    pub fn path(&self) -> &ResolvedPath {
        match self {
            Self::SingleFile(path) | Self::MultipleFiles(path) => path,
        }
    }

    /// The directory that has to exist before generation starts.
    pub fn directory(&self) -> &Path {
        match self {
            Self::SingleFile(file) => file.parent().unwrap_or(file.as_path()),
            Self::MultipleFiles(dir) => dir.as_path(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodegenEngine {
    TypeScript,
    ExperimentalNative,
}

impl CodegenEngine {
    pub fn from_flag(use_native: bool) -> Self {
        if use_native {
            Self::ExperimentalNative
        } else {
            Self::TypeScript
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodegenOptions {
    pub schema: ResolvedPath,
    pub output: OutputTarget,
    pub access_modifier: AccessModifier,
    pub namespace: Option<String>,
    pub custom_scalars: CustomScalarPolicy,
    pub only: Option<ResolvedPath>,
    pub operation_ids: Option<ResolvedPath>,
    pub omit_deprecated_enum_cases: bool,
    pub engine: CodegenEngine,
    pub includes: String,
}
