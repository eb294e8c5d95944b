use crate::{
    options::{
        self, CodegenEngine, CodegenOptions, CustomScalarPolicy, OutputTarget,
        SchemaDownloadOptions, DEFAULT_ENDPOINT, DEFAULT_INCLUDES,
    },
    paths::{ensure_directory_exists, resolve, ResolvedPath},
    toolchain::{Toolchain, DEFAULT_CLI_URL},
    Error,
};
use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};
use std::path::Path;
use url::Url;

/// A utility for performing Apollo GraphQL related tasks.
///
/// Make sure the CLI version matches the version of the Apollo runtime your
/// project is using.
#[derive(Parser, Debug)]
#[command(author, version, propagate_version = true)]
pub struct Cli {
    /// Only log messages at or above this level (off, error, warn, info, debug, trace)
    #[arg(
        short = 'L',
        long,
        global = true,
        env = "APOLLO_CODEGEN_LOG",
        default_value = "info"
    )]
    pub log_level: log::LevelFilter,

    /// Where to download the TypeScript Apollo CLI from when it is not installed yet
    #[arg(long, global = true, env = "APOLLO_CLI_URL", default_value = DEFAULT_CLI_URL)]
    pub cli_url: Url,

    /// Expected SHA-256 (hex) of the CLI archive; checked before it is unpacked
    #[arg(long, global = true, env = "APOLLO_CLI_SHA256", value_name = "HEX")]
    pub cli_sha256: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Runs the selected subcommand. `cwd` anchors every relative path.
    pub fn run(&self, cwd: &Path, toolchain: &impl Toolchain) -> Result<(), Error> {
        match &self.command {
            Command::DownloadSchema(cmd) => cmd.run(cwd, toolchain),
            Command::Generate(cmd) => cmd.run(cwd, toolchain),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Downloads the GraphQL schema.
    DownloadSchema(DownloadSchema),

    /// Generates Swift code from a GraphQL schema and operations (`*.graphql` files).
    #[command(after_help = GENERATE_DISCUSSION)]
    Generate(GenerateCode),
}

const GENERATE_DISCUSSION: &str = "\
If outputting a single file the `--output` option should be the path to the file.
E.g. `path/to/file.swift`

If outputting multiple files - one per operation - then the `--output` option should
be to a directory. E.g. `path/to/output/dir/`";

#[derive(Args, Debug)]
pub struct DownloadSchema {
    /// The directory that the TypeScript CLI should be downloaded to.
    #[arg(short = 't', long = "ts-cli-output-dir", value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub ts_cli_output_dir: String,

    /// The directory where the schema should be downloaded to.
    #[arg(short, long, value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub output_dir: String,

    /// The GraphQL endpoint (URL) the schema should be downloaded from.
    #[arg(default_value = DEFAULT_ENDPOINT, value_hint = ValueHint::Url)]
    pub endpoint: String,
}

impl DownloadSchema {
    pub fn options(&self, cwd: &Path) -> Result<SchemaDownloadOptions, Error> {
        let endpoint = options::parse_endpoint(&self.endpoint)?;
        Ok(SchemaDownloadOptions {
            endpoint,
            output_dir: resolve(&self.output_dir, cwd),
            tool_dir: resolve(&self.ts_cli_output_dir, cwd),
        })
    }

    pub fn run(&self, cwd: &Path, toolchain: &impl Toolchain) -> Result<(), Error> {
        let options = self.options(cwd)?;
        log::info!("-o: {}", options.output_dir);
        log::info!("-t: {}", options.tool_dir);

        ensure_directory_exists(&options.output_dir)?;
        ensure_directory_exists(&options.tool_dir)?;

        toolchain.download_schema(&options)?;
        log::info!("schema written to {}", options.schema_file().display());
        Ok(())
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessModifier {
    Public,
    Internal,
    None,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CustomScalarFormat {
    /// Uses a default type instead of a custom scalar.
    None,
    /// Use your own types for custom scalars.
    Passthrough,
    /// Use your own types for custom scalars with a prefix.
    #[value(name = "passthroughWithPrefix")]
    PassthroughWithPrefix,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Single,
    Multiple,
}

#[derive(Args, Debug)]
pub struct GenerateCode {
    /// The directory that the TypeScript CLI can be found.
    #[arg(short = 't', long = "ts-cli-dir", value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub ts_cli_dir: String,

    /// The path to the schema.json file
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub schema: String,

    /// The output style. Defaults to a single file.
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Single)]
    pub output_format: OutputFormat,

    /// The path to the output file or directory, depending on the value of `--output-format`.
    #[arg(short, long, value_name = "PATH", value_hint = ValueHint::AnyPath)]
    pub output: String,

    /// The Swift access modifier that should be used.
    #[arg(short, long, value_enum, default_value_t = AccessModifier::Public)]
    pub access_modifier: AccessModifier,

    /// The namespace that should be used for the generated types.
    #[arg(long, value_name = "NAME")]
    pub namespace: Option<String>,

    /// How custom scalar types should be handled.
    #[arg(long, value_enum, default_value_t = CustomScalarFormat::None)]
    pub custom_scalar_format: CustomScalarFormat,

    /// The prefix to use for custom scalar types when `--custom-scalar-format` is set to `passthroughWithPrefix`.
    #[arg(long, value_name = "PREFIX")]
    pub custom_scalar_prefix: Option<String>,

    /// Parse all input files, but only output generated code for the file at this path.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub only: Option<String>,

    /// Path to an operation id JSON map file. If specified, also stores the operation ids (hashes)
    /// as properties on operation types.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub operation_ids_path: Option<String>,

    /// Omit deprecated enum cases from the generated code.
    #[arg(long)]
    pub omit_deprecated_enum_cases: bool,

    /// [EXPERIMENTAL] Use the Swift codegen subsystem instead of the TypeScript CLI.
    #[arg(long, alias = "use-swift-codegen-engine")]
    pub use_swift_codegen_enginer: bool,

    /// The path or glob pattern for the `.graphql` files that should be included.
    #[arg(default_value = DEFAULT_INCLUDES)]
    pub includes: String,
}

impl GenerateCode {
    /// Assembles the codegen options. Fails before touching the file system.
    pub fn options(&self, cwd: &Path) -> Result<CodegenOptions, Error> {
        let custom_scalars =
            CustomScalarPolicy::new(self.custom_scalar_format, self.custom_scalar_prefix.clone())?;

        Ok(CodegenOptions {
            schema: resolve(&self.schema, cwd),
            output: OutputTarget::new(self.output_format, resolve(&self.output, cwd)),
            access_modifier: self.access_modifier.into(),
            namespace: self.namespace.clone(),
            custom_scalars,
            only: self.only.as_ref().map(|path| resolve(path, cwd)),
            operation_ids: self.operation_ids_path.as_ref().map(|path| resolve(path, cwd)),
            omit_deprecated_enum_cases: self.omit_deprecated_enum_cases,
            engine: CodegenEngine::from_flag(self.use_swift_codegen_enginer),
            includes: self.includes.clone(),
        })
    }

    pub fn tool_dir(&self, cwd: &Path) -> ResolvedPath {
        resolve(&self.ts_cli_dir, cwd)
    }

    pub fn run(&self, cwd: &Path, toolchain: &impl Toolchain) -> Result<(), Error> {
        let options = self.options(cwd)?;
        let tool_dir = self.tool_dir(cwd);
        log::info!("-s: {}", options.schema);
        log::info!("-o: {}", options.output.path());
        log::info!("-t: {tool_dir}");

        ensure_directory_exists(options.output.directory())?;

        toolchain.generate_code(&tool_dir, &options)?;
        Ok(())
    }
}
