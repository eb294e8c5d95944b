//! The external generator.
//!
//! [`ApolloCli`] drives the TypeScript Apollo CLI (`apollo/bin/run` inside
//! the tool directory), downloading and unpacking it first when needed.

use crate::{
    options::{
        AccessModifier, CodegenEngine, CodegenOptions, CustomScalarPolicy, SchemaDownloadOptions,
    },
    paths::ResolvedPath,
};
use std::{
    ffi::{OsStr, OsString},
    fs, io,
    path::{Path, PathBuf},
    process::{Command, ExitStatus},
};
use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;

/// Legacy CLI build for the host platform.
pub const DEFAULT_CLI_URL: &str = if cfg!(target_os = "macos") {
    "https://install.apollographql.com/legacy-cli/darwin/2.33.9"
} else if cfg!(windows) {
    "https://install.apollographql.com/legacy-cli/windows/2.33.9"
} else {
    "https://install.apollographql.com/legacy-cli/linux/2.33.9"
};

const ARCHIVE_NAME: &str = "apollo.tar.gz";

#[derive(Error, Debug)]
pub enum ToolchainError {
    #[error("the Apollo CLI was not found at {}", .0.display())]
    MissingCli(PathBuf),

    #[error("failed to download the Apollo CLI from {url}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("SHA-256 of {} is {actual}, expected {expected}", .path.display())]
    Checksum {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("failed to launch `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{program}` exited with {status}")]
    ExitStatus { program: String, status: ExitStatus },

    #[error("I/O error at {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ToolchainError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_owned(),
            source,
        }
    }
}

/// Schema download and code generation, as consumed by the commands.
///
/// Both calls block until the work is finished. There is no timeout.
pub trait Toolchain {
    fn download_schema(&self, options: &SchemaDownloadOptions) -> Result<(), ToolchainError>;

    fn generate_code(
        &self,
        tool_dir: &ResolvedPath,
        options: &CodegenOptions,
    ) -> Result<(), ToolchainError>;
}

pub struct ApolloCli {
    cli_url: Url,
    sha256: Option<String>,
    working_dir: PathBuf,
}

impl ApolloCli {
    /// `working_dir` is where the CLI runs, so relative include globs match
    /// from there.
    pub fn new(cli_url: Url, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            cli_url,
            sha256: None,
            working_dir: working_dir.into(),
        }
    }

    /// Requires the CLI archive to hash to `sha256` (hex) before it is unpacked.
    pub fn with_sha256(mut self, sha256: Option<String>) -> Self {
        self.sha256 = sha256.map(|hash| hash.trim().to_ascii_lowercase());
        self
    }

    /// Returns the CLI entry point, installing it into `tool_dir` if missing.
    pub fn ensure_installed(&self, tool_dir: &Path) -> Result<PathBuf, ToolchainError> {
        let entry_point = entry_point(tool_dir);
        if entry_point.is_file() {
            return Ok(entry_point);
        }

        fs::create_dir_all(tool_dir).map_err(ToolchainError::io(tool_dir))?;

        let archive = tool_dir.join(ARCHIVE_NAME);
        if !archive.is_file() {
            self.download_archive(&archive)?;
        }
        self.verify_archive(&archive)?;

        log::info!("extracting {}", archive.display());
        let mut tar = Command::new("tar");
        tar.arg("-xzf").arg(&archive).arg("-C").arg(tool_dir);
        execute(tar)?;

        if entry_point.is_file() {
            Ok(entry_point)
        } else {
            Err(ToolchainError::MissingCli(entry_point))
        }
    }

    fn download_archive(&self, archive: &Path) -> Result<(), ToolchainError> {
        log::info!("downloading the Apollo CLI from {}", self.cli_url);
        let download_err = |source: reqwest::Error| ToolchainError::Download {
            url: self.cli_url.to_string(),
            source,
        };

        let mut response = reqwest::blocking::get(self.cli_url.clone())
            .and_then(|response| response.error_for_status())
            .map_err(download_err)?;

        // Only a complete download gets the real name.
        let partial = archive.with_extension("part");
        let mut file = fs::File::create(&partial).map_err(ToolchainError::io(&partial))?;
        if let Err(source) = response.copy_to(&mut file) {
            drop(file);
            let _ = fs::remove_file(&partial);
            return Err(download_err(source));
        }
        drop(file);
        fs::rename(&partial, archive).map_err(ToolchainError::io(archive))
    }

    /// Checks the archive against the configured hash, deleting it on mismatch.
    fn verify_archive(&self, archive: &Path) -> Result<(), ToolchainError> {
        let actual = sha256_file(archive)?;
        let Some(expected) = &self.sha256 else {
            log::warn!(
                "no checksum configured for the Apollo CLI, {} has SHA-256 {actual}",
                archive.display()
            );
            return Ok(());
        };

        if *expected == actual {
            log::debug!("{} matches SHA-256 {actual}", archive.display());
            return Ok(());
        }

        fs::remove_file(archive).map_err(ToolchainError::io(archive))?;
        Err(ToolchainError::Checksum {
            path: archive.to_owned(),
            expected: expected.clone(),
            actual,
        })
    }

    fn command(&self, entry_point: &Path) -> Command {
        let mut command = Command::new(entry_point);
        command.current_dir(&self.working_dir);
        command
    }
}

fn sha256_file(path: &Path) -> Result<String, ToolchainError> {
    let mut file = fs::File::open(path).map_err(ToolchainError::io(path))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(ToolchainError::io(path))?;
    Ok(format!("{:x}", hasher.finalize()))
}

impl Toolchain for ApolloCli {
    fn download_schema(&self, options: &SchemaDownloadOptions) -> Result<(), ToolchainError> {
        let entry_point = self.ensure_installed(&options.tool_dir)?;
        let mut command = self.command(&entry_point);
        command.args(download_schema_args(options));
        execute(command)
    }

    fn generate_code(
        &self,
        tool_dir: &ResolvedPath,
        options: &CodegenOptions,
    ) -> Result<(), ToolchainError> {
        if options.access_modifier != AccessModifier::Public {
            log::warn!(
                "the TypeScript CLI always emits public types, ignoring access modifier {:?}",
                options.access_modifier
            );
        }

        let entry_point = self.ensure_installed(tool_dir)?;
        let mut command = self.command(&entry_point);
        command.args(codegen_args(options));
        execute(command)
    }
}

fn entry_point(tool_dir: &Path) -> PathBuf {
    let run = if cfg!(windows) { "run.cmd" } else { "run" };
    tool_dir.join("apollo").join("bin").join(run)
}

fn flag(name: &str, value: impl AsRef<OsStr>) -> OsString {
    let mut flag = OsString::from(name);
    flag.push("=");
    flag.push(value);
    flag
}

pub fn download_schema_args(options: &SchemaDownloadOptions) -> Vec<OsString> {
    vec![
        "client:download-schema".into(),
        flag("--endpoint", options.endpoint.as_str()),
        options.schema_file().into(),
    ]
}

pub fn codegen_args(options: &CodegenOptions) -> Vec<OsString> {
    let target = match options.engine {
        CodegenEngine::TypeScript => "swift",
        CodegenEngine::ExperimentalNative => "json-modern",
    };

    let mut args: Vec<OsString> = vec![
        "codegen:generate".into(),
        flag("--target", target),
        "--addTypename".into(),
        flag("--includes", &options.includes),
        flag("--localSchemaFile", options.schema.as_path()),
    ];

    if let Some(namespace) = &options.namespace {
        args.push(flag("--namespace", namespace));
    }
    if let Some(only) = &options.only {
        args.push(flag("--only", only.as_path()));
    }
    if let Some(operation_ids) = &options.operation_ids {
        args.push(flag("--operationIdsPath", operation_ids.as_path()));
    }
    if options.omit_deprecated_enum_cases {
        args.push("--omitDeprecatedEnumCases".into());
    }

    match &options.custom_scalars {
        CustomScalarPolicy::None => {}
        CustomScalarPolicy::Passthrough => args.push("--passthroughCustomScalars".into()),
        CustomScalarPolicy::PassthroughWithPrefix(prefix) => {
            args.push("--passthroughCustomScalars".into());
            args.push(flag("--customScalarsPrefix", prefix));
        }
    }

    args.push(options.output.path().as_os_str().to_owned());
    args
}

fn execute(mut command: Command) -> Result<(), ToolchainError> {
    log::debug!("running {command:?}");
    let program = command.get_program().to_string_lossy().into_owned();
    let status = command.status().map_err(|source| ToolchainError::Spawn {
        program: program.clone(),
        source,
    })?;

    if status.success() {
        Ok(())
    } else {
        Err(ToolchainError::ExitStatus { program, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{options::OutputTarget, paths::resolve};

    // normalized, so joins below match what `resolve` produces on every platform
    fn cwd() -> PathBuf {
        resolve("/work", Path::new("/")).into_path_buf()
    }

    fn minimal_options() -> CodegenOptions {
        CodegenOptions {
            schema: resolve("schema.json", &cwd()),
            output: OutputTarget::SingleFile(resolve("Sources/API.swift", &cwd())),
            access_modifier: AccessModifier::Public,
            namespace: None,
            custom_scalars: CustomScalarPolicy::None,
            only: None,
            operation_ids: None,
            omit_deprecated_enum_cases: false,
            engine: CodegenEngine::TypeScript,
            includes: "./**/*.graphql".into(),
        }
    }

    fn os(s: impl AsRef<OsStr>) -> OsString {
        s.as_ref().to_owned()
    }

    #[test]
    fn minimal_codegen_arguments() {
        let options = minimal_options();
        assert_eq!(
            codegen_args(&options),
            vec![
                os("codegen:generate"),
                os("--target=swift"),
                os("--addTypename"),
                os("--includes=./**/*.graphql"),
                flag("--localSchemaFile", cwd().join("schema.json")),
                os(cwd().join("Sources").join("API.swift")),
            ]
        );
    }

    #[test]
    fn every_optional_codegen_argument() {
        let options = CodegenOptions {
            output: OutputTarget::MultipleFiles(resolve("Generated/", &cwd())),
            namespace: Some("API".into()),
            custom_scalars: CustomScalarPolicy::PassthroughWithPrefix("My".into()),
            only: Some(resolve("Queries/Only.graphql", &cwd())),
            operation_ids: Some(resolve("ids.json", &cwd())),
            omit_deprecated_enum_cases: true,
            engine: CodegenEngine::ExperimentalNative,
            ..minimal_options()
        };

        assert_eq!(
            codegen_args(&options),
            vec![
                os("codegen:generate"),
                os("--target=json-modern"),
                os("--addTypename"),
                os("--includes=./**/*.graphql"),
                flag("--localSchemaFile", cwd().join("schema.json")),
                os("--namespace=API"),
                flag("--only", cwd().join("Queries").join("Only.graphql")),
                flag("--operationIdsPath", cwd().join("ids.json")),
                os("--omitDeprecatedEnumCases"),
                os("--passthroughCustomScalars"),
                os("--customScalarsPrefix=My"),
                os(cwd().join("Generated")),
            ]
        );
    }

    #[test]
    fn passthrough_without_prefix() {
        let options = CodegenOptions {
            custom_scalars: CustomScalarPolicy::Passthrough,
            ..minimal_options()
        };
        let args = codegen_args(&options);
        assert!(args.contains(&os("--passthroughCustomScalars")));
        assert!(!args
            .iter()
            .any(|arg| arg.to_string_lossy().starts_with("--customScalarsPrefix")));
    }

    #[test]
    fn schema_download_arguments() {
        let options = SchemaDownloadOptions {
            endpoint: Url::parse("https://example.com/graphql").unwrap(),
            output_dir: resolve("schema", &cwd()),
            tool_dir: resolve("tools", &cwd()),
        };
        assert_eq!(
            download_schema_args(&options),
            vec![
                os("client:download-schema"),
                os("--endpoint=https://example.com/graphql"),
                os(cwd().join("schema").join("schema.json")),
            ]
        );
    }

    #[test]
    fn installed_cli_is_reused() {
        let tmp = tempfile::tempdir().unwrap();
        let expected = entry_point(tmp.path());
        fs::create_dir_all(expected.parent().unwrap()).unwrap();
        fs::write(&expected, "#!/bin/sh\n").unwrap();

        // the URL is never contacted
        let cli = ApolloCli::new(unreachable_url(), tmp.path());
        assert_eq!(cli.ensure_installed(tmp.path()).unwrap(), expected);
    }

    fn sha256_hex(bytes: &[u8]) -> String {
        format!("{:x}", Sha256::digest(bytes))
    }

    /// A gzipped tarball shaped like the CLI download, with or without the entry point.
    #[cfg(unix)]
    fn cli_archive(with_entry_point: bool) -> Vec<u8> {
        let staging = tempfile::tempdir().unwrap();
        let bin = staging.path().join("apollo").join("bin");
        fs::create_dir_all(&bin).unwrap();
        let file = if with_entry_point { "run" } else { "README" };
        fs::write(bin.join(file), "#!/bin/sh\n").unwrap();

        let archive = staging.path().join("cli.tar.gz");
        let status = Command::new("tar")
            .arg("-czf")
            .arg(&archive)
            .arg("-C")
            .arg(staging.path())
            .arg("apollo")
            .status()
            .unwrap();
        assert!(status.success());
        fs::read(archive).unwrap()
    }

    /// Answers a single HTTP request on loopback with `status` and `body`.
    #[cfg(unix)]
    fn serve_once(status: &'static str, body: Vec<u8>) -> Url {
        use std::{
            io::{Read, Write},
            net::TcpListener,
            thread,
        };

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let read = stream.read(&mut buf).unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..read]);
            }
            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            )
            .unwrap();
            stream.write_all(&body).unwrap();
        });
        Url::parse(&format!("http://{addr}/apollo.tar.gz")).unwrap()
    }

    fn unreachable_url() -> Url {
        Url::parse("http://127.0.0.1:9/unused").unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn downloads_into_missing_tool_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let tool_dir = tmp.path().join("fresh").join("tools");
        let archive = cli_archive(true);
        let sha256 = sha256_hex(&archive);

        let cli = ApolloCli::new(serve_once("200 OK", archive), tmp.path())
            .with_sha256(Some(sha256.to_ascii_uppercase()));
        let installed = cli.ensure_installed(&tool_dir).unwrap();

        assert_eq!(installed, entry_point(&tool_dir));
        assert!(installed.is_file());
        assert!(tool_dir.join(ARCHIVE_NAME).is_file());
        assert!(!tool_dir.join("apollo.tar.part").exists());
    }

    #[cfg(unix)]
    #[test]
    fn failed_download_leaves_nothing_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = ApolloCli::new(serve_once("404 Not Found", Vec::new()), tmp.path());

        let err = cli.ensure_installed(tmp.path()).unwrap_err();
        assert!(matches!(err, ToolchainError::Download { .. }));
        assert!(!tmp.path().join(ARCHIVE_NAME).exists());
        assert!(!tmp.path().join("apollo.tar.part").exists());
    }

    #[cfg(unix)]
    #[test]
    fn archive_without_entry_point_is_missing_cli() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(ARCHIVE_NAME), cli_archive(false)).unwrap();

        let cli = ApolloCli::new(unreachable_url(), tmp.path());
        let err = cli.ensure_installed(tmp.path()).unwrap_err();
        assert!(matches!(err, ToolchainError::MissingCli(path) if path == entry_point(tmp.path())));
        assert!(tmp.path().join("apollo").join("bin").join("README").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn archive_with_matching_checksum_is_extracted() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = cli_archive(true);
        let sha256 = sha256_hex(&archive);
        fs::write(tmp.path().join(ARCHIVE_NAME), archive).unwrap();

        let cli = ApolloCli::new(unreachable_url(), tmp.path()).with_sha256(Some(sha256));
        assert_eq!(
            cli.ensure_installed(tmp.path()).unwrap(),
            entry_point(tmp.path())
        );
    }

    #[test]
    fn mismatching_archive_is_rejected_and_deleted() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join(ARCHIVE_NAME);
        fs::write(&archive, b"not the apollo cli").unwrap();
        let expected = sha256_hex(b"the apollo cli");

        let cli = ApolloCli::new(unreachable_url(), tmp.path()).with_sha256(Some(expected.clone()));
        let err = cli.ensure_installed(tmp.path()).unwrap_err();

        match err {
            ToolchainError::Checksum {
                path,
                expected: wanted,
                actual,
            } => {
                assert_eq!(path, archive);
                assert_eq!(wanted, expected);
                assert_eq!(actual, sha256_hex(b"not the apollo cli"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!archive.exists());
        assert!(!entry_point(tmp.path()).exists());
    }

    #[test]
    fn io_errors_name_the_path() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("tools");
        fs::write(&blocker, "").unwrap();

        let cli = ApolloCli::new(unreachable_url(), tmp.path());
        let err = cli.ensure_installed(&blocker).unwrap_err();

        assert!(err.to_string().contains(&blocker.display().to_string()));
        assert!(matches!(err, ToolchainError::Io { path, .. } if path == blocker));
    }

    #[test]
    fn default_url_matches_host_platform() {
        let platform = if cfg!(target_os = "macos") {
            "/darwin/"
        } else if cfg!(windows) {
            "/windows/"
        } else {
            "/linux/"
        };
        assert!(DEFAULT_CLI_URL.contains(platform));
        Url::parse(DEFAULT_CLI_URL).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn failing_process_reports_exit_status() {
        let err = execute(Command::new("false")).unwrap_err();
        assert!(matches!(err, ToolchainError::ExitStatus { ref program, .. } if program == "false"));
    }

    #[test]
    fn missing_program_reports_spawn_failure() {
        let err = execute(Command::new("apollo-codegen-definitely-not-installed")).unwrap_err();
        assert!(matches!(err, ToolchainError::Spawn { .. }));
    }
}
