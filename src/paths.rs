use crate::Error;
use std::{
    fmt, fs,
    ops::Deref,
    path::{Component, Path, PathBuf},
};

/// An absolute path with no `.` or `..` segments.
///
/// Only [`resolve`] constructs one, so holding a `ResolvedPath` means the
/// working directory has already been applied.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResolvedPath(PathBuf);

impl ResolvedPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl Deref for ResolvedPath {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Resolves `raw` against `cwd` and normalizes the result lexically.
///
/// Absolute inputs ignore `cwd`. Nothing touches the file system, so
/// symlinks are not followed and missing paths are fine. `..` at the root
/// stays at the root.
pub fn resolve(raw: impl AsRef<Path>, cwd: &Path) -> ResolvedPath {
    let joined = cwd.join(raw);
    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(segment) => normalized.push(segment),
        }
    }
    ResolvedPath(normalized)
}

/// Creates `path` and any missing parents unless it is already a directory.
pub fn ensure_directory_exists(path: &Path) -> Result<(), Error> {
    if path.is_dir() {
        return Ok(());
    }
    if path.exists() {
        return Err(Error::NotADirectory(path.to_owned()));
    }

    log::debug!("creating directory {}", path.display());
    fs::create_dir_all(path).map_err(|source| Error::CreateDirectory {
        path: path.to_owned(),
        source,
    })
}
