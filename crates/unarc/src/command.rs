//! Structured engine commands and their argument-vector serialization.
//!
//! The engine parses its arguments positionally:
//!
//! ```text
//! <op> [flags...] -- <archive> [selector...]
//! ```
//!
//! A [`Command`] is built through one factory per operation, each accepting
//! only the modifiers that operation understands, and serialized with
//! [`Command::arguments`].

use crate::error::{Result, UnarcError};
use serde::{Deserialize, Serialize};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

const BASE_DIR_FLAG: &str = "-ap";
const DESTINATION_FLAG: &str = "-dp";
const TEMP_PATH_FLAG: &str = "-w";
pub(crate) const PASSWORD_FLAG: &str = "-p";
const MEMORY_LIMIT_FLAG: &str = "-ld";
const OVERWRITE_ALWAYS_FLAG: &str = "-o+";
const OVERWRITE_NEVER_FLAG: &str = "-o-";
const NO_ARC_EXTENSION_FLAG: &str = "--noarcext";
const CONFIG_FLAG: &str = "--cfg";
const END_OF_OPTIONS: &str = "--";

/// Operation performed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// List archive contents
    List,

    /// Extract every file into a single directory, dropping stored paths
    ExtractFlat,

    /// Extract files keeping their stored paths
    ExtractWithPaths,

    /// Verify archive integrity
    Test,
}

impl CommandKind {
    /// Single-character operation code.
    pub fn code(self) -> char {
        match self {
            CommandKind::List => 'l',
            CommandKind::ExtractFlat => 'e',
            CommandKind::ExtractWithPaths => 'x',
            CommandKind::Test => 't',
        }
    }
}

/// How the engine treats files that already exist at the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    /// Replace existing files without asking
    Always,

    /// Keep existing files without asking
    Never,

    /// Raise an overwrite request for each conflicting file
    #[default]
    Ask,
}

/// Modifiers accepted by [`Command::list`].
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Password for encrypted archives
    pub password: Option<String>,

    /// Do not append the default archive extension
    pub no_arc_extension: bool,

    /// Names or wildcards restricting the listing
    pub selectors: Vec<String>,
}

/// Modifiers accepted by [`Command::extract`] and [`Command::extract_with_paths`].
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Base directory inside the archive
    pub base_dir: Option<String>,

    /// Directory to extract into
    pub destination: Option<PathBuf>,

    /// Directory for temporary files
    pub temp_path: Option<PathBuf>,

    /// Password for encrypted archives
    pub password: Option<String>,

    /// Memory limit for decompression (e.g. "256m")
    pub memory_limit: Option<String>,

    /// How to handle file conflicts
    pub overwrite: OverwritePolicy,

    /// Do not append the default archive extension
    pub no_arc_extension: bool,

    /// Engine configuration file
    pub config_path: Option<PathBuf>,

    /// Names or wildcards selecting the files to extract
    pub selectors: Vec<String>,
}

/// Modifiers accepted by [`Command::test`].
#[derive(Debug, Clone, Default)]
pub struct TestOptions {
    /// Directory for temporary files
    pub temp_path: Option<PathBuf>,

    /// Password for encrypted archives
    pub password: Option<String>,

    /// Memory limit for decompression
    pub memory_limit: Option<String>,

    /// Do not append the default archive extension
    pub no_arc_extension: bool,

    /// Engine configuration file
    pub config_path: Option<PathBuf>,
}

/// An immutable description of one engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    kind: CommandKind,
    archive: PathBuf,
    selectors: Vec<String>,
    base_dir: Option<String>,
    destination: Option<PathBuf>,
    temp_path: Option<PathBuf>,
    password: Option<String>,
    memory_limit: Option<String>,
    overwrite: OverwritePolicy,
    no_arc_extension: bool,
    config_path: Option<PathBuf>,
}

impl Command {
    fn bare(kind: CommandKind, archive: &Path) -> Self {
        Self {
            kind,
            archive: archive.to_path_buf(),
            selectors: Vec::new(),
            base_dir: None,
            destination: None,
            temp_path: None,
            password: None,
            memory_limit: None,
            overwrite: OverwritePolicy::Ask,
            no_arc_extension: false,
            config_path: None,
        }
    }

    /// List the contents of an archive.
    pub fn list(archive: impl AsRef<Path>, options: ListOptions) -> Self {
        Self {
            selectors: options.selectors,
            password: options.password,
            no_arc_extension: options.no_arc_extension,
            ..Self::bare(CommandKind::List, archive.as_ref())
        }
    }

    /// Extract files into one directory, ignoring stored paths.
    pub fn extract(archive: impl AsRef<Path>, options: ExtractOptions) -> Self {
        Self::extracting(CommandKind::ExtractFlat, archive.as_ref(), options)
    }

    /// Extract files with their stored paths.
    pub fn extract_with_paths(archive: impl AsRef<Path>, options: ExtractOptions) -> Self {
        Self::extracting(CommandKind::ExtractWithPaths, archive.as_ref(), options)
    }

    /// Test archive integrity.
    pub fn test(archive: impl AsRef<Path>, options: TestOptions) -> Self {
        Self {
            temp_path: options.temp_path,
            password: options.password,
            memory_limit: options.memory_limit,
            no_arc_extension: options.no_arc_extension,
            config_path: options.config_path,
            ..Self::bare(CommandKind::Test, archive.as_ref())
        }
    }

    fn extracting(kind: CommandKind, archive: &Path, options: ExtractOptions) -> Self {
        Self {
            selectors: options.selectors,
            base_dir: options.base_dir,
            destination: options.destination,
            temp_path: options.temp_path,
            password: options.password,
            memory_limit: options.memory_limit,
            overwrite: options.overwrite,
            no_arc_extension: options.no_arc_extension,
            config_path: options.config_path,
            ..Self::bare(kind, archive)
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    pub fn selectors(&self) -> &[String] {
        &self.selectors
    }

    /// Serialize into the engine's argument vector.
    ///
    /// Order: operation code, flags (base dir, destination, temp path,
    /// password, memory limit, overwrite, no-extension, config), `--`, the
    /// archive path, then selectors as given. Unset or blank modifiers emit
    /// nothing. A password is only omitted when empty; whitespace is a valid
    /// password. Paths are kept as OS strings; they are encoded for the
    /// engine when the command runs.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCommand` if the archive path is blank or a selector is
    /// empty (the engine reads an empty argument as end of input).
    pub fn arguments(&self) -> Result<Vec<OsString>> {
        let Some(archive) = non_blank_path(&self.archive) else {
            return Err(UnarcError::InvalidCommand(
                "archive path is empty".to_string(),
            ));
        };

        let mut args = vec![OsString::from(self.kind.code().to_string())];

        if let Some(dir) = non_blank(self.base_dir.as_deref()) {
            args.push(flag(BASE_DIR_FLAG, OsStr::new(dir)));
        }
        if let Some(dest) = self.destination.as_deref().and_then(non_blank_path) {
            args.push(flag(DESTINATION_FLAG, dest));
        }
        if let Some(temp) = self.temp_path.as_deref().and_then(non_blank_path) {
            args.push(flag(TEMP_PATH_FLAG, temp));
        }
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            args.push(flag(PASSWORD_FLAG, OsStr::new(password)));
        }
        if let Some(limit) = non_blank(self.memory_limit.as_deref()) {
            args.push(flag(MEMORY_LIMIT_FLAG, OsStr::new(limit)));
        }
        match self.overwrite {
            OverwritePolicy::Always => args.push(OVERWRITE_ALWAYS_FLAG.into()),
            OverwritePolicy::Never => args.push(OVERWRITE_NEVER_FLAG.into()),
            OverwritePolicy::Ask => {}
        }
        if self.no_arc_extension {
            args.push(NO_ARC_EXTENSION_FLAG.into());
        }
        if let Some(config) = self.config_path.as_deref().and_then(non_blank_path) {
            args.push(flag(CONFIG_FLAG, config));
        }

        args.push(END_OF_OPTIONS.into());
        args.push(archive.to_os_string());

        for selector in &self.selectors {
            if selector.is_empty() {
                return Err(UnarcError::InvalidCommand(
                    "selector patterns must not be empty".to_string(),
                ));
            }
            args.push(selector.into());
        }

        Ok(args)
    }
}

fn flag(prefix: &str, value: &OsStr) -> OsString {
    let mut token = OsString::from(prefix);
    token.push(value);
    token
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// A path that is not empty or whitespace. Non-Unicode paths always count.
fn non_blank_path(path: &Path) -> Option<&OsStr> {
    let blank = path.as_os_str().is_empty() || path.to_str().is_some_and(|p| p.trim().is_empty());
    (!blank).then(|| path.as_os_str())
}
