//! Host file discovery.
//!
//! The hosts directory is laid out as one subdirectory per environment:
//!
//! ```text
//! hosts_directory/
//! ├── prod/
//! │   ├── hosts_web
//! │   └── hosts_db
//! ├── acc/
//! │   └── hosts.ini
//! ├── group_vars/      (passed through, never scanned)
//! └── hosts_legacy     (flat layout, no environment directory)
//! ```

use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::GitHostsConfig;
use crate::error::{Error, InventoryWarning, Result};

/// Directories that are never treated as environments
const PASSTHROUGH_DIRS: &[&str] = &["group_vars", "host_vars"];

/// A host file together with the environment directory it was found in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Environment directory name, `None` for files at the root
    pub environment_dir: Option<String>,
    /// Full path of the host file
    pub path: PathBuf,
}

/// Output of a directory scan
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Host files in scan order
    pub files: Vec<ScannedFile>,
    /// Rejected environment directory names
    pub warnings: Vec<InventoryWarning>,
}

impl ScanResult {
    /// Number of host files found
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no host files were found
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Finds host files below the hosts directory
#[derive(Debug, Clone)]
pub struct FileScanner {
    root: PathBuf,
    environment_dirs: Option<Vec<String>>,
    patterns: Vec<glob::Pattern>,
}

impl FileScanner {
    /// Create a scanner; fails if a pattern is not a valid glob
    pub fn new(
        root: impl Into<PathBuf>,
        environment_dirs: Option<Vec<String>>,
        patterns: &[String],
    ) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p)
                    .map_err(|e| Error::config(format!("invalid host file pattern '{}': {}", p, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            root: root.into(),
            environment_dirs,
            patterns,
        })
    }

    /// Create a scanner from an inventory source configuration
    pub fn from_config(config: &GitHostsConfig) -> Result<Self> {
        Self::new(
            config.hosts_directory.clone(),
            config.environment_dirs.clone(),
            &config.hosts_file_patterns,
        )
    }

    /// Root directory being scanned
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scan for host files.
    ///
    /// Environment directories are visited in configured order (lexical
    /// order when auto-discovered), files within a directory in lexical
    /// order, followed by matching files at the root itself.
    pub fn scan(&self) -> Result<ScanResult> {
        if !self.root.exists() {
            return Err(Error::DirectoryNotFound {
                path: self.root.clone(),
            });
        }
        if !self.root.is_dir() {
            return Err(Error::NotADirectory {
                path: self.root.clone(),
            });
        }

        let mut result = ScanResult::default();

        let env_dirs = match &self.environment_dirs {
            Some(dirs) => dirs.clone(),
            None => self.discover_environment_dirs(),
        };

        for env_dir in env_dirs {
            if env_dir.contains("..") || Path::new(&env_dir).is_absolute() {
                let warning = InventoryWarning::UnsafeEnvironmentDir { name: env_dir };
                warning.log();
                result.warnings.push(warning);
                continue;
            }
            if env_dir.trim().is_empty() {
                debug!("Skipping empty environment directory name");
                continue;
            }

            let env_path = self.root.join(&env_dir);
            if !env_path.is_dir() {
                debug!("Environment directory does not exist: {}", env_path.display());
                continue;
            }

            let files = self.matching_files(&env_path);
            if files.is_empty() {
                debug!("No hosts files found in {}", env_path.display());
                continue;
            }

            info!("Found {} hosts files in {}", files.len(), env_dir);
            result
                .files
                .extend(files.into_iter().map(|path| ScannedFile {
                    environment_dir: Some(env_dir.clone()),
                    path,
                }));
        }

        let root_files = self.matching_files(&self.root);
        if !root_files.is_empty() {
            info!("Found {} hosts files at the root", root_files.len());
        }
        result
            .files
            .extend(root_files.into_iter().map(|path| ScannedFile {
                environment_dir: None,
                path,
            }));

        Ok(result)
    }

    /// Subdirectories of the root that may hold environments
    fn discover_environment_dirs(&self) -> Vec<String> {
        WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(String::from))
            .filter(|name| !name.starts_with('.') && !PASSTHROUGH_DIRS.contains(&name.as_str()))
            .collect()
    }

    /// Regular files directly inside `dir` whose name matches any pattern
    fn matching_files(&self, dir: &Path) -> Vec<PathBuf> {
        WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(|name| self.patterns.iter().any(|p| p.matches(name)))
                    .unwrap_or(false)
            })
            .map(|entry| entry.into_path())
            .collect()
    }
}
