use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::types::{Result, ReviewError, ReviewFile};

/// Hard cap on files loaded for review (1MB)
const DEFAULT_MAX_FILE_SIZE: u64 = 1_048_576;

/// Bytes inspected for NUL when detecting binary content
const BINARY_SNIFF_LEN: usize = 8_000;

pub struct FileScanner {
    root: PathBuf,
    exclude: Vec<glob::Pattern>,
    max_file_size: u64,
}

impl FileScanner {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            exclude: Vec::new(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Glob patterns matched against the path relative to the root.
    /// Invalid patterns are skipped with a warning.
    pub fn with_exclude(mut self, patterns: &[String]) -> Self {
        self.exclude = patterns
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!(pattern = %p, error = %e, "Ignoring invalid exclude pattern");
                    None
                }
            })
            .collect();
        self
    }

    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Candidate files under the root, sorted by path
    pub fn scan(&self) -> Result<Vec<ScannedFile>> {
        if !self.root.exists() {
            return Err(ReviewError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("path not found: {}", self.root.display()),
            )));
        }

        let mut files = Vec::new();

        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .follow_links(false) // Security: prevent symlink traversal attacks
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        for entry in walker.filter_map(|e| e.ok()) {
            let path = entry.path();

            if !path.is_file() {
                continue;
            }

            let relative = self.relative_path(path);
            if self.should_exclude(&relative) {
                continue;
            }

            if let Ok(metadata) = path.metadata() {
                if metadata.len() > self.max_file_size {
                    debug!(path = %relative, size = metadata.len(), "Skipping file over size cap");
                    continue;
                }

                files.push(ScannedFile {
                    path: path.to_path_buf(),
                    relative,
                    size: metadata.len(),
                });
            }
        }

        Ok(files)
    }

    /// Scan and read files as review input.
    ///
    /// Unreadable and binary files are skipped.
    pub fn load(&self) -> Result<Vec<ReviewFile>> {
        let scanned = self.scan()?;
        let mut files = Vec::with_capacity(scanned.len());

        for file in scanned {
            let bytes = match std::fs::read(&file.path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(path = %file.relative, error = %e, "Skipping unreadable file");
                    continue;
                }
            };

            if bytes[..bytes.len().min(BINARY_SNIFF_LEN)].contains(&0) {
                debug!(path = %file.relative, "Skipping binary file");
                continue;
            }

            let content = String::from_utf8_lossy(&bytes).into_owned();
            files.push(ReviewFile::with_size(file.relative, Some(content), file.size));
        }

        debug!(files = files.len(), root = %self.root.display(), "Loaded review candidates");
        Ok(files)
    }

    fn relative_path(&self, path: &Path) -> String {
        let relative = if self.root.is_file() {
            path.file_name().map(Path::new).unwrap_or(path)
        } else {
            path.strip_prefix(&self.root).unwrap_or(path)
        };
        relative.to_string_lossy().replace('\\', "/")
    }

    fn should_exclude(&self, relative: &str) -> bool {
        self.exclude.iter().any(|p| p.matches(relative))
    }
}

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: PathBuf,
    /// Path relative to the scan root, `/`-separated
    pub relative: String,
    pub size: u64,
}
