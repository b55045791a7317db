use ignore::WalkBuilder;
use orca_code_chunker::Language;
use std::path::{Path, PathBuf};

const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 1_048_576; // 1 MB

/// Knobs for [`FileScanner`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    pub max_file_size_bytes: u64,
    pub include_hidden: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            include_hidden: false,
        }
    }
}

/// Scanner for finding source files in a project
pub struct FileScanner {
    root: PathBuf,
    options: ScanOptions,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self::with_options(root, ScanOptions::default())
    }

    pub fn with_options(root: impl AsRef<Path>, options: ScanOptions) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            options,
        }
    }

    /// Scan directory for source files (.gitignore aware), sorted by path
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let root = self.root.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(!self.options.include_hidden)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            // honour .gitignore files even outside a git checkout
            .require_git(false);
        builder.filter_entry(move |entry| !Self::is_ignored_scope(entry.path(), &root));

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }

                    let path = entry.path();
                    if let Ok(meta) = entry.metadata() {
                        if meta.len() > self.options.max_file_size_bytes {
                            log::debug!(
                                "Skipping large file {} ({} bytes > {})",
                                path.display(),
                                meta.len(),
                                self.options.max_file_size_bytes
                            );
                            continue;
                        }
                    }

                    if !Self::is_source_file(path) {
                        continue;
                    }

                    files.push(path.to_path_buf());
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        files.sort();
        log::info!("Found {} source files", files.len());
        files
    }

    /// Files the chunker can detect a language for
    fn is_source_file(path: &Path) -> bool {
        Language::from_path(path) != Language::Unknown
    }

    fn is_ignored_scope(path: &Path, root: &Path) -> bool {
        if let Ok(relative) = path.strip_prefix(root) {
            for component in relative.components() {
                if let std::path::Component::Normal(name) = component {
                    let lowered = name.to_string_lossy().to_lowercase();
                    if IGNORED_SCOPES.iter().any(|ignored| ignored == &lowered) {
                        return true;
                    }
                }
            }
        }
        false
    }
}

const IGNORED_SCOPES: &[&str] = &[
    // VCS / tooling
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    // caches / builds
    ".cache",
    "node_modules",
    ".next",
    "build",
    "dist",
    "coverage",
    "target",
    ".venv",
    "venv",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    "__pycache__",
    // vendored code
    "vendor",
    "third_party",
    "third-party",
];
