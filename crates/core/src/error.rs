use std::path::PathBuf;
use thiserror::Error;

/// Problems met while walking the tree. Logged; the directory contributes no children.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Cannot read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot resolve {path}: {source}")]
    Canonicalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The repository no longer looks processable. The repository is skipped.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Repository path does not exist: {path}")]
    Missing { path: PathBuf },

    #[error("Repository path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("No read permission for repository {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a valid git repository: {path}")]
    NotARepository { path: PathBuf },
}

/// Failure inside one repository's pipeline. The repository is marked failed.
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error collecting data for {repo}: {source:#}")]
    Collect { repo: String, source: anyhow::Error },

    #[error("Error rendering report for {repo}: {source:#}")]
    Render { repo: String, source: anyhow::Error },

    #[error("Processing {repo} panicked: {message}")]
    Panicked { repo: String, message: String },
}

/// Conditions that abort the whole run before any repository is processed
#[derive(Error, Debug)]
pub enum FatalError {
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("No such configuration key: {key}")]
    UnknownConfigKey { key: String },

    #[error("Invalid value {value:?} for configuration key {key}")]
    InvalidConfigValue { key: String, value: String },

    #[error("Cannot load configuration file {path}: {source:#}")]
    ConfigFile { path: PathBuf, source: anyhow::Error },

    #[error("Scan path does not exist: {path}")]
    RootNotFound { path: PathBuf },

    #[error("Scan path is not a directory: {path}")]
    RootNotDirectory { path: PathBuf },

    #[error("Cannot use output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No git repositories found under {root}")]
    NoRepositories { root: PathBuf },
}

pub type Result<T, E = FatalError> = std::result::Result<T, E>;
