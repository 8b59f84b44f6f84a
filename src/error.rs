//! Error types for Drydock
//!
//! All modules use `DrydockResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Drydock operations
pub type DrydockResult<T> = Result<T, DrydockError>;

/// All errors that can occur in Drydock
#[derive(Error, Debug)]
pub enum DrydockError {
    // Build context errors
    #[error("Dependency manifest not found at {0}")]
    ManifestNotFound(PathBuf),

    #[error("Lockfile not found at {0}. Generate it before running the pipeline.")]
    LockfileNotFound(PathBuf),

    // Pipeline stage errors (all fatal to the run)
    #[error("Dependency resolution failed: {reason}")]
    DependencyResolution { reason: String },

    #[error("Compilation failed for {target}: {reason}")]
    Compile { target: String, reason: String },

    #[error("No artifact found at {0} after a successful build")]
    ArtifactMissing(PathBuf),

    #[error("Revision tag collision: {short} already maps to {existing}, refusing to tag {incoming}")]
    TagCollision {
        short: String,
        existing: String,
        incoming: String,
    },

    #[error("Registry push failed for {image}: {reason}")]
    RegistryPush { image: String, reason: String },

    // Recoverable by the next run (cold start), never fatal to a published image
    #[error("Cache promotion failed: {reason}")]
    CachePromotion { reason: String },

    // Tag/reference errors
    #[error("Invalid repository name '{name}': {reason}")]
    RepositoryInvalid { name: String, reason: String },

    #[error("Revision id '{0}' is too short for a revision tag")]
    RevisionTooShort(String),

    // Registry environment errors
    #[error("Registry credential not set: environment variable {0} is empty or missing")]
    CredentialMissing(String),

    #[error("Required tool not found: {name}. {hint}")]
    ToolNotFound { name: String, hint: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Run record errors
    #[error("Run not found: {0}")]
    RunNotFound(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl DrydockError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Whether the next pipeline run can proceed normally after this error.
    ///
    /// Only cache promotion qualifies: the image is already published and the
    /// next run cold-starts from an empty store.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::CachePromotion { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::LockfileNotFound(_) => Some("Run your package manager's lock step first"),
            Self::CredentialMissing(_) => Some("Export the registry token before running"),
            Self::ToolNotFound { .. } => None,
            Self::CachePromotion { .. } => {
                Some("The published image is unaffected; the next run will cold-start")
            }
            _ => None,
        }
    }
}
