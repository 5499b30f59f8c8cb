//! Error types and handling for PacketCopy
//!
//! Every failure a copy job or a throughput measurement can hit is one variant of
//! [`Error`]. Start-time validation errors are returned to the caller directly;
//! errors raised on the worker end up in the job report.

use std::path::{Path, PathBuf};

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Low severity - operation can continue
    Low,
    /// Medium severity - the current source is skipped
    Medium,
    /// High severity - the job should be aborted
    High,
    /// Critical severity - the engine could not do its work at all
    Critical,
}

/// Main error type for PacketCopy operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// An operation is already running
    #[error("A copy operation is already in progress")]
    Busy,

    /// The registry holds no sources
    #[error("No sources have been registered")]
    NoSources,

    /// The destination path is empty
    #[error("No destination directory was given")]
    NoDestination,

    /// The destination directory could not be created
    #[error("Failed to create destination directory '{path}': {message}")]
    DirectoryCreate {
        /// Directory that could not be created
        path: PathBuf,
        /// Error message from the file system
        message: String,
    },

    /// The source could not be inspected
    #[error("Failed to read metadata of source '{path}': {message}")]
    SourceStat {
        /// Source path
        path: PathBuf,
        /// Error message from the file system
        message: String,
    },

    /// The destination file could not be created or pre-sized
    #[error("Failed to create destination file '{path}': {message}")]
    DestinationCreate {
        /// Destination file path
        path: PathBuf,
        /// Error message from the file system
        message: String,
    },

    /// A packet could not be copied
    #[error("Packet {index} of '{path}' failed: {message}")]
    PacketCopy {
        /// Source path
        path: PathBuf,
        /// Zero-based packet index within the file
        index: u64,
        /// What went wrong
        message: String,
    },

    /// Operation cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// The background worker could not be started
    #[error("Copy worker could not be scheduled: {message}")]
    Scheduling {
        /// Error message from the thread builder
        message: String,
    },

    /// Throughput measurement failed
    #[error("Throughput measurement failed for '{path}': {message}")]
    Measurement {
        /// Measured path
        path: PathBuf,
        /// What went wrong
        message: String,
    },

    /// Packet size outside the supported set
    #[error("Invalid packet size {size}: {message}")]
    InvalidPacketSize {
        /// Requested size in bytes
        size: usize,
        /// Why it was rejected
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any work started
    Validation,
    /// Destination directory or file problems
    Destination,
    /// Source inspection problems
    Source,
    /// Packet transfer failures
    Transfer,
    /// Worker scheduling failures
    Scheduling,
    /// Throughput measurement failures
    Measurement,
    /// Configuration errors
    Config,
    /// Other I/O errors
    Io,
    /// Cancellation
    Cancelled,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Busy | Self::NoSources | Self::NoDestination | Self::InvalidPacketSize { .. } => {
                ErrorKind::Validation
            }
            Self::DirectoryCreate { .. } | Self::DestinationCreate { .. } => ErrorKind::Destination,
            Self::SourceStat { .. } => ErrorKind::Source,
            Self::PacketCopy { .. } => ErrorKind::Transfer,
            Self::Scheduling { .. } => ErrorKind::Scheduling,
            Self::Measurement { .. } => ErrorKind::Measurement,
            Self::Config { .. } => ErrorKind::Config,
            Self::Io { .. } => ErrorKind::Io,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Busy | Self::Cancelled | Self::Measurement { .. } => ErrorSeverity::Low,
            Self::SourceStat { .. } | Self::DestinationCreate { .. } => ErrorSeverity::Medium,
            Self::Io { .. } | Self::Other { .. } => ErrorSeverity::Medium,
            Self::NoSources
            | Self::NoDestination
            | Self::InvalidPacketSize { .. }
            | Self::DirectoryCreate { .. }
            | Self::PacketCopy { .. }
            | Self::Config { .. } => ErrorSeverity::High,
            Self::Scheduling { .. } => ErrorSeverity::Critical,
        }
    }

    /// Check if this error only affects a single source.
    ///
    /// Recoverable errors skip the source (or rank it last) and let the batch go on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SourceStat { .. } | Self::DestinationCreate { .. } | Self::Measurement { .. }
        )
    }

    /// Check if this error is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Create a directory creation error
    pub fn directory_create(path: impl AsRef<Path>, error: &std::io::Error) -> Self {
        Self::DirectoryCreate {
            path: path.as_ref().to_path_buf(),
            message: error.to_string(),
        }
    }

    /// Create a source stat error
    pub fn source_stat(path: impl AsRef<Path>, error: &std::io::Error) -> Self {
        Self::SourceStat {
            path: path.as_ref().to_path_buf(),
            message: error.to_string(),
        }
    }

    /// Create a destination creation error
    pub fn destination_create(path: impl AsRef<Path>, error: &std::io::Error) -> Self {
        Self::DestinationCreate {
            path: path.as_ref().to_path_buf(),
            message: error.to_string(),
        }
    }

    /// Create a packet copy error
    pub fn packet_copy<S: Into<String>>(path: impl AsRef<Path>, index: u64, message: S) -> Self {
        Self::PacketCopy {
            path: path.as_ref().to_path_buf(),
            index,
            message: message.into(),
        }
    }

    /// Create a measurement error
    pub fn measurement<S: Into<String>>(path: impl AsRef<Path>, message: S) -> Self {
        Self::Measurement {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}
