//! Result type alias for PacketCopy operations

use crate::Error;

/// Result type alias for PacketCopy operations
pub type Result<T> = std::result::Result<T, Error>;
