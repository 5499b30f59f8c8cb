//! Packet copying
//!
//! A packet is copied with a fresh source handle, seeking both files to the
//! packet offset and moving the bytes in sub-chunks no larger than the copy
//! buffer. Cancellation is checked before every sub-chunk.

use crate::buffer::CopyBuffer;
use crate::hint::{create_with_hint, open_with_hint, AccessPattern};
use packetcopy_types::{BufferSize, Error, FileSize, Packet, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Create or truncate the destination file and optionally pre-extend it to
/// `size` bytes
pub fn prepare_destination(path: impl AsRef<Path>, size: FileSize, preallocate: bool) -> Result<File> {
    let path = path.as_ref();
    let file = create_with_hint(path, AccessPattern::Sequential)
        .map_err(|e| Error::destination_create(path, &e))?;

    if preallocate && size > 0 {
        file.set_len(size)
            .map_err(|e| Error::destination_create(path, &e))?;
    }

    debug!("Prepared destination {} ({} bytes)", path.display(), size);
    Ok(file)
}

/// Copies packets through a reusable buffer
#[derive(Debug)]
pub struct PacketCopier {
    buffer: CopyBuffer,
    cancel: CancellationToken,
}

impl PacketCopier {
    /// Create a copier with a buffer of `buffer_size` bytes that stops when
    /// `cancel` fires
    pub fn new(buffer_size: BufferSize, cancel: CancellationToken) -> Self {
        Self {
            buffer: CopyBuffer::new(buffer_size),
            cancel,
        }
    }

    /// Copy `packet` from `source` to the same offset of `dest`.
    ///
    /// Returns the number of bytes copied, which always equals `packet.len` on
    /// success.
    pub fn copy_packet(&mut self, source: &Path, dest: &mut File, packet: Packet) -> Result<u64> {
        let fail = |message: String| Error::packet_copy(source, packet.index, message);

        let mut src = open_with_hint(source, AccessPattern::Sequential)
            .map_err(|e| fail(format!("open failed: {}", e)))?;
        src.seek(SeekFrom::Start(packet.offset))
            .map_err(|e| fail(format!("source seek failed: {}", e)))?;
        dest.seek(SeekFrom::Start(packet.offset))
            .map_err(|e| fail(format!("destination seek failed: {}", e)))?;

        let length = packet.len as u64;
        let mut total = 0u64;

        while total < length {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let chunk = self.buffer.chunk_len(length - total);
            let read = src
                .read(self.buffer.slice_mut(chunk))
                .map_err(|e| fail(format!("read failed at byte {}: {}", packet.offset + total, e)))?;
            if read == 0 {
                return Err(fail(format!(
                    "source ended at byte {}",
                    packet.offset + total
                )));
            }

            dest.write_all(self.buffer.slice(read))
                .map_err(|e| fail(format!("short write at byte {}: {}", packet.offset + total, e)))?;
            total += read as u64;

            if read < chunk {
                break;
            }
        }

        if total < length {
            return Err(fail(format!("copied {} of {} bytes", total, length)));
        }

        Ok(total)
    }

    /// The cancellation token this copier observes
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}
