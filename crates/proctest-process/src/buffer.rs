//! Captured output shared between the supervising task and the caller
//!
//! The supervisor only appends; the caller only copies out. Buffers grow
//! monotonically while the process runs.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::state::StreamKind;

#[derive(Debug, Default)]
struct Buffers {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    /// stdout and stderr interleaved in arrival order
    combined: Vec<u8>,
}

/// Cloneable handle onto one process's captured output
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffers {
    inner: Arc<Mutex<Buffers>>,
}

impl CaptureBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk read from `stream`. Input chunks are ignored.
    pub(crate) fn append(&self, stream: StreamKind, chunk: &[u8]) {
        let mut buffers = self.inner.lock();
        match stream {
            StreamKind::Output => buffers.stdout.extend_from_slice(chunk),
            StreamKind::Error => buffers.stderr.extend_from_slice(chunk),
            StreamKind::Input => return,
        }
        buffers.combined.extend_from_slice(chunk);
    }

    pub fn stdout(&self) -> Vec<u8> {
        self.inner.lock().stdout.clone()
    }

    pub fn stderr(&self) -> Vec<u8> {
        self.inner.lock().stderr.clone()
    }

    pub fn combined(&self) -> Vec<u8> {
        self.inner.lock().combined.clone()
    }
}
