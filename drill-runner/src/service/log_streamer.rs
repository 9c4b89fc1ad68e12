//! Log streamer
//!
//! Collects process output for a single step. Output is cut into batches of
//! roughly `batch_size` bytes; every completed batch is kept in the full
//! transcript and also offered to a live consumer through a bounded channel.
//!
//! The writer never waits for the reader. When the channel is full, or the
//! reader is gone, the live copy of a batch is dropped; the transcript still
//! holds it, so [`LogStreamer::flush`] always returns everything written.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::debug;

/// Default number of batches the live channel holds before dropping
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

#[derive(Default)]
struct StreamState {
    /// Bytes not yet forming a full batch
    pending: Vec<u8>,
    /// Every completed batch, in write order
    history: Vec<u8>,
    /// Batches not delivered live
    dropped: usize,
}

/// Batching sink with a full-history accumulator and a live chunk channel
pub struct LogStreamer {
    batch_size: usize,
    state: Mutex<StreamState>,
    chunks: mpsc::Sender<String>,
}

impl LogStreamer {
    /// Creates a streamer and the receiving end of its live channel
    ///
    /// # Arguments
    /// * `batch_size` - Bytes per emitted chunk (at least 1)
    /// * `capacity` - Chunks buffered for the live consumer (at least 1)
    pub fn new(batch_size: usize, capacity: usize) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let streamer = Arc::new(Self {
            batch_size: batch_size.max(1),
            state: Mutex::new(StreamState::default()),
            chunks: tx,
        });
        (streamer, rx)
    }

    /// Accepts an arbitrary, possibly partial, chunk of output
    pub fn write(&self, bytes: &[u8]) {
        let mut state = self.lock();
        state.pending.extend_from_slice(bytes);

        while state.pending.len() >= self.batch_size {
            let cut = char_boundary(&state.pending, self.batch_size);
            let batch: Vec<u8> = state.pending.drain(..cut).collect();
            state.history.extend_from_slice(&batch);

            let chunk = String::from_utf8_lossy(&batch).into_owned();
            if self.chunks.try_send(chunk).is_err() {
                state.dropped += 1;
                debug!(dropped = state.dropped, "Live log chunk not delivered");
            }
        }
    }

    /// Returns the entire transcript written so far
    ///
    /// Any partial batch is folded into the transcript first; it is not sent
    /// on the live channel.
    pub fn flush(&self) -> String {
        let mut state = self.lock();
        let pending = std::mem::take(&mut state.pending);
        state.history.extend_from_slice(&pending);
        String::from_utf8_lossy(&state.history).into_owned()
    }

    /// Number of batches that could not be delivered live
    pub fn dropped(&self) -> usize {
        self.lock().dropped
    }

    fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Largest cut `<= limit` that does not split a UTF-8 sequence
///
/// Falls back to `limit` when no boundary exists (non-UTF-8 output).
fn char_boundary(bytes: &[u8], limit: usize) -> usize {
    let mut cut = limit.min(bytes.len());
    while cut > 0 && cut < bytes.len() && is_continuation(bytes[cut]) {
        cut -= 1;
    }
    if cut == 0 { limit.min(bytes.len()) } else { cut }
}

fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}
