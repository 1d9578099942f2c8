//! The seam between the router core and the frame transport.

use std::sync::{
    Arc,
    Mutex,
};

use crate::Result;

/// An interface for handing frames to the underlying link transport.
///
/// Transmission is fire-and-forget from the router's perspective: a failure
/// is reported back once, logged by the caller, and never retried. Frame
/// reception is push based and does not go through this trait; the embedding
/// program feeds inbound frames to the router directly.
pub trait Transport {
    /// Queues a complete Ethernet frame for transmission on the named
    /// interface.
    fn transmit(&mut self, frame: &[u8], egress: &str) -> Result<()>;
}

/// A transport that records transmitted frames, for tests.
///
/// Clones share the same frame log, so a test can keep a handle while the
/// router owns another clone.
#[derive(Clone, Debug, Default)]
pub struct MockTransport {
    frames: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl MockTransport {
    pub fn new() -> MockTransport {
        MockTransport {
            frames: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns copies of all (egress interface, frame) pairs transmitted so
    /// far, in transmission order.
    pub fn transmitted(&self) -> Vec<(String, Vec<u8>)> {
        self.frames.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.frames.lock().unwrap().clear();
    }
}

impl Transport for MockTransport {
    fn transmit(&mut self, frame: &[u8], egress: &str) -> Result<()> {
        self.frames
            .lock()
            .unwrap()
            .push((egress.to_string(), frame.to_vec()));
        Ok(())
    }
}
