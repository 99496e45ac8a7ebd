//! The random stream capability and its shared handle.

use std::fmt;
use std::sync::{Arc, Mutex};

/// A source of numeric samples.
///
/// One call, one sample. The distribution is the implementor's business;
/// consumers rely only on the order in which samples come out.
pub trait RandomStream {
    /// Draws the next sample.
    fn sample(&mut self) -> f64;
}

/// Shared handle to a random stream.
///
/// Cloning a handle does not fork the stream: every clone draws from the
/// same sequence. Several strategies configured from one script may hold
/// the same handle, and the mutex serialises their calls.
#[derive(Clone)]
pub struct StreamHandle {
    inner: Arc<Mutex<Box<dyn RandomStream + Send>>>,
}

impl StreamHandle {
    /// Wraps a stream into a shareable handle.
    pub fn new<S: RandomStream + Send + 'static>(stream: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(stream))),
        }
    }

    /// Draws the next sample from the underlying stream.
    pub fn sample(&self) -> f64 {
        // A panic inside another holder leaves the stream itself intact.
        let mut stream = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        stream.sample()
    }

    /// Returns true if both handles refer to the same stream.
    pub fn same_stream(&self, other: &StreamHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("holders", &Arc::strong_count(&self.inner))
            .finish()
    }
}

impl<F> RandomStream for F
where
    F: FnMut() -> f64,
{
    fn sample(&mut self) -> f64 {
        self()
    }
}
