//! Polled asynchronous tile data requests.
//!
//! A [`RequestHandle`] is the engine's view of one in-flight load. The data
//! source keeps the paired [`RequestResolver`] and completes it from whatever
//! worker does the actual I/O. The engine only ever polls; it never blocks.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Why a request finished without data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("tile data request failed: {0}")]
    Failed(String),
    #[error("tile data request was abandoned before completing")]
    Abandoned,
}

/// Lifecycle of a request. Once finished it never changes again.
#[derive(Debug)]
pub enum RequestState<D> {
    Pending,
    Ready(Arc<D>),
    Failed(RequestError),
}

/// Shared, cheap-to-clone handle to a tile data request.
pub struct RequestHandle<D> {
    state: Arc<Mutex<RequestState<D>>>,
}

impl<D> Clone for RequestHandle<D> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<D> fmt::Debug for RequestHandle<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.state.lock() {
            RequestState::Pending => "pending",
            RequestState::Ready(_) => "ready",
            RequestState::Failed(_) => "failed",
        };
        f.debug_struct("RequestHandle").field("state", &state).finish()
    }
}

impl<D> RequestHandle<D> {
    /// A pending request plus the resolver that completes it.
    pub fn pending() -> (Self, RequestResolver<D>) {
        let handle = Self::with_state(RequestState::Pending);
        let resolver = RequestResolver {
            state: Arc::clone(&handle.state),
        };
        (handle, resolver)
    }

    /// A request that is already finished with `data`.
    pub fn ready(data: D) -> Self {
        Self::with_state(RequestState::Ready(Arc::new(data)))
    }

    /// A request that is already finished with an error.
    pub fn failed(error: RequestError) -> Self {
        Self::with_state(RequestState::Failed(error))
    }

    fn with_state(state: RequestState<D>) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// True once the request has succeeded or failed.
    pub fn is_finished(&self) -> bool {
        !matches!(*self.state.lock(), RequestState::Pending)
    }

    /// True once the request has succeeded.
    pub fn is_ready(&self) -> bool {
        matches!(*self.state.lock(), RequestState::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(*self.state.lock(), RequestState::Failed(_))
    }

    /// Loaded data, if the request succeeded.
    pub fn data(&self) -> Option<Arc<D>> {
        match &*self.state.lock() {
            RequestState::Ready(data) => Some(Arc::clone(data)),
            _ => None,
        }
    }

    /// The failure, if the request failed.
    pub fn error(&self) -> Option<RequestError> {
        match &*self.state.lock() {
            RequestState::Failed(err) => Some(err.clone()),
            _ => None,
        }
    }
}

/// Completes a pending request exactly once.
///
/// Dropping a resolver that never completed fails its request with
/// [`RequestError::Abandoned`], so a lost worker cannot leave a request
/// pending forever.
pub struct RequestResolver<D> {
    state: Arc<Mutex<RequestState<D>>>,
}

impl<D> RequestResolver<D> {
    /// Finish the request with data. Returns `false` if it had already finished.
    pub fn resolve(self, data: D) -> bool {
        self.complete(RequestState::Ready(Arc::new(data)))
    }

    /// Finish the request with an error. Returns `false` if it had already finished.
    pub fn fail(self, error: RequestError) -> bool {
        self.complete(RequestState::Failed(error))
    }

    fn complete(&self, next: RequestState<D>) -> bool {
        let mut state = self.state.lock();
        if matches!(*state, RequestState::Pending) {
            *state = next;
            true
        } else {
            false
        }
    }
}

impl<D> Drop for RequestResolver<D> {
    fn drop(&mut self) {
        self.complete(RequestState::Failed(RequestError::Abandoned));
    }
}
