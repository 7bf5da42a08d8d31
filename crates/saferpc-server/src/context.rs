//! Per-request execution context and the transport collaborators it carries

use std::any::Any;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use parking_lot::Mutex;
use saferpc_codec::RichValue;
use saferpc_json_rpc::RequestId;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::RpcError;

/// The incoming transport request, as seen by hooks and handlers
#[derive(Debug, Clone, Default)]
pub struct TransportRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub remote_addr: Option<SocketAddr>,
}

impl TransportRequest {
    pub fn new() -> Self {
        Self {
            method: Method::POST,
            ..Self::default()
        }
    }

    pub fn from_parts(parts: &http::request::Parts, remote_addr: Option<SocketAddr>) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            remote_addr,
        }
    }

    /// Add a header; invalid names or values are skipped
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => debug!("Skipping invalid header {}", name),
        }
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Debug, Default)]
struct ResponseParts {
    status: Option<StatusCode>,
    headers: HeaderMap,
}

/// Shared handle onto the outgoing transport response.
///
/// Hooks use it to add headers or override the status; the transport applies
/// it when the envelope is written. Clones refer to the same response, so all
/// items of a batch write into one handle.
#[derive(Debug, Clone, Default)]
pub struct ResponseHandle {
    inner: Arc<Mutex<ResponseParts>>,
}

impl ResponseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_header(&self, name: HeaderName, value: HeaderValue) {
        self.inner.lock().headers.insert(name, value);
    }

    pub fn set_status(&self, status: StatusCode) {
        self.inner.lock().status = Some(status);
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.inner.lock().status
    }

    pub fn headers(&self) -> HeaderMap {
        self.inner.lock().headers.clone()
    }
}

/// Application context handed unmodified to every handler
#[derive(Clone, Default)]
pub struct SharedContext(Option<Arc<dyn Any + Send + Sync>>);

impl SharedContext {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    pub fn empty() -> Self {
        Self(None)
    }

    /// Borrow the context as `T`, if that is what was stored
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|v| v.downcast_ref::<T>())
    }
}

impl fmt::Debug for SharedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedContext")
            .field(&if self.0.is_some() { "<set>" } else { "<empty>" })
            .finish()
    }
}

/// Mutable state for one request (or one batch item) as it moves through the
/// hook chain and the handler.
///
/// Hooks receive `&mut ExecutionContext` and may rewrite any field; later
/// hooks and the handler see those changes.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub request: Arc<TransportRequest>,
    pub response: ResponseHandle,
    pub method: String,
    pub params: RichValue,
    pub shared: SharedContext,
    pub id: Option<RequestId>,
    pub start_time: Instant,
    pub result: Option<RichValue>,
    pub error: Option<RpcError>,
    pub batch_index: Option<usize>,
    pub is_notification: bool,
    /// Free-form values hooks can hand to each other
    pub extensions: Map<String, Value>,
}

impl ExecutionContext {
    pub fn new(
        request: Arc<TransportRequest>,
        response: ResponseHandle,
        shared: SharedContext,
        method: impl Into<String>,
        params: RichValue,
        id: Option<RequestId>,
    ) -> Self {
        let is_notification = id.is_none();
        Self {
            request,
            response,
            method: method.into(),
            params,
            shared,
            id,
            start_time: Instant::now(),
            result: None,
            error: None,
            batch_index: None,
            is_notification,
            extensions: Map::new(),
        }
    }

    pub fn with_batch_index(mut self, index: usize) -> Self {
        self.batch_index = Some(index);
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}
