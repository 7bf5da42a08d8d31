//! HTTP client for saferpc endpoints

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use http::HeaderMap;
use saferpc_codec::{RichValue, SafeOptions, apply_safe_headers, deserialize, safe_options_from_headers, serialize};
use saferpc_json_rpc::{JsonRpcErrorObject, JsonRpcRequest, RequestId};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};

/// One entry of a batch request
#[derive(Debug, Clone)]
pub struct BatchCall {
    pub method: String,
    pub params: RichValue,
    pub notification: bool,
}

impl BatchCall {
    pub fn call(method: impl Into<String>, params: impl Into<RichValue>) -> Self {
        Self {
            method: method.into(),
            params: params.into(),
            notification: false,
        }
    }

    pub fn notify(method: impl Into<String>, params: impl Into<RichValue>) -> Self {
        Self {
            method: method.into(),
            params: params.into(),
            notification: true,
        }
    }
}

/// Builder for [`RpcClient`]
pub struct RpcClientBuilder {
    url: String,
    options: SafeOptions,
    declare_headers: bool,
    timeout: Duration,
}

impl RpcClientBuilder {
    /// Serialization flags used to encode params
    pub fn serialization(mut self, options: SafeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn safe_enabled(mut self, enabled: bool) -> Self {
        self.options = SafeOptions::both(enabled);
        self
    }

    /// Send the `X-RPC-Safe*` headers describing our encoding (default on)
    pub fn declare_headers(mut self, declare: bool) -> Self {
        self.declare_headers = declare;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> ClientResult<RpcClient> {
        let http = reqwest::Client::builder().timeout(self.timeout).build()?;
        Ok(RpcClient {
            url: self.url,
            options: self.options,
            declare_headers: self.declare_headers,
            http,
            next_id: AtomicI64::new(1),
        })
    }
}

/// JSON-RPC over HTTP POST
///
/// Params are encoded with the client's own flags; results are decoded with
/// the flags the server reports in its response headers.
pub struct RpcClient {
    url: String,
    options: SafeOptions,
    declare_headers: bool,
    http: reqwest::Client,
    next_id: AtomicI64,
}

impl RpcClient {
    pub fn builder(url: impl Into<String>) -> RpcClientBuilder {
        RpcClientBuilder {
            url: url.into(),
            options: SafeOptions::default(),
            declare_headers: true,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn new(url: impl Into<String>) -> ClientResult<Self> {
        Self::builder(url).build()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn options(&self) -> &SafeOptions {
        &self.options
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn encode(&self, id: Option<RequestId>, method: String, params: &RichValue) -> ClientResult<Value> {
        let params = (!params.is_null()).then(|| serialize(params, &self.options));
        Ok(serde_json::to_value(JsonRpcRequest::new(id, method, params))?)
    }

    /// Call `method` and wait for its result
    pub async fn call(
        &self,
        method: impl Into<String>,
        params: impl Into<RichValue>,
    ) -> ClientResult<RichValue> {
        let method = method.into();
        let request = self.encode(Some(self.next_request_id()), method.clone(), &params.into())?;
        debug!(method = %method, "Sending JSON-RPC call");

        let Some((envelope, server)) = self.send(&request).await? else {
            return Err(ClientError::InvalidResponse(
                "empty response to a call".to_string(),
            ));
        };
        decode_envelope(envelope, &server)
    }

    /// Send a notification; the server sends nothing back
    pub async fn notify(
        &self,
        method: impl Into<String>,
        params: impl Into<RichValue>,
    ) -> ClientResult<()> {
        let request = self.encode(None, method.into(), &params.into())?;
        if let Some((envelope, _)) = self.send(&request).await? {
            // only structurally invalid notifications get a reply
            if let Some(error) = envelope.get("error") {
                let error: JsonRpcErrorObject = serde_json::from_value(error.clone())?;
                return Err(error.into());
            }
        }
        Ok(())
    }

    /// Send several calls in one request.
    ///
    /// Returns one outcome per non-notification call, in call order. A
    /// rejected batch (for example a failed safe-header check) fails as a
    /// whole.
    pub async fn batch(&self, calls: Vec<BatchCall>) -> ClientResult<Vec<ClientResult<RichValue>>> {
        let mut ids = Vec::new();
        let mut requests = Vec::with_capacity(calls.len());
        for call in calls {
            let id = (!call.notification).then(|| self.next_request_id());
            if let Some(id) = &id {
                ids.push(id.clone());
            }
            requests.push(self.encode(id, call.method, &call.params)?);
        }
        debug!(size = requests.len(), "Sending JSON-RPC batch");

        let Some((envelope, server)) = self.send(&Value::Array(requests)).await? else {
            return Ok(Vec::new());
        };

        let items = match envelope {
            Value::Array(items) => items,
            other => return Err(decode_envelope(other, &server).err().unwrap_or_else(|| {
                ClientError::InvalidResponse("batch answered with a single result".to_string())
            })),
        };

        let matches: Vec<Option<usize>> = ids
            .iter()
            .map(|id| {
                items.iter().position(|item| {
                    item.get("id")
                        .and_then(|v| serde_json::from_value::<RequestId>(v.clone()).ok())
                        .is_some_and(|item_id| &item_id == id)
                })
            })
            .collect();

        if matches.iter().all(Option::is_none)
            && let Some(rejection) = batch_rejection(&items)
        {
            return Err(rejection);
        }

        Ok(ids
            .iter()
            .zip(matches)
            .map(|(id, matching)| match matching {
                Some(index) => decode_envelope(items[index].clone(), &server),
                None => Err(ClientError::InvalidResponse(format!("no response for id {}", id))),
            })
            .collect())
    }

    async fn send(&self, body: &Value) -> ClientResult<Option<(Value, SafeOptions)>> {
        let mut headers = HeaderMap::new();
        if self.declare_headers {
            apply_safe_headers(&mut headers, &self.options);
        }

        let response = self
            .http
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .headers(headers)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let server = safe_options_from_headers(response.headers()).unwrap_or_else(|| {
            debug!("Server did not declare its serialization; decoding plainly");
            SafeOptions::disabled()
        });
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }

        match serde_json::from_slice(&bytes) {
            Ok(envelope) => Ok(Some((envelope, server))),
            Err(err) if !status.is_success() => {
                warn!("Non-JSON response with HTTP {}", status);
                Err(ClientError::InvalidResponse(format!("HTTP {}: {}", status, err)))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// The error a server sends when it refuses a batch as a whole (`id: null`)
fn batch_rejection(items: &[Value]) -> Option<ClientError> {
    items
        .iter()
        .filter(|item| item.get("id").is_none_or(Value::is_null))
        .find_map(|item| item.get("error"))
        .map(|error| match serde_json::from_value::<JsonRpcErrorObject>(error.clone()) {
            Ok(error) => error.into(),
            Err(err) => err.into(),
        })
}

/// Turn a response envelope into a decoded result or a server error
fn decode_envelope(envelope: Value, server: &SafeOptions) -> ClientResult<RichValue> {
    let Value::Object(mut envelope) = envelope else {
        return Err(ClientError::InvalidResponse(
            "response is not a JSON object".to_string(),
        ));
    };

    if let Some(error) = envelope.remove("error") {
        let error: JsonRpcErrorObject = serde_json::from_value(error)?;
        return Err(error.into());
    }
    match envelope.remove("result") {
        Some(result) => Ok(deserialize(result, server)),
        None => Err(ClientError::InvalidResponse(
            "response carries neither result nor error".to_string(),
        )),
    }
}
