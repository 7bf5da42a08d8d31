//! # saferpc client
//!
//! Minimal HTTP client for saferpc endpoints. It declares its own
//! serialization mode through the `X-RPC-Safe*` headers and decodes results
//! according to the mode the server reports back.
//!
//! ```rust,no_run
//! use saferpc_client::RpcClient;
//! use saferpc_codec::RichValue;
//! use serde_json::json;
//!
//! # async fn run() -> saferpc_client::ClientResult<()> {
//! let client = RpcClient::builder("http://127.0.0.1:8000/rpc")
//!     .safe_enabled(true)
//!     .build()?;
//! let sum = client.call("add", RichValue::from(json!({"a": 5, "b": 3}))).await?;
//! println!("{:?}", sum);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;

pub use client::{BatchCall, RpcClient, RpcClientBuilder};
pub use error::{ClientError, ClientResult};
