//! holdersnap-rpc: JSON-RPC transport for HolderSnap.
//!
//! - [`RpcTransport`]: async trait every transport implements
//! - [`HttpRpcClient`]: `reqwest`-backed HTTP client with backoff retry
//! - [`RetryPolicy`]: exponential backoff, reusable around any fallible future

pub mod error;
pub mod http;
pub mod request;
pub mod retry;
pub mod transport;

pub use error::TransportError;
pub use http::{HttpClientConfig, HttpRpcClient};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use retry::{RetryConfig, RetryPolicy};
pub use transport::RpcTransport;
