//! # ML Node Client Subsystem
//!
//! Typed remote operations on one ML worker node. Every other subsystem
//! that talks to a worker (the broker's node workers, the validator's
//! artifact forwarding, the orchestrator's PoC stop fan-out) does so
//! through the [`MlNodeClient`] capability defined here; nothing else in
//! the workspace issues HTTP to a worker directly.
//!
//! ## Module Structure
//!
//! ```text
//! ports.rs    - MlNodeClient + MlClientFactory capability traits
//! types.rs    - wire payloads of the worker HTTP API
//! http.rs     - reqwest adapter (production)
//! mock.rs     - counting mock adapter (tests, all subsystems)
//! error.rs    - MlClientError taxonomy
//! ```
//!
//! ## Client Lifetime
//!
//! Clients are created per request from `(poc_url, inference_url)` via the
//! factory; no connection state is cached beyond reqwest's own pool. A
//! client-version refresh is therefore a no-op and safe to repeat.

pub mod error;
pub mod http;
pub mod mock;
pub mod ports;
pub mod types;

pub use error::MlClientError;
pub use http::{HttpClientFactory, HttpMlNodeClient};
pub use mock::{MockClientFactory, MockMlNodeClient};
pub use ports::{MlClientFactory, MlNodeClient};
pub use types::*;
