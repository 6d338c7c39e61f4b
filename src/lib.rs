//! # wirecall
//!
//! A small RPC framework over TCP: call named methods on named services
//! running in another process, with positional arguments and a result,
//! as if they were local.
//!
//! ## Architecture
//!
//! - **Client**: one persistent connection shared by any number of
//!   concurrent callers; a background reader routes each response to the
//!   caller whose request id it carries.
//! - **Server**: accepts many clients, reads requests continuously, and
//!   dispatches them on a bounded worker pool so one slow method never
//!   stalls the connection.
//! - **Wire**: length-prefixed frames carrying MessagePack-encoded
//!   request and response bodies.
//!
//! ## Example
//!
//! ```ignore
//! use wirecall::{RpcClient, Value};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = RpcClient::connect("127.0.0.1:9000").await.unwrap();
//!     let outcome = client
//!         .call("service2", "multiply", vec![Value::I32(10), Value::I32(15)])
//!         .await
//!         .unwrap();
//!     println!("result: {:?}", outcome.value());
//! }
//! ```

pub mod codec;
pub mod error;
pub mod protocol;
pub mod service;
pub mod value;

mod client;
mod dispatch;
mod server;
mod writer;

pub use client::{ClientConfig, RpcClient};
pub use dispatch::Dispatcher;
pub use error::{ErrorKind, Result, RpcError};
pub use server::{Server, ServerConfig};
pub use service::{Service, ServiceBuilder, ServiceRegistry, ServiceRegistryBuilder};
pub use value::{Outcome, Value, ValueKind};
