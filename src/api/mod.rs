//! # API framework contract
//!
//! The engine-independent side of the bridge. Operation handlers are written
//! against [`ApiContext`] and registered on an [`Api`]; an [`Adapter`] decides
//! how those handlers are reached by an actual HTTP engine.
//!
//! [`ResponseWriter`] and [`ResponseRecorder`] give the API a synchronous
//! request/response entry point for embedding and tests.

mod context;
mod core;
mod operation;
mod writer;

pub use context::ApiContext;
pub use self::core::{Adapter, Api, Config, OperationHandler};
pub use operation::{Operation, ProtoVersion, TlsConnectionState};
pub use writer::{ResponseRecorder, ResponseWriter};
