//! Model Context Protocol handling over stateless request/response exchanges
//!
//! Provides the JSON-RPC envelope and error mapping, the request-scoped session
//! context, and the protocol router itself.

pub mod context;
pub mod rpc;
pub mod server;
