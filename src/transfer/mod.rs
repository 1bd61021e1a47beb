//! The file-transfer session protocol: an HTTP server that accepts one file per
//! authenticated session, and the client that drives it.

pub mod client;
pub mod handlers;
pub mod routes;
pub mod server;

pub use client::{upload_file, Connector, HttpConnector, HttpSession, TransferSession};
pub use server::{ServerOptions, ServerState, TransferServer};
