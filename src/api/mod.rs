//! HTTP API service.
//!
//! Play, wallet, and verification endpoints over the game service, plus a
//! websocket feed for live crash rounds.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod websocket;

pub use server::ApiServer;
