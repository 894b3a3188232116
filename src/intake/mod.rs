//! Request intake over HTTP.

#[cfg(feature = "cli")]
pub mod client;
pub mod http;

pub use http::{IntakeState, StatusResponse, bind, router, serve};
