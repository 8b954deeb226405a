//! Wire-level access to a remote inference engine.
//!
//! The engine speaks the KServe v2 HTTP protocol with the binary tensor
//! extension; readiness of a deployment is read from a Ray-style serve
//! controller when one is configured.

pub mod binary;
pub mod client;
pub mod engine;
pub mod error;
pub mod schemas;

pub use client::EngineClient;
pub use engine::InferenceEngine;
pub use error::ClientError;
