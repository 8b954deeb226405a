//! Engine schemas
//!
//! - [`infer`] - Inference request and response messages
//! - [`model`] - Model metadata and configuration
//! - [`serve`] - Deployment status reported by the serve controller

pub mod infer;
pub mod model;
pub mod serve;

pub use infer::*;
pub use model::*;
pub use serve::*;
