//! Translation between structured per-task inference inputs/outputs and the
//! engine's binary tensor wire format.
//!
//! Everything here is pure: the codec, the request builder and the decoders
//! hold no shared state and may be called from any number of threads.

pub mod client;
pub mod codec;
pub mod decode;
pub mod error;
pub mod input;
pub mod output;
pub mod request;
pub mod task;
pub mod task_output;

pub use client::InferenceClient;
pub use error::{CodecError, DecodeError, InferenceError, RequestError};
pub use input::InferInput;
pub use output::InferOutput;
pub use task::Task;
pub use task_output::TaskOutput;
