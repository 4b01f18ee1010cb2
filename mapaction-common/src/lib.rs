//! Map Action Common Types
//!
//! Wire types shared by the prediction backend and its HTTP/WebSocket clients.

pub mod prediction;

pub use prediction::{IncidentId, PredictRequest, PredictResponse};
