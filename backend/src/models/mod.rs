//! Domain types flowing through the prediction pipeline.

pub mod prediction;
pub mod record;

pub use prediction::{ContextResult, Prediction};
pub use record::{PredictionRecord, ValidationError};
