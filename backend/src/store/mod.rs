//! Persistence gateway for completed predictions.

mod sqlite;

pub use sqlite::{PredictionStore, StoreError};
