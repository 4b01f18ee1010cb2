use serde::{Deserialize, Serialize};

/// Output of the prediction adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    /// One probability per label in the configured label set, same order.
    pub probabilities: Vec<f64>,
}

/// Output of the context adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextResult {
    /// What the incident is and why it matters here.
    pub context: String,
    /// Potential impact on the surrounding structures.
    pub impact: String,
    /// Proposed solution.
    pub solution: String,
}
