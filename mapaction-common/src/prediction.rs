//! Image prediction request/response types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of the incident an image belongs to.
///
/// Clients send either a numeric id or a string id; both are accepted and
/// kept as-is so the stored row matches what the client sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncidentId {
    Number(i64),
    Text(String),
}

impl IncidentId {
    /// A string id made only of whitespace counts as missing.
    pub fn is_blank(&self) -> bool {
        match self {
            IncidentId::Number(_) => false,
            IncidentId::Text(s) => s.trim().is_empty(),
        }
    }
}

impl fmt::Display for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncidentId::Number(n) => write!(f, "{}", n),
            IncidentId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for IncidentId {
    fn from(n: i64) -> Self {
        IncidentId::Number(n)
    }
}

impl From<&str> for IncidentId {
    fn from(s: &str) -> Self {
        IncidentId::Text(s.to_string())
    }
}

/// Body of `POST /image/predict` and of each inbound WebSocket message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    /// Image file name relative to the image host, or an absolute URL.
    pub image_name: String,
    /// Names of sensitive structures near the incident (schools, wells...).
    #[serde(default)]
    pub sensitive_structures: Vec<String>,
    #[serde(default)]
    pub incident_id: Option<IncidentId>,
}

/// Aggregate returned after a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Predicted incident label.
    pub prediction: String,
    /// Class probabilities, parallel to the model's label set.
    pub probabilities: Vec<f64>,
    pub context: String,
    /// Potential impact of the incident.
    pub in_depth: String,
    /// Proposed solution.
    pub piste_solution: String,
}
