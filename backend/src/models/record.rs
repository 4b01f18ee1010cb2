use chrono::{DateTime, Utc};
use mapaction_common::{IncidentId, PredictResponse};
use serde::Serialize;

use super::{ContextResult, Prediction};

/// A completed pipeline run, as stored in the `predictions` table.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionRecord {
    pub incident_id: IncidentId,
    /// Predicted label.
    pub incident_type: String,
    pub piste_solution: String,
    pub impact_potentiel: String,
    pub context: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing or empty field: {0}")]
    MissingField(&'static str),
}

impl PredictionRecord {
    /// Build a record, rejecting any missing or blank field.
    ///
    /// Nothing partial is ever built, so nothing partial is ever stored.
    pub fn new(
        incident_id: Option<IncidentId>,
        prediction: &Prediction,
        context: &ContextResult,
    ) -> Result<Self, ValidationError> {
        let incident_id = match incident_id {
            Some(id) if !id.is_blank() => id,
            _ => return Err(ValidationError::MissingField("incident_id")),
        };

        let fields = [
            ("prediction", &prediction.label),
            ("context", &context.context),
            ("in_depth", &context.impact),
            ("piste_solution", &context.solution),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ValidationError::MissingField(*name));
        }

        Ok(Self {
            incident_id,
            incident_type: prediction.label.clone(),
            piste_solution: context.solution.clone(),
            impact_potentiel: context.impact.clone(),
            context: context.context.clone(),
            created_at: Utc::now(),
        })
    }
}

/// Response body for a run that produced `record`.
pub fn response_for(record: &PredictionRecord, probabilities: Vec<f64>) -> PredictResponse {
    PredictResponse {
        prediction: record.incident_type.clone(),
        probabilities,
        context: record.context.clone(),
        in_depth: record.impact_potentiel.clone(),
        piste_solution: record.piste_solution.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn prediction() -> Prediction {
        Prediction {
            label: "flood".to_string(),
            probabilities: vec![0.9, 0.1],
        }
    }

    fn context() -> ContextResult {
        ContextResult {
            context: "Une inondation.".to_string(),
            impact: "L'école est menacée.".to_string(),
            solution: "Curer les caniveaux.".to_string(),
        }
    }

    #[test]
    fn test_record_from_complete_run() {
        let record = PredictionRecord::new(Some(IncidentId::Number(42)), &prediction(), &context()).unwrap();
        assert_eq!(record.incident_id, IncidentId::Number(42));
        assert_eq!(record.incident_type, "flood");
        assert_eq!(record.impact_potentiel, "L'école est menacée.");
        assert_eq!(record.piste_solution, "Curer les caniveaux.");

        let response = response_for(&record, vec![0.9, 0.1]);
        assert_eq!(response.prediction, "flood");
        assert_eq!(response.in_depth, record.impact_potentiel);
    }

    #[rstest]
    #[case(None)]
    #[case(Some(IncidentId::Text(String::new())))]
    #[case(Some(IncidentId::Text("   ".to_string())))]
    fn test_missing_incident_id(#[case] id: Option<IncidentId>) {
        let err = PredictionRecord::new(id, &prediction(), &context()).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("incident_id"));
    }

    #[rstest]
    #[case("label", "prediction")]
    #[case("context", "context")]
    #[case("impact", "in_depth")]
    #[case("solution", "piste_solution")]
    fn test_blank_field_rejected(#[case] field: &str, #[case] expected: &'static str) {
        let mut prediction = prediction();
        let mut context = context();
        match field {
            "label" => prediction.label = " ".to_string(),
            "context" => context.context.clear(),
            "impact" => context.impact.clear(),
            _ => context.solution.clear(),
        }

        let err = PredictionRecord::new(Some(IncidentId::Number(1)), &prediction, &context).unwrap_err();
        assert_eq!(err, ValidationError::MissingField(expected));
    }
}
