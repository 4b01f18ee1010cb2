//! Context adapter: incident explanation, impact and solution text.

use std::sync::Arc;

use super::{AdapterError, TextGenerator};
use crate::models::ContextResult;

const SYSTEM_PROMPT: &str = "Tu es un expert en gestion des incidents environnementaux \
et urbains. Tu réponds toujours en français, de façon factuelle et concise.";

const LENGTH_LIMIT: &str = "Réponds en 3 phrases maximum et en 40 mots maximum.";

const NO_STRUCTURES: &str = "aucune structure sensible signalée";

/// The three generated texts, in generation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Context,
    Impact,
    Solution,
}

impl PromptKind {
    pub const ALL: [PromptKind; 3] = [PromptKind::Context, PromptKind::Impact, PromptKind::Solution];

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptKind::Context => "context",
            PromptKind::Impact => "impact",
            PromptKind::Solution => "solution",
        }
    }

    /// Render the prompt for an incident label near the given structures.
    pub fn render(&self, label: &str, structures: &str) -> String {
        let task = match self {
            PromptKind::Context => format!(
                "Explique ce qu'est un incident de type « {} » et pourquoi il est préoccupant \
                 à proximité des structures suivantes : {}.",
                label, structures
            ),
            PromptKind::Impact => format!(
                "Décris l'impact potentiel d'un incident de type « {} » sur les structures \
                 suivantes : {}.",
                label, structures
            ),
            PromptKind::Solution => format!(
                "Propose une piste de solution pour traiter un incident de type « {} » \
                 à proximité des structures suivantes : {}.",
                label, structures
            ),
        };
        format!("{} {}", task, LENGTH_LIMIT)
    }
}

/// Wraps a text generator with the fixed French prompt set.
pub struct ContextAdapter {
    generator: Arc<dyn TextGenerator>,
}

impl ContextAdapter {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Generate context, impact and solution for a predicted label.
    ///
    /// The three calls run sequentially; the first failure stops the run so
    /// callers get either all three texts or an error.
    pub async fn fetch_contextual_information(
        &self,
        label: &str,
        sensitive_structures: &[String],
    ) -> Result<ContextResult, AdapterError> {
        let result = self.generate_all(label, sensitive_structures).await;
        if let Err(e) = &result {
            tracing::error!(
                generator = self.generator.name(),
                label = %label,
                "Context generation failed: {}",
                e
            );
        }
        result
    }

    async fn generate_all(
        &self,
        label: &str,
        sensitive_structures: &[String],
    ) -> Result<ContextResult, AdapterError> {
        if label.trim().is_empty() {
            return Err(AdapterError::InvalidInput("label is empty".to_string()));
        }

        let structures = format_structures(sensitive_structures);

        let context = self.generate(PromptKind::Context, label, &structures).await?;
        let impact = self.generate(PromptKind::Impact, label, &structures).await?;
        let solution = self.generate(PromptKind::Solution, label, &structures).await?;

        Ok(ContextResult {
            context,
            impact,
            solution,
        })
    }

    async fn generate(
        &self,
        kind: PromptKind,
        label: &str,
        structures: &str,
    ) -> Result<String, AdapterError> {
        tracing::debug!(kind = kind.as_str(), "Generating incident text");
        let prompt = kind.render(label, structures);
        self.generator.generate(SYSTEM_PROMPT, &prompt).await
    }
}

fn format_structures(structures: &[String]) -> String {
    let names: Vec<&str> = structures
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if names.is_empty() {
        NO_STRUCTURES.to_string()
    } else {
        names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::ScriptedGenerator;

    #[test]
    fn test_prompts_carry_length_limit() {
        for kind in PromptKind::ALL {
            let prompt = kind.render("Inondation", "école");
            assert!(prompt.contains("3 phrases maximum"));
            assert!(prompt.contains("40 mots maximum"));
            assert!(prompt.contains("« Inondation »"));
            assert!(prompt.contains("école"));
        }
    }

    #[test]
    fn test_format_structures() {
        assert_eq!(format_structures(&[]), NO_STRUCTURES);
        assert_eq!(format_structures(&[" ".to_string()]), NO_STRUCTURES);
        assert_eq!(
            format_structures(&["école".to_string(), "puits".to_string()]),
            "école, puits"
        );
    }

    #[tokio::test]
    async fn test_three_calls_in_order() {
        let generator = Arc::new(ScriptedGenerator::replying(["ctx", "impact", "solution"]));
        let adapter = ContextAdapter::new(generator.clone());

        let result = adapter
            .fetch_contextual_information("flood", &["school".to_string()])
            .await
            .unwrap();

        assert_eq!(result.context, "ctx");
        assert_eq!(result.impact, "impact");
        assert_eq!(result.solution, "solution");

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].starts_with("Explique"));
        assert!(prompts[1].contains("impact potentiel"));
        assert!(prompts[2].contains("piste de solution"));
        assert!(prompts.iter().all(|p| p.contains("school")));
    }

    #[tokio::test]
    async fn test_failure_stops_remaining_calls() {
        let generator = Arc::new(ScriptedGenerator::failing_at(1));
        let adapter = ContextAdapter::new(generator.clone());

        let err = adapter
            .fetch_contextual_information("flood", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, AdapterError::Service(_)));
        assert_eq!(generator.prompts().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_label_rejected() {
        let generator = Arc::new(ScriptedGenerator::replying(["a", "b", "c"]));
        let adapter = ContextAdapter::new(generator.clone());

        assert!(adapter.fetch_contextual_information(" ", &[]).await.is_err());
        assert!(generator.prompts().is_empty());
    }
}
