//! Natural language to SQL translation.
//!
//! The language model answers first. Any failure along that path (credential, transport,
//! status, unparsable output) degrades to the deterministic [`FallbackTranslator`], so
//! translation itself never fails.

pub mod extract;
pub mod fallback;
pub mod llm;
pub mod prompt;

pub use fallback::FallbackTranslator;
pub use llm::{ChatCompletionsClient, LanguageModel, LlmError};

use crate::{
    descriptor::SchemaDescriptor,
    models::{TranslationRequest, TranslationResult, TranslationSource},
};
use extract::ExtractError;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
enum PrimaryFailure {
    #[error(transparent)]
    Model(#[from] LlmError),

    #[error(transparent)]
    Parse(#[from] ExtractError),
}

#[derive(Clone)]
pub struct Translator {
    model: Arc<dyn LanguageModel>,
    system_prompt: Arc<str>,
    fallback: FallbackTranslator,
}

impl Translator {
    pub fn new(model: Arc<dyn LanguageModel>, descriptor: SchemaDescriptor) -> Self {
        Self {
            model,
            system_prompt: prompt::system_prompt(&descriptor).into(),
            fallback: FallbackTranslator::new(descriptor),
        }
    }

    pub async fn translate(&self, request: &TranslationRequest) -> TranslationResult {
        match self.primary(&request.text).await {
            Ok(result) => {
                debug!(caller_id = request.caller_id.as_deref(), "model translation succeeded");
                result
            }
            Err(PrimaryFailure::Model(LlmError::MissingCredential)) => {
                debug!("no language model credential configured; using rule translator");
                self.fallback.translate(&request.text)
            }
            Err(err) => {
                warn!(error = %err, "model translation failed; using rule translator");
                self.fallback.translate(&request.text)
            }
        }
    }

    async fn primary(&self, text: &str) -> Result<TranslationResult, PrimaryFailure> {
        let raw = self.model.complete(&self.system_prompt, text).await?;
        let extracted = extract::extract(&raw)?;
        Ok(TranslationResult {
            sql: extracted.sql,
            explanation: extracted.explanation,
            source: TranslationSource::Llm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct CannedModel(Result<&'static str, fn() -> LlmError>);

    #[async_trait]
    impl LanguageModel for CannedModel {
        async fn complete(&self, system: &str, _user: &str) -> Result<String, LlmError> {
            assert!(system.contains("Table: properties"));
            match &self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(make) => Err(make()),
            }
        }
    }

    fn translator(reply: Result<&'static str, fn() -> LlmError>) -> Translator {
        Translator::new(Arc::new(CannedModel(reply)), SchemaDescriptor::properties())
    }

    fn request(text: &str) -> TranslationRequest {
        TranslationRequest {
            text: text.to_string(),
            caller_id: None,
        }
    }

    #[tokio::test]
    async fn uses_model_output_when_parsable() {
        let translator = translator(Ok(
            "```json\n{\"sql\": \"SELECT * FROM properties WHERE borough = 'QN' LIMIT 5\", \"explanation\": \"Queens lots.\"}\n```",
        ));

        let result = translator.translate(&request("lots in queens")).await;
        assert_eq!(result.source, TranslationSource::Llm);
        assert_eq!(
            result.sql,
            "SELECT * FROM properties WHERE borough = 'QN' LIMIT 5"
        );
        assert_eq!(result.explanation, "Queens lots.");
    }

    #[tokio::test]
    async fn falls_back_on_transport_failure() {
        let translator = translator(Err(|| LlmError::Transport("connection refused".into())));

        let result = translator.translate(&request("vacant lots in Brooklyn")).await;
        assert_eq!(result.source, TranslationSource::Fallback);
        assert!(result.sql.contains("borough = 'BK'"));
    }

    #[tokio::test]
    async fn falls_back_on_unparsable_output() {
        let translator = translator(Ok("I am not able to help with that."));

        let result = translator.translate(&request("vacant lots")).await;
        assert_eq!(result.source, TranslationSource::Fallback);
        assert_eq!(result.explanation, "Finding vacant lots.");
    }

    #[tokio::test]
    async fn falls_back_without_credential() {
        let translator = translator(Err(|| LlmError::MissingCredential));

        let result = translator.translate(&request("vacant lots")).await;
        assert_eq!(result.source, TranslationSource::Fallback);
    }

    #[tokio::test]
    async fn non_select_model_output_is_passed_through_for_gating() {
        let translator = translator(Ok("{\"sql\": \"DELETE FROM properties\"}"));

        let result = translator.translate(&request("remove everything")).await;
        assert_eq!(result.source, TranslationSource::Llm);
        assert_eq!(result.sql, "DELETE FROM properties");
    }
}
