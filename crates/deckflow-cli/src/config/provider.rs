//! Outline and content provider configuration.

use anyhow::Context;
use clap::{Args, ValueEnum};
use deckflow_core::generate::{OpenAiConfig, OpenAiProducer, ProducerService};
#[cfg(feature = "mock")]
use deckflow_core::mock::{MockConfig, MockProducer};
use deckflow_core::render::{PptxRenderer, RenderService};
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;

/// Which producer fills outlines and slides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// An OpenAI-compatible chat-completions endpoint.
    #[default]
    #[value(name = "openai")]
    OpenAi,
    /// Deterministic output derived from the prompt.
    #[cfg(feature = "mock")]
    Mock,
}

/// Producer selection and settings.
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Producer backend.
    #[arg(long, env = "LLM_PROVIDER", value_enum, default_value = "openai")]
    pub provider: ProviderKind,

    /// Settings of the `openai` provider.
    #[clap(flatten)]
    pub openai: OpenAiConfig,

    /// Settings of the `mock` provider.
    #[cfg(feature = "mock")]
    #[clap(flatten)]
    pub mock: MockConfig,
}

impl ProviderConfig {
    /// Validates the settings of the selected provider.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.provider {
            ProviderKind::OpenAi => self
                .openai
                .validate()
                .context("invalid openai provider configuration"),
            #[cfg(feature = "mock")]
            ProviderKind::Mock => Ok(()),
        }
    }

    /// Creates the producer service for the selected provider.
    pub fn create_producer(&self) -> anyhow::Result<ProducerService> {
        let producer = match self.provider {
            ProviderKind::OpenAi => {
                let producer = OpenAiProducer::new(self.openai.clone())
                    .context("failed to create openai producer")?;
                ProducerService::new(producer)
            }
            #[cfg(feature = "mock")]
            ProviderKind::Mock => ProducerService::new(MockProducer::new(self.mock.clone())),
        };

        Ok(producer)
    }

    /// Creates the presentation renderer.
    pub fn create_renderer(&self) -> RenderService {
        RenderService::new(PptxRenderer::new())
    }

    /// Logs provider configuration (no credentials).
    pub fn log(&self) {
        match self.provider {
            ProviderKind::OpenAi => tracing::info!(
                target: TRACING_TARGET_CONFIG,
                provider = "openai",
                base_url = %self.openai.llm_base_url,
                model = %self.openai.llm_model,
                timeout_secs = self.openai.llm_timeout,
                "Provider configuration"
            ),
            #[cfg(feature = "mock")]
            ProviderKind::Mock => tracing::info!(
                target: TRACING_TARGET_CONFIG,
                provider = "mock",
                delay_ms = self.mock.mock_delay_ms,
                sections = self.mock.mock_sections,
                "Provider configuration"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_config(provider: ProviderKind) -> ProviderConfig {
        ProviderConfig {
            provider,
            openai: OpenAiConfig::default(),
            #[cfg(feature = "mock")]
            mock: MockConfig::default(),
        }
    }

    #[test]
    fn openai_requires_api_key() {
        let config = provider_config(ProviderKind::OpenAi);
        assert!(config.validate().is_err());
        assert!(config.create_producer().is_err());

        let config = ProviderConfig {
            openai: OpenAiConfig::new("sk-test"),
            ..config
        };
        assert!(config.validate().is_ok());
        assert!(config.create_producer().is_ok());
    }

    #[cfg(feature = "mock")]
    #[test]
    fn mock_needs_no_credentials() -> anyhow::Result<()> {
        let config = provider_config(ProviderKind::Mock);
        config.validate()?;
        config.create_producer()?;
        Ok(())
    }
}
