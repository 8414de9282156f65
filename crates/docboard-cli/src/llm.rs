//! Completion provider selection for commands that call a model.
//!
//! Precedence: `--offline`, then `--provider`, then `DOCBOARD_PROVIDER` and
//! the API keys in the environment. With nothing configured the offline
//! summarizer is used so the CLI stays usable without network access.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;

use docboard_llm::{ConfigError, LLMConfig, RetryPolicy, UnifiedClient};
use docboard_pipeline::{Pipeline, PipelineConfig};
use docboard_storage::DashboardStore;

pub(crate) const DOCBOARD_PROVIDER_ENV: &str = "DOCBOARD_PROVIDER";

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct ModelArgs {
    /// Completion provider (openai, groq, anthropic, gemini, local, offline)
    #[arg(long)]
    pub provider: Option<String>,
    /// Use the built-in offline summarizer; no network calls
    #[arg(long, conflicts_with = "provider")]
    pub offline: bool,
    /// Seconds to wait for each completion call
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

pub(crate) fn resolve_config(args: &ModelArgs) -> Result<LLMConfig> {
    resolve_config_with(args, |name| std::env::var(name).ok())
}

fn resolve_config_with<F>(args: &ModelArgs, lookup: F) -> Result<LLMConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = if args.offline {
        LLMConfig::offline()
    } else {
        let resolved = LLMConfig::from_lookup(|name| match (&args.provider, name) {
            (Some(provider), DOCBOARD_PROVIDER_ENV) => Some(provider.clone()),
            _ => lookup(name),
        });
        match resolved {
            Ok(config) => config,
            Err(ConfigError::NoProviderConfigured) => {
                eprintln!(
                    "{} no completion provider configured; using the offline summarizer",
                    "info:".yellow().bold()
                );
                LLMConfig::offline()
            }
            Err(err) => return Err(err.into()),
        }
    };

    if let Some(secs) = args.timeout_secs {
        if secs == 0 {
            bail!("--timeout-secs must be greater than zero");
        }
        config.timeout_secs = secs;
    }
    Ok(config)
}

/// Pipeline wired to the resolved provider, its timeout and its retry budget.
pub(crate) fn pipeline(
    config: PipelineConfig,
    args: &ModelArgs,
    store: Arc<dyn DashboardStore>,
) -> Result<Pipeline> {
    let llm = resolve_config(args)?;
    tracing::info!(provider = %llm.provider, model = %llm.model, "using completion provider");
    let timeout = Duration::from_secs(llm.timeout_secs);
    let retry = RetryPolicy::with_retries(llm.max_retries);
    let client = UnifiedClient::from_config(llm)?;
    Ok(Pipeline::new(config, Arc::new(client), store)
        .with_timeout(timeout)
        .with_retry(retry))
}
