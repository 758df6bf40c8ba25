//! Section generation: one completion call per heading.
//!
//! Headings are processed strictly in order, one call at a time. Each call
//! sends a single system message built by [`crate::prompts::section_prompt`]
//! and caps the reply at the per-section token budget.
//!
//! ## Retry Strategy
//!
//! Retries are off by default. When enabled, the wait before attempt `n`
//! is `retry_backoff_ms * 2^(n-1)`: with 500 ms base and 3 retries the
//! sequence is 500 ms → 1 s → 2 s.

use crate::config::{FailurePolicy, GenerationConfig};
use crate::error::{ScribeError, SectionError};
use crate::output::SectionResult;
use crate::pipeline::postprocess::clean_section;
use crate::prompts::{section_prompt, DEFAULT_GUIDELINES};
use crate::provider::{Completion, CompletionClient, CompletionRequest};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, error, info, warn};

/// Inputs shared by every section of one article.
#[derive(Debug, Clone, Copy)]
pub struct SectionContext<'a> {
    pub keyword: &'a str,
    pub sample_article: &'a str,
    /// Max tokens per section; `None` leaves the cap to the provider.
    pub budget: Option<usize>,
}

/// Outcome of the last failed attempt, kept to build the final error.
enum AttemptFailure {
    Api(String),
    TimedOut(u64),
}

/// Generate the body for one heading.
///
/// Never returns `Err`: a failed call is recorded in `SectionResult::error`
/// so the caller decides what the failure means for the batch.
pub async fn generate_section(
    client: &Arc<dyn CompletionClient>,
    index: usize,
    heading: &str,
    ctx: SectionContext<'_>,
    config: &GenerationConfig,
) -> SectionResult {
    let start = Instant::now();
    let guidelines = config.guidelines.as_deref().unwrap_or(DEFAULT_GUIDELINES);
    let request = CompletionRequest {
        system: section_prompt(ctx.keyword, heading, guidelines, ctx.sample_article),
        max_tokens: ctx.budget,
        temperature: config.temperature,
    };

    let mut last_failure = AttemptFailure::Api("Unknown error".to_string());

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Section {} '{}': retry {}/{} after {}ms",
                index, heading, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match call_once(client, &request, config.api_timeout_secs).await {
            Ok(completion) => {
                let duration = start.elapsed();
                debug!(
                    "Section {} '{}': {} input tokens, {} output tokens, {:?}",
                    index,
                    heading,
                    completion.prompt_tokens,
                    completion.completion_tokens,
                    duration
                );
                let body = if config.clean_output {
                    clean_section(&completion.content, heading)
                } else {
                    completion.content
                };
                return SectionResult {
                    index,
                    heading: heading.to_string(),
                    body,
                    input_tokens: completion.prompt_tokens,
                    output_tokens: completion.completion_tokens,
                    duration_ms: duration.as_millis() as u64,
                    retries: attempt as u8,
                    error: None,
                };
            }
            Err(failure) => {
                match &failure {
                    AttemptFailure::Api(msg) => warn!(
                        "Section {} '{}': attempt {} failed: {}",
                        index,
                        heading,
                        attempt + 1,
                        msg
                    ),
                    AttemptFailure::TimedOut(secs) => warn!(
                        "Section {} '{}': attempt {} timed out after {}s",
                        index,
                        heading,
                        attempt + 1,
                        secs
                    ),
                }
                last_failure = failure;
            }
        }
    }

    let retries = config.max_retries as u8;
    let error = match last_failure {
        AttemptFailure::Api(detail) => SectionError::LlmFailed {
            index,
            heading: heading.to_string(),
            retries,
            detail,
        },
        AttemptFailure::TimedOut(secs) => SectionError::Timeout {
            index,
            heading: heading.to_string(),
            secs,
        },
    };

    SectionResult {
        index,
        heading: heading.to_string(),
        body: String::new(),
        input_tokens: 0,
        output_tokens: 0,
        duration_ms: start.elapsed().as_millis() as u64,
        retries,
        error: Some(error),
    }
}

async fn call_once(
    client: &Arc<dyn CompletionClient>,
    request: &CompletionRequest,
    timeout_secs: Option<u64>,
) -> Result<Completion, AttemptFailure> {
    let call = client.complete(request);
    let outcome = match timeout_secs {
        Some(secs) => timeout(Duration::from_secs(secs), call)
            .await
            .map_err(|_| AttemptFailure::TimedOut(secs))?,
        None => call.await,
    };
    outcome.map_err(|e| AttemptFailure::Api(e.to_string()))
}

/// Generate every heading in order, applying the configured failure policy.
///
/// * [`FailurePolicy::WholeBatch`]: the first failing heading aborts the run
///   and its inputs are logged; no sections are returned.
/// * [`FailurePolicy::Partial`]: every heading is attempted and each result
///   carries its own error, if any.
///
/// An empty heading list returns immediately without touching the client.
pub async fn generate_sections(
    client: &Arc<dyn CompletionClient>,
    headings: &[String],
    ctx: SectionContext<'_>,
    config: &GenerationConfig,
) -> Result<Vec<SectionResult>, ScribeError> {
    let total = headings.len();
    if total == 0 {
        debug!("No headings: skipping generation");
        return Ok(Vec::new());
    }

    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_generation_start(total);
    }
    info!(
        "Generating {} sections for keyword '{}' with {} (budget {:?})",
        total,
        ctx.keyword,
        client.name(),
        ctx.budget
    );

    let mut results = Vec::with_capacity(total);
    for (i, heading) in headings.iter().enumerate() {
        let index = i + 1;
        if let Some(cb) = cb {
            cb.on_section_start(index, total, heading);
        }

        let result = generate_section(client, index, heading, ctx, config).await;

        match &result.error {
            None => {
                if let Some(cb) = cb {
                    cb.on_section_complete(index, total, heading, result.body.len());
                }
            }
            Some(err) => {
                if let Some(cb) = cb {
                    cb.on_section_error(index, total, heading, &err.to_string());
                }
                if config.failure_policy == FailurePolicy::WholeBatch {
                    error!(
                        keyword = ctx.keyword,
                        heading = heading.as_str(),
                        budget = ?ctx.budget,
                        sample = ctx.sample_article,
                        "Article generation aborted: {}",
                        err
                    );
                    if let Some(cb) = cb {
                        cb.on_generation_complete(total, 0);
                    }
                    return Err(ScribeError::GenerationFailed {
                        heading: heading.clone(),
                        detail: err.to_string(),
                    });
                }
            }
        }
        results.push(result);
    }

    let success = results.iter().filter(|r| r.is_success()).count();
    if let Some(cb) = cb {
        cb.on_generation_complete(total, success);
    }
    info!("Generated {}/{} sections", success, total);
    Ok(results)
}
