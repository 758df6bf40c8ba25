//! Streaming generation API: emit sections as they complete.
//!
//! Unlike the eager [`crate::generate::generate_article`] which returns only
//! after every heading finishes, [`generate_stream`] yields each
//! [`SectionResult`] as soon as its completion call returns. Sections are
//! generated one at a time, so items always arrive in heading order.

use crate::config::{validate_article_length, FailurePolicy, GenerationConfig};
use crate::error::{ScribeError, SectionError};
use crate::generate::GenerationRequest;
use crate::output::SectionResult;
use crate::pipeline::extract::extract_text_async;
use crate::pipeline::headings::{parse_headings, token_budget};
use crate::pipeline::llm::{generate_section, SectionContext};
use crate::provider::resolve_client;
use futures::stream;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::{info, warn};

/// A boxed stream of section results.
pub type SectionStream = Pin<Box<dyn Stream<Item = Result<SectionResult, SectionError>> + Send>>;

/// Generate an article, streaming sections as they are ready.
///
/// Under [`FailurePolicy::WholeBatch`] the stream ends right after the first
/// `Err` item; under [`FailurePolicy::Partial`] every heading is attempted.
/// Zero headings give an empty stream and no completion call. The
/// configured [`crate::GenerationProgressCallback`] sees the same events as
/// in the eager API; `on_generation_complete` fires once the stream ends.
///
/// # Returns
/// - `Ok(SectionStream)`: a stream of `Result<SectionResult, SectionError>`
/// - `Err(ScribeError)`: fatal error before the first call (bad length,
///   provider not configured)
///
/// # Example
/// ```rust,no_run
/// use futures::StreamExt;
/// use pdfscribe::{generate_stream, GenerationConfig, GenerationRequest};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let request = GenerationRequest {
///     document: None,
///     keyword: "solar panels".into(),
///     article_length: 1500,
///     headings: "Intro, Benefits, Conclusion".into(),
/// };
/// let mut stream = generate_stream(request, &GenerationConfig::default()).await?;
/// while let Some(section) = stream.next().await {
///     match section {
///         Ok(s) => println!("{}\n{}\n", s.heading, s.body),
///         Err(e) => eprintln!("{e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn generate_stream(
    request: GenerationRequest,
    config: &GenerationConfig,
) -> Result<SectionStream, ScribeError> {
    let article_length = validate_article_length(request.article_length)?;
    let headings = parse_headings(&request.headings);
    let budget = token_budget(article_length, headings.len());
    info!(
        "Starting streaming generation: keyword '{}', {} headings",
        request.keyword,
        headings.len()
    );

    if headings.is_empty() {
        return Ok(Box::pin(stream::empty::<Result<SectionResult, SectionError>>()));
    }

    let client = resolve_client(&config.client)?;

    let sample = match request.document {
        Some(doc) => {
            let extracted = extract_text_async(doc).await;
            if let Some(ref failure) = extracted.failure {
                warn!("Continuing without a complete sample: {}", failure);
            }
            extracted.text
        }
        None => String::new(),
    };

    let sample: Arc<str> = Arc::from(sample);
    let keyword: Arc<str> = Arc::from(request.keyword);
    let cfg = config.clone();
    let whole_batch = config.failure_policy == FailurePolicy::WholeBatch;
    let total = headings.len();
    if let Some(cb) = &config.progress_callback {
        cb.on_generation_start(total);
    }

    // The stop flag is checked before the next heading is pulled, so no call
    // is made after a whole-batch failure.
    let s = stream::unfold(
        (headings.into_iter().enumerate(), false, 0usize),
        move |(mut pending, stopped, succeeded)| {
            let client = Arc::clone(&client);
            let sample = Arc::clone(&sample);
            let keyword = Arc::clone(&keyword);
            let cfg = cfg.clone();
            async move {
                let cb = cfg.progress_callback.as_ref();
                let next = if stopped { None } else { pending.next() };
                let Some((i, heading)) = next else {
                    if let Some(cb) = cb {
                        cb.on_generation_complete(total, succeeded);
                    }
                    return None;
                };
                let index = i + 1;
                if let Some(cb) = cb {
                    cb.on_section_start(index, total, &heading);
                }
                let ctx = SectionContext {
                    keyword: &*keyword,
                    sample_article: &*sample,
                    budget,
                };
                let mut result = generate_section(&client, index, &heading, ctx, &cfg).await;
                let item = match result.error.take() {
                    None => {
                        if let Some(cb) = cb {
                            cb.on_section_complete(index, total, &heading, result.body.len());
                        }
                        Ok(result)
                    }
                    Some(err) => {
                        if let Some(cb) = cb {
                            cb.on_section_error(index, total, &heading, &err.to_string());
                        }
                        Err(err)
                    }
                };
                let succeeded = succeeded + usize::from(item.is_ok());
                let stop = item.is_err() && whole_batch;
                Some((item, (pending, stop, succeeded)))
            }
        },
    );

    Ok(Box::pin(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::test_support::ScriptedClient;
    use crate::provider::CompletionClient;
    use futures::StreamExt;

    fn request(headings: &str) -> GenerationRequest {
        GenerationRequest {
            document: None,
            keyword: "solar".into(),
            article_length: 1500,
            headings: headings.into(),
        }
    }

    fn config(client: Arc<ScriptedClient>, policy: FailurePolicy) -> GenerationConfig {
        GenerationConfig::builder()
            .client(client as Arc<dyn CompletionClient>)
            .failure_policy(policy)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn sections_stream_in_order() {
        let client = Arc::new(ScriptedClient::default());
        let items: Vec<_> = generate_stream(
            request("Intro, Benefits, Conclusion"),
            &config(client, FailurePolicy::WholeBatch),
        )
        .await
        .unwrap()
        .collect()
        .await;

        let headings: Vec<_> = items
            .iter()
            .map(|r| r.as_ref().unwrap().heading.clone())
            .collect();
        assert_eq!(headings, ["Intro", "Benefits", "Conclusion"]);
    }

    #[tokio::test]
    async fn whole_batch_stream_stops_after_error() {
        let client = Arc::new(ScriptedClient::failing_on(&["Benefits"]));
        let items: Vec<_> = generate_stream(
            request("Intro, Benefits, Conclusion"),
            &config(client.clone(), FailurePolicy::WholeBatch),
        )
        .await
        .unwrap()
        .collect()
        .await;

        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn partial_stream_yields_every_heading() {
        let client = Arc::new(ScriptedClient::failing_on(&["Benefits"]));
        let items: Vec<_> = generate_stream(
            request("Intro, Benefits, Conclusion"),
            &config(client, FailurePolicy::Partial),
        )
        .await
        .unwrap()
        .collect()
        .await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[1].as_ref().unwrap_err().heading(), "Benefits");
    }

    #[derive(Default)]
    struct Events(std::sync::Mutex<Vec<String>>);

    impl crate::progress::GenerationProgressCallback for Events {
        fn on_generation_start(&self, total: usize) {
            self.0.lock().unwrap().push(format!("start {total}"));
        }
        fn on_section_complete(&self, index: usize, _total: usize, heading: &str, _len: usize) {
            self.0.lock().unwrap().push(format!("ok {index} {heading}"));
        }
        fn on_section_error(&self, index: usize, _total: usize, heading: &str, _error: &str) {
            self.0.lock().unwrap().push(format!("err {index} {heading}"));
        }
        fn on_generation_complete(&self, total: usize, success: usize) {
            self.0.lock().unwrap().push(format!("done {success}/{total}"));
        }
    }

    #[tokio::test]
    async fn stream_reports_progress_events() {
        let events = Arc::new(Events::default());
        let config = GenerationConfig::builder()
            .client(Arc::new(ScriptedClient::failing_on(&["Benefits"])))
            .failure_policy(FailurePolicy::WholeBatch)
            .progress_callback(events.clone())
            .build()
            .unwrap();
        let _: Vec<_> = generate_stream(request("Intro, Benefits, Conclusion"), &config)
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(
            *events.0.lock().unwrap(),
            ["start 3", "ok 1 Intro", "err 2 Benefits", "done 1/3"]
        );
    }

    #[tokio::test]
    async fn empty_headings_empty_stream() {
        let client = Arc::new(ScriptedClient::default());
        let config = config(client.clone(), FailurePolicy::WholeBatch);
        let items: Vec<_> = generate_stream(request(""), &config)
            .await
            .unwrap()
            .collect()
            .await;
        assert!(items.is_empty());
        assert_eq!(client.calls(), 0);
    }
}
