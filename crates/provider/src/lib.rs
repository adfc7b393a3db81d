pub mod anthropic;
pub mod openai;
pub mod types;

mod error;

pub use error::{parse_retry_after_ms, ProviderError};
pub use types::*;

use std::time::Duration;

use tracing::{info, warn};

const MAX_RETRIES: u32 = 5;
const SAFETY_MARGIN: Duration = Duration::from_secs(5);

/// A single-shot LLM client. Implementors perform exactly one HTTP
/// round-trip per `respond` call; retry/backoff lives in [`call_with_retry`]
/// so every provider shares the exact same policy (`spec.md` §4.5).
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;
    async fn respond(&self, model: &str, request: &ChatRequest) -> Result<ModelResponse, ProviderError>;
}

/// Builds the provider for a model, given the two credentials LIFT supports.
///
/// Reduced from the teacher's `create_provider` dispatch (which switches on
/// an `api_style` string across ~10 providers) to the two providers
/// `lift-config::resolve_model` can ever return.
pub fn provider_for(provider_id: &str, openai_key: Option<&str>, anthropic_key: Option<&str>) -> Box<dyn Provider> {
    match provider_id {
        "anthropic" => Box::new(anthropic::AnthropicProvider::new(
            anthropic_key.expect("caller validated credential presence").to_string(),
        )),
        _ => Box::new(openai::OpenAiProvider::new(
            openai_key.expect("caller validated credential presence").to_string(),
        )),
    }
}

/// Calls `provider.respond` with the rate-limit retry policy from
/// `spec.md` §4.5: on a rate-limit signal, sleep the provider's suggested
/// wait plus a flat 5-second safety margin, and retry up to
/// [`MAX_RETRIES`] times. Any other failure propagates immediately. If all
/// retries are exhausted, fails with [`ProviderError::NoModelResponse`].
pub async fn call_with_retry(
    provider: &dyn Provider,
    model: &str,
    request: &ChatRequest,
) -> Result<ModelResponse, ProviderError> {
    for attempt in 0..MAX_RETRIES {
        match provider.respond(model, request).await {
            Ok(response) => return Ok(response),
            Err(err) if err.is_retryable() => {
                let wait_ms = err.retry_after_ms().unwrap_or(0);
                let sleep_for = Duration::from_millis(wait_ms) + SAFETY_MARGIN;
                warn!(
                    attempt = attempt + 1,
                    max_retries = MAX_RETRIES,
                    wait_ms = sleep_for.as_millis() as u64,
                    "rate limited, backing off"
                );
                tokio::time::sleep(sleep_for).await;
            }
            Err(err) => return Err(err),
        }
    }
    info!("exhausted {} retries without a model response", MAX_RETRIES);
    Err(ProviderError::NoModelResponse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyProvider {
        calls: AtomicU32,
        succeed_on: u32,
    }

    #[async_trait::async_trait]
    impl Provider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn respond(&self, _model: &str, _request: &ChatRequest) -> Result<ModelResponse, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < self.succeed_on {
                Err(ProviderError::RateLimited { retry_after_ms: 1 })
            } else {
                Ok(ModelResponse { output: vec![], usage: Usage { total_tokens: 0 } })
            }
        }
    }

    fn empty_request() -> ChatRequest {
        ChatRequest { model: "test".into(), input: vec![], tools: vec![] }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let provider = FlakyProvider { calls: AtomicU32::new(0), succeed_on: 3 };
        let result = call_with_retry(&provider, "test", &empty_request()).await;
        assert!(result.is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let provider = FlakyProvider { calls: AtomicU32::new(0), succeed_on: 100 };
        let result = call_with_retry(&provider, "test", &empty_request()).await;
        assert!(matches!(result, Err(ProviderError::NoModelResponse)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), MAX_RETRIES);
    }
}
