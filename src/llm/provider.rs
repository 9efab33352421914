//! Provider adapter trait plus a reqwest-based HTTP implementation (§4.F
//! step 2, §6 "LLM provider adapters").
//!
//! Grounded on the teacher's `fleet/client.rs` reqwest client pattern: a
//! thin `async_trait` seam so the dispatcher never knows whether it's
//! talking to a real HTTP endpoint or a test double, plus the same
//! timeout-at-the-call-site and `thiserror`-mapped-transport-error shape.

use crate::config::ProviderConfig;
use crate::errors::DispatchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One provider's raw completion, before it's wrapped into a `ProviderResult`.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
}

/// A pluggable LLM backend. One instance per configured provider.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Issues the completion request. The caller applies the per-provider
    /// timeout (§4.F "per-request timeout T_p") — this trait only reports
    /// transport-level and refusal outcomes.
    async fn complete(&self, prompt: &str) -> Result<Completion, DispatchError>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    text: String,
}

/// HTTP-backed provider calling a configured base URL with a small JSON
/// completion contract (`{model, prompt}` -> `{text}`); the concrete wire
/// shape is implementation-defined the same way the teacher's fleet client
/// treats its upstream API as an adapter-owned detail.
pub struct HttpProvider {
    name: String,
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        let api_key = config
            .api_key_env
            .as_ref()
            .and_then(|env_var| std::env::var(env_var).ok());
        Self {
            name: config.name.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Provider for HttpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str) -> Result<Completion, DispatchError> {
        let mut request = self
            .client
            .post(format!("{}/v1/complete", self.base_url))
            .json(&CompletionRequest {
                model: &self.model,
                prompt,
            });

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|source| DispatchError::Transport {
                provider: self.name.clone(),
                source,
            })?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS
            || response.status().as_u16() == 451
        {
            return Err(DispatchError::Refused {
                provider: self.name.clone(),
                message: format!("provider returned {}", response.status()),
            });
        }

        let response = response
            .error_for_status()
            .map_err(|source| DispatchError::Transport {
                provider: self.name.clone(),
                source,
            })?;

        let body: CompletionResponse =
            response
                .json()
                .await
                .map_err(|source| DispatchError::Transport {
                    provider: self.name.clone(),
                    source,
                })?;

        Ok(Completion { text: body.text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoProvider {
        name: String,
    }

    #[async_trait]
    impl Provider for EchoProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn complete(&self, prompt: &str) -> Result<Completion, DispatchError> {
            Ok(Completion {
                text: format!("echo: {prompt}"),
            })
        }
    }

    #[tokio::test]
    async fn provider_trait_object_is_callable() {
        let provider: Box<dyn Provider> = Box::new(EchoProvider {
            name: "echo".into(),
        });
        let completion = provider.complete("hello").await.unwrap();
        assert_eq!(completion.text, "echo: hello");
        assert_eq!(provider.name(), "echo");
    }
}
