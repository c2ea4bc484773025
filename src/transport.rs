use crate::config::{ResponseShape, TransportConfig};
use crate::error::TransportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Body of `POST /solve`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SolveRequest {
    pub problem: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Shape A backend reply. The server also echoes the problem and tool
/// metadata, which the client ignores.
#[derive(Debug, Clone, Deserialize)]
struct SolutionAndAnswerBody {
    solution: String,
    #[serde(default)]
    final_answer: Option<String>,
}

/// Shape B backend reply
#[derive(Debug, Clone, Deserialize)]
struct RawResponseBody {
    response: String,
}

/// Decoded `/solve` reply, tagged by the backend variant that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveResult {
    SolutionAndAnswer {
        solution: String,
        final_answer: Option<String>,
    },
    RawResponse(String),
}

impl SolveResult {
    /// Text shown as the assistant turn.
    pub fn into_content(self) -> String {
        match self {
            SolveResult::SolutionAndAnswer {
                solution,
                final_answer: Some(answer),
            } => format!("{solution}\n\n**Final Answer:**\n{answer}"),
            SolveResult::SolutionAndAnswer {
                solution,
                final_answer: None,
            } => solution,
            SolveResult::RawResponse(response) => response,
        }
    }

    /// Decode a response body according to the configured backend variant.
    pub fn decode(shape: ResponseShape, body: &str) -> Result<Self, TransportError> {
        match shape {
            ResponseShape::SolutionAndAnswer => {
                let parsed: SolutionAndAnswerBody = serde_json::from_str(body)?;
                Ok(SolveResult::SolutionAndAnswer {
                    solution: parsed.solution,
                    final_answer: parsed.final_answer,
                })
            }
            ResponseShape::RawResponse => {
                let parsed: RawResponseBody = serde_json::from_str(body)?;
                Ok(SolveResult::RawResponse(parsed.response))
            }
        }
    }
}

/// Server status as reported by `/health` (or `/` on backends without it).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthReport {
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

/// The seam between the chat session and the solver backend.
#[async_trait]
pub trait SolveTransport: Send + Sync {
    /// One conversation turn. Never retried.
    async fn solve(
        &self,
        problem: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<SolveResult, TransportError>;

    /// Ask the backend to drop its conversational memory.
    async fn reset_remote_state(&self) -> Result<(), TransportError>;
}

/// reqwest-backed transport for the solver HTTP API
#[derive(Clone)]
pub struct HttpTransport {
    config: TransportConfig,
    client: reqwest::Client,
}

impl HttpTransport {
    /// No request timeout is set; reqwest's default applies.
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Check a response status and hand back the body text.
    async fn read_body(response: reqwest::Response) -> Result<String, TransportError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.text().await?)
    }

    /// `GET /health`, falling back to `GET /` when the server has no health route.
    pub async fn health(&self) -> Result<HealthReport, TransportError> {
        let response = self.client.get(self.config.endpoint("health")).send().await?;

        let response = if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!("no /health route, falling back to root");
            self.client.get(self.config.endpoint("")).send().await?
        } else {
            response
        };

        let body = Self::read_body(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// `GET /tools` on tool-enabled backends.
    pub async fn tools(&self) -> Result<serde_json::Value, TransportError> {
        let response = self.client.get(self.config.endpoint("tools")).send().await?;
        let body = Self::read_body(response).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl SolveTransport for HttpTransport {
    async fn solve(
        &self,
        problem: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<SolveResult, TransportError> {
        let url = self.config.endpoint("solve");
        let payload = SolveRequest {
            problem: problem.to_string(),
            max_tokens,
            temperature,
        };

        tracing::debug!(%url, chars = problem.len(), max_tokens, "sending solve request");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        let result = SolveResult::decode(self.config.shape, &body)?;

        tracing::debug!(shape = self.config.shape.as_ref(), "solve request completed");
        Ok(result)
    }

    async fn reset_remote_state(&self) -> Result<(), TransportError> {
        let url = self.config.endpoint("reset");
        let response = self.client.post(&url).send().await?;
        Self::read_body(response).await?;
        Ok(())
    }
}
