use log::{debug, info};
use reqwest::{Client, Response, Url};
use std::time::Duration;

use crate::error::TransportError;
use crate::models::{ProblemAck, ProblemDocument, SolveOutcome, SolveResponse};

type Result<T> = std::result::Result<T, TransportError>;

/// HTTP client for the remote timetabling solver
#[derive(Debug, Clone)]
pub struct SolverClient {
    client: Client,
    base_url: Url,
}

impl SolverClient {
    /// Create a client for the solver at `base_url`
    /// (e.g. "http://localhost:8080")
    ///
    /// # Example
    ///
    /// ```no_run
    /// use uctp_studio::SolverClient;
    ///
    /// let client = SolverClient::new("http://localhost:8080").unwrap();
    /// ```
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_client(base_url, Client::new())
    }

    /// Create a client whose requests give up after `timeout`
    pub fn with_timeout(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Self::with_client(base_url, client)
    }

    /// Create a client around a preconfigured reqwest client
    pub fn with_client(base_url: impl AsRef<str>, client: Client) -> Result<Self> {
        let base_url =
            Url::parse(base_url.as_ref()).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))
    }

    /// Check that the solver answers at all
    pub async fn health_check(&self) -> Result<bool> {
        let response = self.client.get(self.endpoint("/health")?).send().await?;
        Ok(response.status().is_success())
    }

    /// Send a problem definition to `POST /problem`.
    ///
    /// Every call creates a new problem on the solver; nothing identifies or
    /// updates an earlier submission.
    pub async fn submit_problem(&self, document: &ProblemDocument) -> Result<ProblemAck> {
        let url = self.endpoint("/problem")?;
        debug!(
            "submitting problem {:?} to {} ({} salas, {} horarios)",
            document.problem_name,
            url,
            document.dataset.salas.len(),
            document.dataset.horarios.len()
        );

        let response = self.client.post(url).json(document).send().await?;
        let response = ensure_success(response).await?;

        // The body only has to be JSON; unknown shapes give an empty ack.
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TransportError::Parse(e.to_string()))?;
        let ack: ProblemAck = serde_json::from_value(body).unwrap_or_default();

        info!("problem accepted by solver: {:?}", ack);
        Ok(ack)
    }

    /// Ask the solver to solve the most recently submitted problem.
    pub async fn solve(&self) -> Result<SolveOutcome> {
        let url = self.endpoint("/solve")?;
        debug!("requesting solve at {}", url);

        let response = self.client.post(url).send().await?;
        let response = ensure_success(response).await?;

        let body: SolveResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Parse(e.to_string()))?;

        Ok(body.into())
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    Err(TransportError::Api {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = SolverClient::new("http://localhost:8080");
        assert!(client.is_ok());
    }

    #[test]
    fn test_invalid_url() {
        let client = SolverClient::new("not a valid url");
        assert!(matches!(client, Err(TransportError::InvalidUrl(_))));
    }

    #[test]
    fn test_endpoints_resolve_against_base() {
        let client = SolverClient::new("http://localhost:8080").unwrap();
        assert_eq!(
            client.endpoint("/solve").unwrap().as_str(),
            "http://localhost:8080/solve"
        );
    }
}
