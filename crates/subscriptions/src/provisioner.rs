//! Bucket provisioning client
//!
//! After a subscription is created the user's storage bucket is provisioned by
//! a separate service. The caller's authorization header is forwarded as-is so
//! the bucket service can identify the user itself.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client};
use subsvc_shared::UserId;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Missing authorization to forward to the bucket service")]
    MissingAuthorization,
    #[error("Bucket service rejected the request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("Bucket service request failed: {0}")]
    Transport(String),
    #[error("Invalid bucket service configuration: {0}")]
    Config(String),
}

impl ProvisionError {
    /// Failures worth another attempt
    fn is_transient(&self) -> bool {
        match self {
            ProvisionError::Transport(_) => true,
            // 404 while the bucket service is still registering routes after a deploy
            ProvisionError::Rejected { status, .. } => {
                matches!(*status, 404 | 408 | 429 | 502 | 503 | 504)
            }
            _ => false,
        }
    }
}

#[async_trait]
pub trait BucketProvisioner: Send + Sync {
    /// Create the storage bucket for a freshly subscribed user
    async fn create_bucket(
        &self,
        user_id: UserId,
        authorization: Option<&str>,
    ) -> Result<(), ProvisionError>;
}

#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    pub base_url: String,
    /// Per-attempt request timeout
    pub timeout: Duration,
    /// Additional attempts after the first one
    pub retries: usize,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:2000".to_string(),
            timeout: Duration::from_secs(5),
            retries: 3,
        }
    }
}

pub struct HttpBucketProvisioner {
    client: Client,
    endpoint: String,
    retries: usize,
}

impl HttpBucketProvisioner {
    pub fn new(config: ProvisionerConfig) -> Result<Self, ProvisionError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProvisionError::Config(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/buckets", config.base_url.trim_end_matches('/')),
            retries: config.retries,
        })
    }

    async fn attempt(&self, authorization: &str) -> Result<(), ProvisionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(|e| ProvisionError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(ProvisionError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl BucketProvisioner for HttpBucketProvisioner {
    async fn create_bucket(
        &self,
        user_id: UserId,
        authorization: Option<&str>,
    ) -> Result<(), ProvisionError> {
        let authorization = authorization.ok_or(ProvisionError::MissingAuthorization)?;

        tracing::info!(user_id, endpoint = %self.endpoint, "Provisioning bucket");

        let strategy = ExponentialBackoff::from_millis(2)
            .factor(50)
            .max_delay(Duration::from_secs(2))
            .map(jitter)
            .take(self.retries);

        let result = RetryIf::spawn(
            strategy,
            || self.attempt(authorization),
            |e: &ProvisionError| {
                let retry = e.is_transient();
                if retry {
                    tracing::warn!(user_id, error = %e, "Bucket provisioning attempt failed, retrying");
                }
                retry
            },
        )
        .await;

        match &result {
            Ok(()) => tracing::info!(user_id, "Bucket provisioned"),
            Err(e) => tracing::error!(user_id, error = %e, "Bucket provisioning failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provisioner(base_url: String, retries: usize) -> HttpBucketProvisioner {
        HttpBucketProvisioner::new(ProvisionerConfig {
            base_url,
            timeout: Duration::from_secs(2),
            retries,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_forwards_authorization_header() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/buckets")
            .match_header("authorization", "Bearer user-token")
            .with_status(201)
            .create_async()
            .await;

        let result = provisioner(server.url(), 0)
            .create_bucket(42, Some("Bearer user-token"))
            .await;

        assert!(result.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_authorization_never_calls_service() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/buckets")
            .expect(0)
            .create_async()
            .await;

        let err = provisioner(server.url(), 2)
            .create_bucket(42, None)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::MissingAuthorization));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/buckets")
            .with_status(400)
            .with_body("bad request")
            .expect(1)
            .create_async()
            .await;

        let err = provisioner(server.url(), 3)
            .create_bucket(42, Some("Bearer t"))
            .await
            .unwrap_err();

        match err {
            ProvisionError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "bad request");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unavailable_is_retried_then_fails() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/buckets")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let err = provisioner(server.url(), 2)
            .create_bucket(42, Some("Bearer t"))
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Rejected { status: 503, .. }));
        mock.assert_async().await;
    }

    #[test]
    fn test_transient_classification() {
        let transient = ProvisionError::Rejected {
            status: 503,
            message: String::new(),
        };
        let permanent = ProvisionError::Rejected {
            status: 403,
            message: String::new(),
        };
        assert!(transient.is_transient());
        assert!(!permanent.is_transient());
        assert!(ProvisionError::Transport("reset".into()).is_transient());
        assert!(!ProvisionError::MissingAuthorization.is_transient());
    }
}
