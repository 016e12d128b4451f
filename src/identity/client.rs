use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Request, Status};

use super::session::{SessionError, SessionManager};
use crate::proto::session_service_client::SessionServiceClient;
use crate::proto::{CheckRequest, CreateRequest, DeleteRequest};

/// What the middlewares and handlers see of the session service. Never the
/// transport directly, so tests can substitute their own.
#[async_trait]
pub trait SessionClient: Send + Sync {
    async fn create(&self, principal_id: &str) -> Result<String, SessionError>;
    async fn check(&self, session_name: &str) -> Result<String, SessionError>;
    async fn delete(&self, session_name: &str) -> Result<(), SessionError>;
}

/// In-process client calling a `SessionManager` directly.
#[derive(Clone)]
pub struct LocalSessionClient {
    manager: SessionManager,
}

impl LocalSessionClient {
    pub fn new(manager: SessionManager) -> Self { Self { manager } }
}

#[async_trait]
impl SessionClient for LocalSessionClient {
    async fn create(&self, principal_id: &str) -> Result<String, SessionError> { self.manager.create(principal_id).await }
    async fn check(&self, session_name: &str) -> Result<String, SessionError> { self.manager.check(session_name).await }
    async fn delete(&self, session_name: &str) -> Result<(), SessionError> { self.manager.delete(session_name).await }
}

/// Client for the remote `SessionService`.
#[derive(Clone)]
pub struct GrpcSessionClient {
    inner: SessionServiceClient<Channel>,
}

impl GrpcSessionClient {
    /// Build a lazily-connecting client; the first call dials the endpoint.
    pub fn connect_lazy(addr: &str, timeout: Duration) -> Result<Self, SessionError> {
        let endpoint = Endpoint::from_shared(addr.to_string())
            .map_err(|e| SessionError::InvalidArgument(format!("session service address '{}': {}", addr, e)))?
            .connect_timeout(timeout)
            .timeout(timeout);
        Ok(Self { inner: SessionServiceClient::new(endpoint.connect_lazy()) })
    }

    pub fn from_channel(channel: Channel) -> Self {
        Self { inner: SessionServiceClient::new(channel) }
    }
}

fn status_to_error(status: Status) -> SessionError {
    match status.code() {
        Code::Unauthenticated | Code::NotFound => SessionError::Unauthorized,
        Code::InvalidArgument => SessionError::InvalidArgument(status.message().to_string()),
        Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled => SessionError::Unavailable(status.message().to_string()),
        _ => SessionError::Internal(format!("{:?}: {}", status.code(), status.message())),
    }
}

#[async_trait]
impl SessionClient for GrpcSessionClient {
    async fn create(&self, principal_id: &str) -> Result<String, SessionError> {
        let mut client = self.inner.clone();
        let resp = client
            .create(Request::new(CreateRequest { principal_id: principal_id.to_string() }))
            .await
            .map_err(status_to_error)?;
        Ok(resp.into_inner().session_name)
    }

    async fn check(&self, session_name: &str) -> Result<String, SessionError> {
        let mut client = self.inner.clone();
        let resp = client
            .check(Request::new(CheckRequest { session_name: session_name.to_string() }))
            .await
            .map_err(status_to_error)?;
        Ok(resp.into_inner().principal_id)
    }

    async fn delete(&self, session_name: &str) -> Result<(), SessionError> {
        let mut client = self.inner.clone();
        client
            .delete(Request::new(DeleteRequest { session_name: session_name.to_string() }))
            .await
            .map_err(status_to_error)?;
        Ok(())
    }
}
