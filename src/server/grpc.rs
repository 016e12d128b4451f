//! gRPC front of the session service.
//!
//! Every failure surfaces as a status code: `Unauthenticated` for absent or
//! expired sessions, `InvalidArgument` for empty inputs, `Unavailable` when the
//! store cannot be reached and `Internal` for anything else.

use std::future::Future;
use std::net::SocketAddr;

use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info};

use crate::error::AppError;
use crate::identity::{SessionError, SessionManager};
use crate::proto::session_service_server::{SessionService, SessionServiceServer};
use crate::proto::{CheckRequest, CheckResponse, CreateRequest, CreateResponse, DeleteRequest, DeleteResponse};

pub struct SessionGrpc {
    manager: SessionManager,
}

impl SessionGrpc {
    pub fn new(manager: SessionManager) -> Self { Self { manager } }
}

fn to_status(err: SessionError) -> Status {
    if matches!(err, SessionError::Unavailable(_) | SessionError::Internal(_)) {
        error!(error = %err, "session backend failure");
    }
    let app: AppError = err.into();
    Status::new(app.grpc_code(), app.message().to_string())
}

#[tonic::async_trait]
impl SessionService for SessionGrpc {
    async fn create(&self, request: Request<CreateRequest>) -> Result<Response<CreateResponse>, Status> {
        let principal_id = request.into_inner().principal_id;
        let session_name = self.manager.create(&principal_id).await.map_err(to_status)?;
        debug!(principal = %principal_id, "session created");
        Ok(Response::new(CreateResponse { session_name }))
    }

    async fn check(&self, request: Request<CheckRequest>) -> Result<Response<CheckResponse>, Status> {
        let principal_id = self.manager.check(&request.into_inner().session_name).await.map_err(to_status)?;
        Ok(Response::new(CheckResponse { principal_id }))
    }

    async fn delete(&self, request: Request<DeleteRequest>) -> Result<Response<DeleteResponse>, Status> {
        self.manager.delete(&request.into_inner().session_name).await.map_err(to_status)?;
        Ok(Response::new(DeleteResponse {}))
    }
}

pub fn service(manager: SessionManager) -> SessionServiceServer<SessionGrpc> {
    SessionServiceServer::new(SessionGrpc::new(manager))
}

/// Serve the session service on `addr` until `shutdown` resolves.
pub async fn serve<F>(addr: SocketAddr, manager: SessionManager, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    info!(%addr, "session service listening");
    Server::builder().add_service(service(manager)).serve_with_shutdown(addr, shutdown).await?;
    info!("session service stopped");
    Ok(())
}
