//! Central identity and session management: who the caller is, how a session
//! cookie resolves to a principal, and how CSRF tokens are bound to sessions.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod token;
mod session;
mod client;
mod csrf;
mod provider;
mod request_context;
mod authorizer;

pub use principal::Role;
pub use token::mint_token;
pub use session::{SessionError, SessionManager};
pub use client::{GrpcSessionClient, LocalSessionClient, SessionClient};
pub use csrf::CsrfIssuer;
pub use provider::{Credentials, LoginProvider, LoginRequest, NewUser, UserRepository};
pub use request_context::{RequestContext, RequestId};
pub use authorizer::{RoleLookup, RoleSet};
