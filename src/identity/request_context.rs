/// Per-request id minted by the access-log middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// The authenticated caller, attached to request extensions once the session
/// cookie has been resolved. Dropped with the request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub principal_id: String,
    pub session_name: String,
    pub request_id: Option<String>,
}
