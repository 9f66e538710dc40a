//! Per-request inputs of the lifecycle controller.

/// What the host knows about the request driving a session event.
///
/// Passed explicitly into controller calls instead of being looked up
/// from a global "current request".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Remote address of the client
    pub client_address: String,
    /// Raw User-Agent header
    pub user_agent: String,
    /// Principal authenticated for this request, if any
    pub user_id: Option<String>,
}

impl RequestContext {
    pub fn new(client_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            client_address: client_address.into(),
            user_agent: user_agent.into(),
            user_id: None,
        }
    }

    /// Attach the authenticated principal
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Resolves the principal owning the in-flight request.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, ctx: &RequestContext) -> Option<String>;
}

/// Default resolver: trusts the user id the host put into the context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextIdentity;

impl IdentityResolver for ContextIdentity {
    fn resolve(&self, ctx: &RequestContext) -> Option<String> {
        ctx.user_id.clone()
    }
}

impl<F> IdentityResolver for F
where
    F: Fn(&RequestContext) -> Option<String> + Send + Sync,
{
    fn resolve(&self, ctx: &RequestContext) -> Option<String> {
        self(ctx)
    }
}
