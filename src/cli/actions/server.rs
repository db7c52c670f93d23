use crate::{
    api::{self, AppState},
    guard::{Gate, GuardConfig},
    session::SessionResolver,
    upstream::UpstreamClient,
};
use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub upstream_url: String,
    pub upstream_timeout: Duration,
    pub session_cookie: String,
    pub guard: GuardConfig,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the upstream client cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let upstream = UpstreamClient::new(&args.upstream_url, args.upstream_timeout)?;
    let resolver = SessionResolver::new(upstream.clone(), args.session_cookie);

    info!(
        upstream = %upstream.base_url(),
        cookie = %resolver.cookie_name(),
        "Using CMS upstream"
    );

    let state = Arc::new(AppState::new(upstream, args.guard.login_path()));
    let gate = Arc::new(Gate::new(resolver, args.guard));

    for (prefix, level) in gate.config().policy().rules() {
        debug!(prefix = %prefix, level = %level, "route policy");
    }

    api::new(args.port, state, gate).await
}
