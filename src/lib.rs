//! # Portico (session gate for the CMS front end)
//!
//! `portico` sits between browsers and the CMS backend ("upstream"). Every
//! inbound request goes through the same pipeline:
//!
//! 1. **Session resolution:** the session cookie is forwarded to the upstream
//!    `GET /auth/me` endpoint. Any failure degrades to "anonymous"; resolution
//!    never fails the request.
//! 2. **Route guard:** the path is matched against the route policy table
//!    (longest prefix wins, unmatched paths are public). Protected paths without
//!    an identity are redirected to the login page before any loader runs.
//! 3. **Page data loaders:** handlers fetch the opaque CMS payloads (pages,
//!    projects, blogs, media, contacts) and return them as page data, together
//!    with the identity resolved for this request.
//!
//! The identity lives in request extensions only. Nothing about a caller is
//! cached between requests.

pub mod api;
pub mod cli;
pub mod guard;
pub mod session;
pub mod upstream;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
