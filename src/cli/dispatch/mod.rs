//! Command-line argument dispatch.
//!
//! Maps validated CLI arguments to the action to run, with the upstream and
//! guard configuration already checked.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{guard, upstream};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    let upstream_opts = upstream::Options::parse(matches)?;
    let guard_opts = guard::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        upstream_url: upstream_opts.url,
        upstream_timeout: upstream_opts.timeout,
        session_cookie: upstream_opts.session_cookie,
        guard: guard_opts.into_config(),
    }))
}
