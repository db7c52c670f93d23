use clap::{Arg, ArgMatches, Command};
use std::time::Duration;
use url::Url;

pub const ARG_UPSTREAM_URL: &str = "upstream-url";
pub const ARG_UPSTREAM_TIMEOUT_SECONDS: &str = "upstream-timeout-seconds";
pub const ARG_SESSION_COOKIE: &str = "session-cookie";

#[derive(Debug, Clone)]
pub struct Options {
    pub url: String,
    pub timeout: Duration,
    pub session_cookie: String,
}

impl Options {
    /// Parse upstream arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the URL is missing, is not http(s), or the timeout is zero.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let url = match matches.get_one::<String>(ARG_UPSTREAM_URL) {
            Some(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => anyhow::bail!("missing required argument: --{ARG_UPSTREAM_URL}"),
        };

        let parsed = Url::parse(&url)
            .map_err(|err| anyhow::anyhow!("invalid --{ARG_UPSTREAM_URL} {url:?}: {err}"))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            anyhow::bail!("invalid --{ARG_UPSTREAM_URL} {url:?}: expected an http(s) URL");
        }

        let seconds = matches
            .get_one::<u64>(ARG_UPSTREAM_TIMEOUT_SECONDS)
            .copied()
            .unwrap_or(5);
        if seconds == 0 {
            anyhow::bail!("--{ARG_UPSTREAM_TIMEOUT_SECONDS} must be greater than zero");
        }

        let session_cookie = matches
            .get_one::<String>(ARG_SESSION_COOKIE)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| crate::session::DEFAULT_SESSION_COOKIE.to_string());

        Ok(Self {
            url,
            timeout: Duration::from_secs(seconds),
            session_cookie,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_UPSTREAM_URL)
                .short('u')
                .long(ARG_UPSTREAM_URL)
                .help("Base URL of the CMS backend, example: http://cms.internal:3000")
                .env("PORTICO_UPSTREAM_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_UPSTREAM_TIMEOUT_SECONDS)
                .long(ARG_UPSTREAM_TIMEOUT_SECONDS)
                .help("Timeout for every upstream request, in seconds")
                .env("PORTICO_UPSTREAM_TIMEOUT_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE)
                .long(ARG_SESSION_COOKIE)
                .help("Name of the cookie carrying the session token")
                .env("PORTICO_SESSION_COOKIE")
                .default_value(crate::session::DEFAULT_SESSION_COOKIE),
        )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Options> {
        let command = with_args(Command::new("portico").no_binary_name(true));
        let matches = command.try_get_matches_from(args).unwrap();
        Options::parse(&matches)
    }

    #[test]
    fn defaults() {
        temp_env::with_vars(
            [
                ("PORTICO_UPSTREAM_TIMEOUT_SECONDS", None::<&str>),
                ("PORTICO_SESSION_COOKIE", None),
            ],
            || {
                let options = parse(&["--upstream-url", "http://cms.local:3000"]).unwrap();
                assert_eq!(options.url, "http://cms.local:3000");
                assert_eq!(options.timeout, Duration::from_secs(5));
                assert_eq!(options.session_cookie, "session_token");
            },
        );
    }

    #[test]
    fn rejects_non_http_urls() {
        for url in ["ftp://cms.local", "cms.local", "http://", "   "] {
            assert!(parse(&["--upstream-url", url]).is_err(), "{url}");
        }
    }

    #[test]
    fn rejects_zero_timeout() {
        let err = parse(&[
            "--upstream-url",
            "https://cms.local",
            "--upstream-timeout-seconds",
            "0",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }
}
