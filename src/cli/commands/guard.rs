use crate::{
    api::RESERVED_PATHS,
    guard::{AccessLevel, DEFAULT_LANDING_PATH, DEFAULT_LOGIN_PATH, GuardConfig, RoutePolicy},
};
use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_LOGIN_PATH: &str = "login-path";
pub const ARG_LANDING_PATH: &str = "landing-path";
pub const ARG_PROTECT: &str = "protect";

#[derive(Debug, Clone)]
pub struct Options {
    pub login_path: String,
    pub landing_path: String,
    pub policy: RoutePolicy,
}

impl Options {
    /// Parse guard arguments from matches.
    ///
    /// `--protect` rules are applied on top of the default table, so
    /// `/admin=public` is the only way to open the admin area.
    ///
    /// # Errors
    /// Returns an error if a path is not absolute, a rule is malformed, or the
    /// login and landing paths would redirect in a loop.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let login_path = absolute_path(matches, ARG_LOGIN_PATH, DEFAULT_LOGIN_PATH)?;
        let landing_path = absolute_path(matches, ARG_LANDING_PATH, DEFAULT_LANDING_PATH)?;

        let mut policy = RoutePolicy::default();
        for rule in matches
            .get_many::<String>(ARG_PROTECT)
            .into_iter()
            .flatten()
            .filter(|rule| !rule.trim().is_empty())
        {
            let (prefix, level) = RoutePolicy::parse_rule(rule)
                .with_context(|| format!("invalid --{ARG_PROTECT} rule"))?;
            policy = policy.with_rule(&prefix, level)?;
        }

        if policy.level_for(&login_path) == AccessLevel::Authenticated {
            anyhow::bail!("--{ARG_LOGIN_PATH} {login_path:?} is under a protected prefix");
        }
        if landing_path == login_path {
            anyhow::bail!("--{ARG_LANDING_PATH} must differ from --{ARG_LOGIN_PATH}");
        }
        if RESERVED_PATHS.contains(&login_path.as_str()) {
            anyhow::bail!("--{ARG_LOGIN_PATH} {login_path:?} is already a route");
        }

        Ok(Self {
            login_path,
            landing_path,
            policy,
        })
    }

    #[must_use]
    pub fn into_config(self) -> GuardConfig {
        GuardConfig::new(self.policy)
            .with_login_path(self.login_path)
            .with_landing_path(self.landing_path)
    }
}

/// A literal absolute route path, without the trailing slash.
fn absolute_path(matches: &ArgMatches, id: &str, default: &str) -> anyhow::Result<String> {
    let path = matches
        .get_one::<String>(id)
        .map_or(default, String::as_str)
        .trim();
    if !path.starts_with('/') {
        anyhow::bail!("--{id} must start with '/', got {path:?}");
    }
    if path
        .chars()
        .any(|c| matches!(c, '?' | '#' | '{' | '}' | '*') || c.is_whitespace())
    {
        anyhow::bail!("--{id} must be a plain path, got {path:?}");
    }

    let trimmed = path.trim_end_matches('/');
    Ok(if trimmed.is_empty() { "/" } else { trimmed }.to_string())
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_LOGIN_PATH)
                .long(ARG_LOGIN_PATH)
                .help("Where anonymous callers of protected paths are redirected")
                .env("PORTICO_LOGIN_PATH")
                .default_value(DEFAULT_LOGIN_PATH),
        )
        .arg(
            Arg::new(ARG_LANDING_PATH)
                .long(ARG_LANDING_PATH)
                .help("Where authenticated callers of the login page are redirected")
                .env("PORTICO_LANDING_PATH")
                .default_value(DEFAULT_LANDING_PATH),
        )
        .arg(
            Arg::new(ARG_PROTECT)
                .long(ARG_PROTECT)
                .help("Route policy rule PREFIX=LEVEL (public|authenticated), repeatable")
                .long_help(
                    "Route policy rule PREFIX=LEVEL where LEVEL is `public` or `authenticated`.\n\nRules are added to the default table (/admin=authenticated); the longest matching prefix wins and unmatched paths are public.",
                )
                .env("PORTICO_PROTECT")
                .action(ArgAction::Append)
                .value_delimiter(','),
        )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::guard::AccessLevel;

    fn parse(args: &[&str]) -> anyhow::Result<Options> {
        let command = with_args(Command::new("portico").no_binary_name(true));
        let matches = command.try_get_matches_from(args).unwrap();
        Options::parse(&matches)
    }

    #[test]
    fn defaults_protect_admin() {
        temp_env::with_vars(
            [
                ("PORTICO_PROTECT", None::<&str>),
                ("PORTICO_LOGIN_PATH", None),
                ("PORTICO_LANDING_PATH", None),
            ],
            || {
                let options = parse(&[]).unwrap();
                assert_eq!(options.login_path, "/auth/login");
                assert_eq!(options.landing_path, "/admin/dashboard");
                assert_eq!(options.policy, RoutePolicy::default());
            },
        );
    }

    #[test]
    fn protect_rules_extend_default_table() {
        temp_env::with_vars([("PORTICO_PROTECT", None::<&str>)], || {
            let options = parse(&[
                "--protect",
                "/drafts=authenticated",
                "--protect",
                "/admin/preview=public",
            ])
            .unwrap();
            let policy = options.policy;
            assert_eq!(policy.level_for("/drafts/x"), AccessLevel::Authenticated);
            assert_eq!(policy.level_for("/admin/pages"), AccessLevel::Authenticated);
            assert_eq!(policy.level_for("/admin/preview/x"), AccessLevel::Public);
        });
    }

    #[test]
    fn protect_env_is_comma_separated() {
        temp_env::with_vars(
            [("PORTICO_PROTECT", Some("/drafts=authenticated,/admin=public"))],
            || {
                let policy = parse(&[]).unwrap().policy;
                assert_eq!(policy.level_for("/drafts"), AccessLevel::Authenticated);
                assert_eq!(policy.level_for("/admin"), AccessLevel::Public);
            },
        );
    }

    #[test]
    fn rejects_bad_rules_and_paths() {
        temp_env::with_vars([("PORTICO_PROTECT", None::<&str>)], || {
            assert!(parse(&["--protect", "/drafts"]).is_err());
            assert!(parse(&["--protect", "drafts=public"]).is_err());
            assert!(parse(&["--protect", "/drafts=admins"]).is_err());
            assert!(parse(&["--login-path", "auth/login"]).is_err());
        });
    }

    #[test]
    fn rejects_login_paths_that_loop() {
        temp_env::with_vars(
            [
                ("PORTICO_PROTECT", None::<&str>),
                ("PORTICO_LOGIN_PATH", None),
                ("PORTICO_LANDING_PATH", None),
            ],
            || {
                assert!(parse(&["--login-path", "/admin/login"]).is_err());
                assert!(parse(&["--protect", "/auth=authenticated"]).is_err());
                assert!(
                    parse(&["--login-path", "/signin", "--landing-path", "/signin/"]).is_err()
                );
                assert!(
                    parse(&[
                        "--login-path",
                        "/admin/login",
                        "--protect",
                        "/admin/login=public"
                    ])
                    .is_ok()
                );
            },
        );
    }

    #[test]
    fn rejects_login_paths_that_are_not_plain_routes() {
        temp_env::with_vars(
            [
                ("PORTICO_PROTECT", None::<&str>),
                ("PORTICO_LOGIN_PATH", None),
                ("PORTICO_LANDING_PATH", None),
            ],
            || {
                let rejected = [
                    "/",
                    "/health",
                    "/projects",
                    "/auth/logout",
                    "/{slug}",
                    "/in?x=1",
                    "/a b",
                ];
                for path in rejected {
                    assert!(parse(&["--login-path", path]).is_err(), "{path}");
                }
                let options = parse(&["--login-path", "/signin/"]).unwrap();
                assert_eq!(options.login_path, "/signin");
            },
        );
    }

    #[test]
    fn into_config_carries_paths() {
        temp_env::with_vars([("PORTICO_PROTECT", None::<&str>)], || {
            let config = parse(&["--login-path", "/signin", "--landing-path", "/admin/pages"])
                .unwrap()
                .into_config();
            assert_eq!(config.login_path(), "/signin");
            assert_eq!(config.landing_path(), "/admin/pages");
        });
    }
}
