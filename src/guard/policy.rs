//! Route policy table: path prefix to required access level.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Prefix protected by the default table.
pub const ADMIN_PREFIX: &str = "/admin";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Public,
    Authenticated,
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Authenticated => f.write_str("authenticated"),
        }
    }
}

impl FromStr for AccessLevel {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "authenticated" => Ok(Self::Authenticated),
            other => Err(PolicyError::InvalidLevel(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("invalid path prefix {0:?}: must start with '/'")]
    InvalidPrefix(String),
    #[error("invalid access level {0:?}: expected 'public' or 'authenticated'")]
    InvalidLevel(String),
    #[error("malformed policy rule {0:?}: expected PREFIX=LEVEL")]
    MalformedRule(String),
}

/// Prefix table evaluated by longest match on whole path segments.
///
/// `/admin` covers `/admin` and `/admin/pages` but not `/administrator`.
/// Paths no rule covers are public.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutePolicy {
    rules: Vec<(String, AccessLevel)>,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self {
            rules: vec![(ADMIN_PREFIX.to_string(), AccessLevel::Authenticated)],
        }
    }
}

impl RoutePolicy {
    /// Empty table: everything is public.
    #[must_use]
    pub const fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add or replace the rule for `prefix`.
    ///
    /// # Errors
    /// Returns an error if the prefix does not start with `/`.
    pub fn with_rule(mut self, prefix: &str, level: AccessLevel) -> Result<Self, PolicyError> {
        let prefix = normalize_prefix(prefix)?;
        if let Some(existing) = self.rules.iter_mut().find(|(p, _)| *p == prefix) {
            existing.1 = level;
        } else {
            self.rules.push((prefix, level));
        }
        Ok(self)
    }

    /// Parse a `PREFIX=LEVEL` rule, as given on the command line.
    ///
    /// # Errors
    /// Returns an error if the rule is malformed or names an unknown level.
    pub fn parse_rule(rule: &str) -> Result<(String, AccessLevel), PolicyError> {
        let (prefix, level) = rule
            .split_once('=')
            .ok_or_else(|| PolicyError::MalformedRule(rule.to_string()))?;
        Ok((normalize_prefix(prefix)?, level.parse()?))
    }

    #[must_use]
    pub fn rules(&self) -> &[(String, AccessLevel)] {
        &self.rules
    }

    /// Access level for `path`; the longest matching prefix wins.
    #[must_use]
    pub fn level_for(&self, path: &str) -> AccessLevel {
        self.rules
            .iter()
            .filter(|(prefix, _)| covers(prefix, path))
            .max_by_key(|(prefix, _)| prefix.len())
            .map_or(AccessLevel::Public, |(_, level)| *level)
    }
}

fn normalize_prefix(prefix: &str) -> Result<String, PolicyError> {
    let trimmed = prefix.trim();
    if !trimmed.starts_with('/') {
        return Err(PolicyError::InvalidPrefix(prefix.to_string()));
    }
    let without_slash = trimmed.trim_end_matches('/');
    if without_slash.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(without_slash.to_string())
    }
}

fn covers(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_table_protects_admin_only() {
        let policy = RoutePolicy::default();
        assert_eq!(policy.level_for("/admin"), AccessLevel::Authenticated);
        assert_eq!(policy.level_for("/admin/"), AccessLevel::Authenticated);
        assert_eq!(policy.level_for("/admin/pages/42/edit"), AccessLevel::Authenticated);
        assert_eq!(policy.level_for("/administrator"), AccessLevel::Public);
        assert_eq!(policy.level_for("/"), AccessLevel::Public);
        assert_eq!(policy.level_for("/projects/foo"), AccessLevel::Public);
    }

    #[test]
    fn longest_prefix_wins() {
        let policy = RoutePolicy::empty()
            .with_rule("/", AccessLevel::Authenticated)
            .unwrap()
            .with_rule("/admin/preview/", AccessLevel::Public)
            .unwrap()
            .with_rule("/admin", AccessLevel::Authenticated)
            .unwrap();

        assert_eq!(policy.level_for("/anything"), AccessLevel::Authenticated);
        assert_eq!(policy.level_for("/admin/pages"), AccessLevel::Authenticated);
        assert_eq!(policy.level_for("/admin/preview"), AccessLevel::Public);
        assert_eq!(policy.level_for("/admin/preview/page-1"), AccessLevel::Public);
    }

    #[test]
    fn with_rule_replaces_existing_prefix() {
        let policy = RoutePolicy::default()
            .with_rule("/admin/", AccessLevel::Public)
            .unwrap();
        assert_eq!(policy.rules().len(), 1);
        assert_eq!(policy.level_for("/admin/pages"), AccessLevel::Public);
    }

    #[test]
    fn empty_table_is_public() {
        assert_eq!(RoutePolicy::empty().level_for("/admin"), AccessLevel::Public);
    }

    #[test]
    fn parse_rule_accepts_and_rejects() {
        assert_eq!(
            RoutePolicy::parse_rule("/settings=Authenticated").unwrap(),
            ("/settings".to_string(), AccessLevel::Authenticated)
        );
        assert_eq!(
            RoutePolicy::parse_rule("/settings"),
            Err(PolicyError::MalformedRule("/settings".to_string()))
        );
        assert_eq!(
            RoutePolicy::parse_rule("settings=public"),
            Err(PolicyError::InvalidPrefix("settings".to_string()))
        );
        assert_eq!(
            RoutePolicy::parse_rule("/settings=admins"),
            Err(PolicyError::InvalidLevel("admins".to_string()))
        );
    }
}
