//! The caller's identity as reported by upstream `/auth/me`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Authenticated caller for the current request.
///
/// Built from the upstream body on every request and dropped with it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawIdentity")]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub name: Option<String>,
    pub roles: Vec<String>,
    pub created_at: Option<String>,
}

impl Identity {
    #[must_use]
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.trim().to_string();
        }
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

// Upstream variants disagree: ids are strings or numbers, and roles come as a
// single `role` or a `roles` list.
#[derive(Deserialize)]
struct RawIdentity {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    created_at: Option<String>,
}

impl From<RawIdentity> for Identity {
    fn from(raw: RawIdentity) -> Self {
        let mut roles = raw.roles;
        if let Some(role) = raw.role
            && !roles.iter().any(|r| r == &role)
        {
            roles.push(role);
        }
        roles.retain(|r| !r.trim().is_empty());

        Self {
            id: raw.id,
            email: raw.email,
            first_name: raw.first_name,
            last_name: raw.last_name,
            name: raw.name,
            roles,
            created_at: raw.created_at,
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected non-empty string or number id, got {other}"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_backend_user() {
        let identity: Identity = serde_json::from_value(json!({
            "id": "8f2d",
            "email": "ada@example.com",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "created_at": "2025-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(identity.id, "8f2d");
        assert_eq!(identity.display_name(), "Ada Lovelace");
        assert!(identity.roles.is_empty());
    }

    #[test]
    fn merges_single_role_and_numeric_id() {
        let identity: Identity = serde_json::from_value(json!({
            "id": 1,
            "name": "Admin User",
            "email": "admin@example.com",
            "role": "admin",
            "roles": ["editor"]
        }))
        .unwrap();
        assert_eq!(identity.id, "1");
        assert_eq!(identity.display_name(), "Admin User");
        assert!(identity.has_role("ADMIN"));
        assert!(identity.has_role("editor"));
        assert!(!identity.has_role("owner"));
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let identity: Identity =
            serde_json::from_value(json!({ "id": "x", "email": "x@example.com" })).unwrap();
        assert_eq!(identity.display_name(), "x@example.com");
    }

    #[test]
    fn rejects_missing_or_blank_id() {
        assert!(serde_json::from_value::<Identity>(json!({ "email": "a@b.c" })).is_err());
        assert!(serde_json::from_value::<Identity>(json!({ "id": " " })).is_err());
        assert!(serde_json::from_value::<Identity>(json!([1, 2])).is_err());
    }

    #[test]
    fn serializes_flat() {
        let identity: Identity =
            serde_json::from_value(json!({ "id": "u1", "email": "u@example.com", "role": "admin" }))
                .unwrap();
        let value = serde_json::to_value(&identity).unwrap();
        assert_eq!(value["id"], "u1");
        assert_eq!(value["roles"], json!(["admin"]));
        assert!(value.get("role").is_none());
    }
}
