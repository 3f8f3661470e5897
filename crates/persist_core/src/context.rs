use serde::{Deserialize, Serialize};
use uuid::Uuid;

const SELF_REFERENCES: [&str; 3] = ["me", "current", "self"];
const ELEVATED_ROLES: [&str; 2] = ["admin", "super_admin"];

/// Identity of the caller, supplied per operation by the authentication layer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionContext {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub company_id: Option<Uuid>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl ResolutionContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_company(mut self, company_id: Uuid) -> Self {
        self.company_id = Some(company_id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_elevated(&self) -> bool {
        self.role.as_deref().is_some_and(|role| {
            ELEVATED_ROLES
                .iter()
                .any(|elevated| role.eq_ignore_ascii_case(elevated))
        })
    }

    /// First and last name for rows created on the caller's behalf.
    pub fn display_names(&self) -> (String, String) {
        let parts: Vec<&str> = self
            .name
            .as_deref()
            .map(|name| name.split_whitespace().collect())
            .unwrap_or_default();
        let first = self
            .first_name
            .clone()
            .or_else(|| parts.first().map(|part| part.to_string()))
            .unwrap_or_else(|| "Admin".to_string());
        let last = self
            .last_name
            .clone()
            .or_else(|| {
                if parts.len() > 1 {
                    parts.last().map(|part| part.to_string())
                } else {
                    None
                }
            })
            .unwrap_or_else(|| "User".to_string());
        (first, last)
    }
}

/// `"me"`, `"current"` and `"self"` refer to the calling user.
pub fn is_self_reference(value: &str) -> bool {
    let value = value.trim();
    SELF_REFERENCES
        .iter()
        .any(|sentinel| value.eq_ignore_ascii_case(sentinel))
}
