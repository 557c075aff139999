//! Capabilities and the acting editor.
//!
//! Every admin operation names the capabilities it needs. The [`Actor`] is
//! installed into request extensions by the admin auth middleware and
//! extracted by handlers.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::Serialize;

use crate::error::{CmsError, CmsResult};

/// A single admin capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    AddPath,
    AddPage,
    ChangePage,
    DeletePage,
    AddValue,
    ChangeValue,
    DeleteValue,
    AddRendered,
    ChangeRendered,
    DeleteRendered,
}

impl Permission {
    pub const ALL: [Permission; 10] = [
        Permission::AddPath,
        Permission::AddPage,
        Permission::ChangePage,
        Permission::DeletePage,
        Permission::AddValue,
        Permission::ChangeValue,
        Permission::DeleteValue,
        Permission::AddRendered,
        Permission::ChangeRendered,
        Permission::DeleteRendered,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Permission::AddPath => "add_path",
            Permission::AddPage => "add_page",
            Permission::ChangePage => "change_page",
            Permission::DeletePage => "delete_page",
            Permission::AddValue => "add_value",
            Permission::ChangeValue => "change_value",
            Permission::DeleteValue => "delete_value",
            Permission::AddRendered => "add_rendered",
            Permission::ChangeRendered => "change_rendered",
            Permission::DeleteRendered => "delete_rendered",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown permission `{s}`"))
    }
}

/// The editor performing a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    permissions: HashSet<Permission>,
}

impl Actor {
    pub fn new(id: impl Into<String>, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            id: id.into(),
            permissions: permissions.into_iter().collect(),
        }
    }

    /// An actor holding every capability.
    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(id, Permission::ALL)
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Fail with [`CmsError::Forbidden`] unless every capability is held.
    pub fn require(&self, permissions: &[Permission]) -> CmsResult<()> {
        match permissions.iter().find(|p| !self.has(**p)) {
            Some(missing) => {
                tracing::debug!(actor = %self.id, permission = %missing, "permission denied");
                Err(CmsError::Forbidden)
            }
            None => Ok(()),
        }
    }
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = CmsError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Actor>()
            .cloned()
            .ok_or(CmsError::Unauthorized)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn require_checks_every_capability() {
        let editor = Actor::new("editor", [Permission::ChangePage, Permission::AddValue]);
        assert!(editor.require(&[Permission::ChangePage]).is_ok());
        assert!(matches!(
            editor.require(&[Permission::ChangePage, Permission::DeletePage]),
            Err(CmsError::Forbidden)
        ));
        assert!(Actor::admin("root").require(&Permission::ALL).is_ok());
    }

    #[test]
    fn names_round_trip() {
        for permission in Permission::ALL {
            assert_eq!(permission.as_str().parse::<Permission>().unwrap(), permission);
        }
        assert!("publish".parse::<Permission>().is_err());
    }

    #[tokio::test]
    async fn extractor_requires_an_installed_actor() {
        let (mut parts, ()) = axum::http::Request::new(()).into_parts();
        assert!(matches!(
            Actor::from_request_parts(&mut parts, &()).await,
            Err(CmsError::Unauthorized)
        ));

        parts.extensions.insert(Actor::admin("root"));
        let actor = Actor::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(actor.id, "root");
    }
}
