use std::future::Future;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("no signed-in user")]
    Anonymous,
}

/// Who is playing. Advisory only; nothing in a season depends on it.
pub trait IdentityProvider {
    fn current_user(&self) -> impl Future<Output = Result<UserInfo, IdentityError>> + Send;
}

/// Fixed identity, or anonymous when empty.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<UserInfo>);

impl StaticIdentity {
    pub fn user(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self(Some(UserInfo {
            id: id.into(),
            name: name.into(),
        }))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    async fn current_user(&self) -> Result<UserInfo, IdentityError> {
        self.0.clone().ok_or(IdentityError::Anonymous)
    }
}
