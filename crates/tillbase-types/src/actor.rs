use crate::id::Id;
use serde::{Deserialize, Serialize};
#[cfg(feature = "schema")]
use schemars::JsonSchema;

pub const GUEST_USER: &str = "Guest";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct Actor {
    pub user: Id,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Actor {
    pub fn guest() -> Self {
        Actor {
            user: Id(GUEST_USER.to_string()),
            full_name: None,
            roles: Vec::new(),
        }
    }

    pub fn named(user: &str) -> Self {
        Actor {
            user: Id(user.to_string()),
            full_name: None,
            roles: Vec::new(),
        }
    }

    pub fn is_guest(&self) -> bool {
        self.user.0.is_empty() || self.user.0 == GUEST_USER
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role || r == "*")
    }

    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(self.user.as_str())
    }
}
