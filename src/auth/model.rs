use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::{CAP_MANAGE, CAP_VIEW};

/// JWT claims minted by the host platform's session layer. The capability
/// list is the user's course-independent grants; course-scoped capabilities
/// are resolved against the identity tables instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: Uuid,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub caps: Vec<String>,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    /// Whether the bearer may view their own certificates. Managers
    /// implicitly may.
    pub fn can_view(&self) -> bool {
        self.has_cap(CAP_VIEW) || self.can_manage()
    }

    pub fn can_manage(&self) -> bool {
        self.has_cap(CAP_MANAGE)
    }

    fn has_cap(&self, cap: &str) -> bool {
        self.caps.iter().any(|c| c == cap)
    }
}
