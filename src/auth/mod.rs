//! Identity collaborator: token issuance/verification and the typed
//! principal threaded through the request path.

mod token;

pub use token::{Claims, TokenSigner};

use serde::{Deserialize, Serialize};

/// Role carried as an explicit token claim and checked by a dedicated guard,
/// not an ad hoc boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Superuser,
}

/// Caller identity resolved once per request, before the pipeline starts.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
    pub phone_model: String,
    pub os: String,
}

impl Principal {
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            role: claims.role,
            phone_model: claims.phone_model,
            os: claims.os,
        }
    }

    pub fn is_superuser(&self) -> bool {
        self.role == Role::Superuser
    }
}
