//! Authenticated session state

use serde::Deserialize;
use std::fmt;

/// OAuth bearer token; expiry is discovered reactively through 401s
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct BearerToken {
    pub token_type: String,
    pub access_token: String,
}

impl BearerToken {
    /// Value of the `Authorization` header
    pub fn header_value(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("token_type", &self.token_type)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Token plus the organization, space and tenant it is scoped to
///
/// Replaced wholesale on re-authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: BearerToken,
    pub org_guid: String,
    pub space_guid: Option<String>,
    pub tenant_id: Option<String>,
}

impl Session {
    /// Query parameters every CAM call carries; empty values are omitted
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        [
            ("ace_orgGuid", Some(&self.org_guid)),
            ("cloudOE_spaceGuid", self.space_guid.as_ref()),
            ("tenantId", self.tenant_id.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .filter(|v| !v.is_empty())
                .map(|v| (name, v.clone()))
        })
        .collect()
    }
}
