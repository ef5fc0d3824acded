use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant billing plan tag. Gates self-service instance launch and
/// credential management to `Pro`/`Enterprise`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Starter,
    Pro,
    Enterprise,
}

impl Tier {
    pub fn allows_self_service(self) -> bool {
        matches!(self, Tier::Pro | Tier::Enterprise)
    }
}

impl std::str::FromStr for Tier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Tier::Free),
            "starter" => Ok(Tier::Starter),
            "pro" => Ok(Tier::Pro),
            "enterprise" => Ok(Tier::Enterprise),
            _ => Err(()),
        }
    }
}

/// The resolved identity of a presented bearer secret: `(tenant, environment, key)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyInfo {
    pub key_id: Uuid,
    pub key_prefix: String,
    pub tenant_id: Uuid,
    pub environment_id: Uuid,
    pub tier: Tier,
    pub requests_per_min: u32,
    pub tokens_per_min: u32,
    pub concurrency: u32,
}
