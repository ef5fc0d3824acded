use crate::{SecurityContext, SecurityError};
use common_auth::Tier;

/// Actions gated to tenants on `Pro`/`Enterprise` plans (self-service
/// instance launch and credential management).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    SelfServiceNodeLaunch,
    ManageCredentials,
}

fn minimum_tier(cap: Capability) -> Tier {
    match cap {
        Capability::SelfServiceNodeLaunch => Tier::Pro,
        Capability::ManageCredentials => Tier::Pro,
    }
}

pub fn ensure_capability(ctx: &SecurityContext, cap: Capability) -> Result<(), SecurityError> {
    if ctx.tier >= minimum_tier(cap) {
        Ok(())
    } else {
        Err(SecurityError::TierRestricted { required: minimum_tier(cap) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn mk_ctx(tier: Tier) -> SecurityContext {
        SecurityContext {
            tenant_id: Uuid::new_v4(),
            environment_id: Uuid::new_v4(),
            key_id: Uuid::new_v4(),
            tier,
            trace_id: None,
        }
    }

    #[test]
    fn free_tier_cannot_self_serve_launch() {
        let ctx = mk_ctx(Tier::Free);
        assert!(ensure_capability(&ctx, Capability::SelfServiceNodeLaunch).is_err());
    }

    #[test]
    fn pro_tier_can_self_serve_launch() {
        let ctx = mk_ctx(Tier::Pro);
        assert!(ensure_capability(&ctx, Capability::SelfServiceNodeLaunch).is_ok());
    }

    #[test]
    fn enterprise_tier_can_manage_credentials() {
        let ctx = mk_ctx(Tier::Enterprise);
        assert!(ensure_capability(&ctx, Capability::ManageCredentials).is_ok());
    }
}
