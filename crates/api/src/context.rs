use tavern_core::TenantKey;

/// Tenant context for a request.
///
/// This is immutable and must be present for all job routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_key: TenantKey,
}

impl TenantContext {
    pub fn new(tenant_key: TenantKey) -> Self {
        Self { tenant_key }
    }

    pub fn tenant_key(&self) -> &TenantKey {
        &self.tenant_key
    }
}
