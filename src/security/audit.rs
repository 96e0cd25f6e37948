//! Audit trail and authentication/authorization counters for the security manager.

use std::time::SystemTime;

/// One recorded access/authentication/authorization event.
#[derive(Clone, Debug)]
pub struct AuditEntry {
    pub timestamp: SystemTime,
    pub client_addr: String,
    pub uid: u32,
    pub operation: String,
    pub resource: String,
    pub success: bool,
    pub details: String,
}

impl AuditEntry {
    pub fn new(
        client_addr: impl Into<String>,
        uid: u32,
        operation: impl Into<String>,
        resource: impl Into<String>,
        success: bool,
        details: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: SystemTime::now(),
            client_addr: client_addr.into(),
            uid,
            operation: operation.into(),
            resource: resource.into(),
            success,
            details: details.into(),
        }
    }
}

/// Running counters exposed for monitoring, mirroring what a production
/// security manager tracks alongside the raw audit log.
#[derive(Clone, Copy, Debug, Default)]
pub struct SecurityStats {
    pub total_authentications: u64,
    pub successful_authentications: u64,
    pub failed_authentications: u64,
    pub total_authorizations: u64,
    pub successful_authorizations: u64,
    pub failed_authorizations: u64,
    pub active_sessions: u64,
    pub acl_operations: u64,
    pub audit_events: u64,
}
