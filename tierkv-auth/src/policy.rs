//! Operation to permission mapping enforced by transports.
//!
//! A transport resolves each inbound request to an [`Operation`] (from an HTTP
//! verb or an RPC method path), then calls [`crate::AuthManager::authorize`].
//! Requests that resolve to no operation must be denied by the caller.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::permission::Permission;

/// RPC service path prefix, e.g. `/tierkv.TierKv/Get`.
pub const RPC_SERVICE_PREFIX: &str = "/tierkv.TierKv/";

/// Something a client can ask the server to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Get,
    Set,
    SetWithTtl,
    Delete,
    CreateApiKey,
    GetApiKey,
    DisableApiKey,
    EnableApiKey,
    SetExpiration,
    DeleteApiKey,
}

impl Operation {
    pub const ALL: [Operation; 10] = [
        Operation::Get,
        Operation::Set,
        Operation::SetWithTtl,
        Operation::Delete,
        Operation::CreateApiKey,
        Operation::GetApiKey,
        Operation::DisableApiKey,
        Operation::EnableApiKey,
        Operation::SetExpiration,
        Operation::DeleteApiKey,
    ];

    /// RPC method name.
    pub fn method_name(self) -> &'static str {
        match self {
            Operation::Get => "Get",
            Operation::Set => "Set",
            Operation::SetWithTtl => "SetWithTTL",
            Operation::Delete => "Delete",
            Operation::CreateApiKey => "CreateAPIKey",
            Operation::GetApiKey => "GetAPIKey",
            Operation::DisableApiKey => "DisableAPIKey",
            Operation::EnableApiKey => "EnableAPIKey",
            Operation::SetExpiration => "SetExpiration",
            Operation::DeleteApiKey => "DeleteAPIKey",
        }
    }

    /// Whether this reads or writes application data (as opposed to keys).
    pub fn is_data_operation(self) -> bool {
        matches!(
            self,
            Operation::Get | Operation::Set | Operation::SetWithTtl | Operation::Delete
        )
    }

    /// Resolve an HTTP verb. Unknown verbs resolve to `None`.
    pub fn from_http_method(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "GET" | "HEAD" => Some(Operation::Get),
            "POST" | "PUT" => Some(Operation::Set),
            "DELETE" => Some(Operation::Delete),
            _ => None,
        }
    }

    /// Resolve a fully qualified RPC method path such as `/tierkv.TierKv/Set`.
    pub fn from_rpc_path(path: &str) -> Option<Self> {
        let name = path.strip_prefix(RPC_SERVICE_PREFIX)?;
        Operation::ALL
            .into_iter()
            .find(|op| op.method_name() == name)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

/// Permission required for each operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    rules: HashMap<Operation, Permission>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        let rules = Operation::ALL
            .into_iter()
            .map(|op| {
                let required = match op {
                    Operation::Get => Permission::Read,
                    Operation::Set | Operation::SetWithTtl => Permission::Write,
                    Operation::Delete => Permission::Delete,
                    _ => Permission::Admin,
                };
                (op, required)
            })
            .collect();
        Self { rules }
    }
}

impl AccessPolicy {
    /// Override the permission for one operation.
    pub fn with_rule(mut self, operation: Operation, required: Permission) -> Self {
        self.rules.insert(operation, required);
        self
    }

    /// Permission an operation needs. Unlisted operations need `Admin`.
    pub fn required(&self, operation: Operation) -> Permission {
        self.rules
            .get(&operation)
            .copied()
            .unwrap_or(Permission::Admin)
    }
}

/// Extract the token from an `Authorization` header value.
///
/// Accepts `Bearer <token>` and `Bearer: <token>`, scheme case-insensitive.
pub fn parse_bearer(header: &str) -> Option<&str> {
    let mut parts = header.split_whitespace();
    let scheme = parts.next()?;
    let token = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let scheme = scheme.strip_suffix(':').unwrap_or(scheme);
    scheme.eq_ignore_ascii_case("bearer").then_some(token)
}
