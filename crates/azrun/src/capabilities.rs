//! Capabilities advertised to the host in the init response.

use std::collections::HashMap;

/// The host strips trigger metadata duplicated from the HTTP request.
pub const RPC_HTTP_TRIGGER_METADATA_REMOVED: &str = "RpcHttpTriggerMetadataRemoved";
/// The host sends HTTP bodies without content negotiation wrappers.
pub const RPC_HTTP_BODY_ONLY: &str = "RpcHttpBodyOnly";
/// Raw HTTP bodies arrive as bytes.
pub const RAW_HTTP_BODY_BYTES: &str = "RawHttpBodyBytes";

pub fn capabilities() -> HashMap<String, String> {
    [RPC_HTTP_TRIGGER_METADATA_REMOVED, RPC_HTTP_BODY_ONLY, RAW_HTTP_BODY_BYTES]
        .into_iter()
        .map(|name| (name.to_string(), "true".to_string()))
        .collect()
}
