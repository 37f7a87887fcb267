//! Endpoint, base URL and model selection for one tool run.
//!
//! Endpoint name precedence, highest first:
//! 1. the profile's override for the tool's protocol
//! 2. the key's override for the tool's protocol
//! 3. the tool's protocol, used as the endpoint name

use tracing::debug;

use crate::layers::{first_layer, Layer, Sourced};
use crate::types::{Credential, Endpoint, Profile, Tool};
use crate::vendors::ResolvedVendor;
use crate::{ConfigError, Result};

/// The endpoint chosen for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSelection {
    /// Endpoint name and the layer that chose it.
    pub name: Sourced<String>,
    /// The vendor's endpoint entry.
    pub endpoint: Endpoint,
}

/// Pick the endpoint for `tool` on `vendor`.
pub fn select_endpoint(
    vendor: &ResolvedVendor,
    tool: &Tool,
    profile: &Profile,
    key_name: &str,
    key: &Credential,
) -> Result<EndpointSelection> {
    let protocol = tool.protocol.as_str();

    let name = first_layer([
        (Layer::Profile, profile.endpoints.get(protocol).cloned()),
        (Layer::Credential, key.protocols.get(protocol).cloned()),
        (Layer::ToolProtocol, Some(protocol.to_string())),
    ])
    .ok_or_else(|| ConfigError::EndpointNotSupported {
        vendor: vendor.name.clone(),
        endpoint: protocol.to_string(),
    })?;

    let endpoint = vendor
        .endpoint(&name.value)
        .cloned()
        .ok_or_else(|| ConfigError::EndpointNotSupported {
            vendor: vendor.name.clone(),
            endpoint: name.value.clone(),
        })?;

    if !key.allows_endpoint(&name.value) {
        return Err(ConfigError::EndpointNotAllowed {
            key: key_name.to_string(),
            endpoint: name.value.clone(),
            allowed: key.allowed_endpoints(),
        });
    }

    debug!(
        vendor = %vendor.name,
        protocol,
        endpoint = %name.value,
        layer = %name.layer,
        "selected endpoint"
    );

    Ok(EndpointSelection { name, endpoint })
}

/// Base URL: profile override, else the endpoint URL.
pub fn select_base_url(profile: &Profile, endpoint: &Endpoint) -> Sourced<String> {
    first_layer([
        (Layer::Profile, profile.base_url.clone()),
        (Layer::Endpoint, Some(endpoint.url.clone())),
    ])
    .unwrap_or_else(|| Sourced::new(String::new(), Layer::Unset))
}

/// Model: profile override, else the endpoint default, else empty.
pub fn select_model(profile: &Profile, endpoint: &Endpoint) -> Sourced<String> {
    first_layer([
        (Layer::Profile, profile.model.clone()),
        (Layer::Endpoint, endpoint.default_model.clone()),
    ])
    .unwrap_or_else(|| Sourced::new(String::new(), Layer::Unset))
}
