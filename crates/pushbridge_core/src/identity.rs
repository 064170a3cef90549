//! Local endpoint identity.
//!
//! The bridge registers itself as a device on the account so that pushes can
//! be addressed to it, and so that pushes addressed to other devices can be
//! told apart.

use std::fmt;

use tracing::{debug, info};

use crate::api::PushApi;
use crate::error::{ApiError, BridgeError};

/// Nickname the bridge registers under unless configured otherwise.
pub const DEFAULT_DEVICE_NAME: &str = "ioBroker";

/// Identifier of this installation's device on the account.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointIdentity(String);

impl EndpointIdentity {
    /// Wrap a device iden.
    pub fn new(iden: impl Into<String>) -> Self {
        Self(iden.into())
    }

    /// The iden as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact comparison against a push's `target_device_iden`.
    pub fn matches(&self, target: &str) -> bool {
        self.0 == target
    }
}

impl fmt::Display for EndpointIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Find the active device named `nickname`, creating it if missing.
///
/// Never creates a second device when one with the name already exists.
pub async fn resolve(api: &dyn PushApi, nickname: &str) -> Result<EndpointIdentity, BridgeError> {
    let devices = api
        .list_devices()
        .await
        .map_err(BridgeError::IdentityResolution)?;

    if let Some(device) = devices
        .iter()
        .find(|d| d.active && d.nickname.as_deref() == Some(nickname))
    {
        debug!("Found existing device {} ({})", nickname, device.iden);
        return Ok(EndpointIdentity::new(device.iden.clone()));
    }

    let created = api
        .create_device(nickname)
        .await
        .map_err(BridgeError::IdentityResolution)?;
    if created.iden.is_empty() {
        return Err(BridgeError::IdentityResolution(ApiError::Malformed(
            "created device has no iden".to_string(),
        )));
    }

    info!("Registered device {} ({})", nickname, created.iden);
    Ok(EndpointIdentity::new(created.iden))
}
