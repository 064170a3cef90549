//! `pushbridge devices`: list devices on the account.

use pushbridge_core::api::PushApi;
use pushbridge_core::config::BridgeConfig;

use super::{CliError, build_api};

pub async fn handle_devices(config: &BridgeConfig) -> Result<(), CliError> {
    let devices = build_api(config)?.list_devices().await?;

    if devices.is_empty() {
        println!("No devices.");
        return Ok(());
    }

    println!("{:<24}  {:<24}  TYPE", "IDEN", "NICKNAME");
    for device in devices.iter().filter(|d| d.active) {
        let marker = if device.nickname.as_deref() == Some(config.device_name.as_str()) {
            "  (this bridge)"
        } else {
            ""
        };
        println!(
            "{:<24}  {:<24}  {}{}",
            device.iden,
            device.nickname.as_deref().unwrap_or("-"),
            device.kind.as_deref().unwrap_or("-"),
            marker
        );
    }
    Ok(())
}
