//! `pushbridge send`: outbound relay.

use pushbridge_core::config::BridgeConfig;
use pushbridge_core::relay::{OutboundMessage, Relay};

use super::args::SendArgs;
use super::{CliError, build_api};

/// Send one message and print the per-receiver outcome.
///
/// Returns `Ok(false)` when at least one receiver failed.
pub async fn handle_send(config: &BridgeConfig, args: SendArgs) -> Result<bool, CliError> {
    let message = build_message(args)?;
    let relay = Relay::new(
        build_api(config)?,
        config.receiver_list(),
        config.default_title.clone(),
    );

    let report = relay.send(&message).await?;
    for delivery in &report.deliveries {
        let receiver = if delivery.receiver.is_empty() {
            "(all devices)"
        } else {
            delivery.receiver.as_str()
        };
        match &delivery.result {
            Ok(Some(iden)) => println!("sent    {}  {}", receiver, iden),
            Ok(None) => println!("sent    {}", receiver),
            Err(e) => println!("failed  {}  {}", receiver, e),
        }
    }
    Ok(report.all_ok())
}

/// Message text (bare or JSON) with flags taking precedence.
fn build_message(args: SendArgs) -> Result<OutboundMessage, CliError> {
    let mut message = match &args.message {
        Some(text) => OutboundMessage::parse(text)?,
        None => OutboundMessage::default(),
    };

    if args.kind.is_some() {
        message.kind = args.kind;
    }
    if args.title.is_some() {
        message.title = args.title;
    }
    if args.receiver.is_some() {
        message.receiver = args.receiver;
    }
    if args.link.is_some() {
        message.link = args.link;
    }
    if args.file.is_some() {
        message.file = args.file;
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushbridge_core::relay::OutboundKind;
    use std::path::PathBuf;

    #[test]
    fn test_bare_message() {
        let msg = build_message(SendArgs {
            message: Some("Washing machine done".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(msg.kind(), OutboundKind::Note);
        assert_eq!(msg.message.as_deref(), Some("Washing machine done"));
        assert!(msg.title.is_none());
    }

    #[test]
    fn test_flags_override_json() {
        let msg = build_message(SendArgs {
            kind: Some("file".to_string()),
            file: Some(PathBuf::from("snap.jpg")),
            message: Some(r#"{"type": "note", "title": "Snapshot", "receiver": "dev1"}"#.to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(msg.kind(), OutboundKind::File);
        assert_eq!(msg.title.as_deref(), Some("Snapshot"));
        assert_eq!(msg.receiver.as_deref(), Some("dev1"));
        assert_eq!(msg.file, Some(PathBuf::from("snap.jpg")));
    }
}
