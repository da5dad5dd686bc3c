use async_trait::async_trait;

use super::NotificationMessage;
use crate::utils::IsTransient;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel unavailable: {0}")]
    Transient(String),

    #[error("Channel rejected message: {0}")]
    Rejected(String),
}

impl IsTransient for ChannelError {
    fn is_transient(&self) -> bool {
        matches!(self, ChannelError::Transient(_))
    }
}

/// Outbound delivery channel addressed by recipient email
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, message: &NotificationMessage) -> Result<(), ChannelError>;
}

/// Writes every message to the log; the channel used when no mail
/// provider is wired in
#[derive(Debug, Default, Clone)]
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, message: &NotificationMessage) -> Result<(), ChannelError> {
        let payload = serde_json::to_string(message).map_err(|e| ChannelError::Rejected(e.to_string()))?;
        tracing::info!(
            notification_type = message.notification_type.as_str(),
            recipient = %message.recipient_email,
            reference_id = %message.reference_id,
            payload = %payload,
            "Notification sent"
        );
        Ok(())
    }
}
