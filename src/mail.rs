//! Mail collaborator seam.
//!
//! Delivery is best-effort: a failed notification is surfaced as
//! [`NotifyError`] and logged by the caller, it never undoes a persisted
//! participation.
use std::collections::HashMap;

#[derive(thiserror::Error, Debug)]
#[error("mail delivery unavailable: {0}")]
pub struct NotifyError(pub String);

pub trait MailNotifier {
    fn send_notification(
        &self,
        recipient: &str,
        template: &str,
        variables: &HashMap<String, String>,
    ) -> Result<(), NotifyError>;
}

/// Notifier used when no mail transport is wired in.
pub struct NullNotifier;

impl MailNotifier for NullNotifier {
    fn send_notification(
        &self,
        recipient: &str,
        template: &str,
        _variables: &HashMap<String, String>,
    ) -> Result<(), NotifyError> {
        tracing::debug!(recipient, template, "no mail transport configured, skipping notification");
        Ok(())
    }
}
