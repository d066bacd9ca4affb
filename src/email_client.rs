/// Outbound notification dispatch.
///
/// Delivery is best-effort and fire-and-forget: the orchestrator hands a
/// `Notification` to the dispatcher and moves on. Failures are logged,
/// never retried here, and never roll back the operation that triggered
/// them.

use serde::Serialize;
use std::sync::Mutex;

use crate::configuration::EmailSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    AccountActivation,
    PasswordReset,
}

/// One outbound message. `secret` is the activation code or reset token
/// to embed.
#[derive(Debug, Clone)]
pub struct Notification {
    pub to: String,
    pub recipient_name: String,
    pub kind: NotificationKind,
    pub secret: String,
}

pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, notification: Notification);
}

#[derive(Serialize)]
struct SendEmailRequest {
    from: String,
    to: String,
    #[serde(rename = "Subject")]
    subject: String,
    #[serde(rename = "Html")]
    html: String,
}

/// Posts mail to the configured HTTP relay on a spawned task.
#[derive(Clone)]
pub struct EmailDispatcher {
    http_client: reqwest::Client,
    settings: EmailSettings,
}

impl EmailDispatcher {
    pub fn new(http_client: reqwest::Client, settings: EmailSettings) -> Self {
        Self {
            http_client,
            settings,
        }
    }

    fn render(&self, notification: &Notification) -> (String, String) {
        match notification.kind {
            NotificationKind::AccountActivation => (
                "Account activation".to_string(),
                format!(
                    "<p>Hello {},</p>\
                     <p>Your activation code is <b>{}</b>. It expires in 15 minutes.</p>\
                     <p><a href=\"{}{}\">Activate your account</a></p>",
                    notification.recipient_name,
                    notification.secret,
                    self.settings.activation_url,
                    notification.secret,
                ),
            ),
            NotificationKind::PasswordReset => (
                "Forgot password".to_string(),
                format!(
                    "<p>Hello {},</p>\
                     <p><a href=\"{}{}\">Reset your password</a>. \
                     The link expires in 15 minutes.</p>",
                    notification.recipient_name,
                    self.settings.reset_url,
                    notification.secret,
                ),
            ),
        }
    }
}

impl NotificationDispatcher for EmailDispatcher {
    fn dispatch(&self, notification: Notification) {
        let (subject, html) = self.render(&notification);
        let request = SendEmailRequest {
            from: self.settings.sender.clone(),
            to: notification.to.clone(),
            subject,
            html,
        };
        let url = format!("{}/email", self.settings.base_url);
        let client = self.http_client.clone();
        let to = notification.to;

        tokio::spawn(async move {
            let outcome = client
                .post(&url)
                .json(&request)
                .send()
                .await
                .and_then(|response| response.error_for_status());

            match outcome {
                Ok(_) => tracing::info!(to = %to, "notification delivered"),
                Err(e) => tracing::error!(to = %to, error = %e, "notification delivery failed"),
            }
        });
    }
}

/// Test dispatcher that records instead of sending.
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn last_secret(&self, kind: NotificationKind) -> Option<String> {
        self.sent()
            .iter()
            .rev()
            .find(|n| n.kind == kind)
            .map(|n| n.secret.clone())
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn dispatch(&self, notification: Notification) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> EmailSettings {
        EmailSettings {
            base_url: "http://localhost:8025".into(),
            sender: "noreply@sarafbrk.com".into(),
            activation_url: "https://sarafbrk.com/activate-account/".into(),
            reset_url: "https://sarafbrk.com/reset-password/?token=".into(),
        }
    }

    #[test]
    fn activation_mail_embeds_the_code_and_link() {
        let dispatcher = EmailDispatcher::new(reqwest::Client::new(), settings());
        let (subject, html) = dispatcher.render(&Notification {
            to: "jane@x.com".into(),
            recipient_name: "Jane Doe".into(),
            kind: NotificationKind::AccountActivation,
            secret: "123456".into(),
        });

        assert_eq!(subject, "Account activation");
        assert!(html.contains("123456"));
        assert!(html.contains("https://sarafbrk.com/activate-account/123456"));
    }

    #[test]
    fn reset_mail_embeds_the_token_link() {
        let dispatcher = EmailDispatcher::new(reqwest::Client::new(), settings());
        let (subject, html) = dispatcher.render(&Notification {
            to: "jane@x.com".into(),
            recipient_name: "Jane Doe".into(),
            kind: NotificationKind::PasswordReset,
            secret: "tok-abc".into(),
        });

        assert_eq!(subject, "Forgot password");
        assert!(html.contains("https://sarafbrk.com/reset-password/?token=tok-abc"));
    }

    #[test]
    fn recording_dispatcher_captures_in_order() {
        let recorder = RecordingDispatcher::new();
        recorder.dispatch(Notification {
            to: "jane@x.com".into(),
            recipient_name: "Jane".into(),
            kind: NotificationKind::AccountActivation,
            secret: "111111".into(),
        });
        recorder.dispatch(Notification {
            to: "jane@x.com".into(),
            recipient_name: "Jane".into(),
            kind: NotificationKind::AccountActivation,
            secret: "222222".into(),
        });

        assert_eq!(recorder.sent().len(), 2);
        assert_eq!(
            recorder.last_secret(NotificationKind::AccountActivation),
            Some("222222".to_string())
        );
    }
}
