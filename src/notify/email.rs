//! Best-effort email notifications.
//!
//! Posts a SendGrid v3 payload to the configured recipient. When any of the
//! key, sender or recipient is unset the send is silently skipped; failures
//! are logged and never propagated to the caller.

use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Email as EmailSettings;
use crate::error::EngineError;

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";

pub struct EmailNotifier {
    http: reqwest::Client,
    api_key: Option<String>,
    from: Option<String>,
    recipient: Option<String>,
}

impl EmailNotifier {
    pub fn new(settings: &EmailSettings) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| EngineError::Configuration(format!("email client: {}", e)))?;

        Ok(Self {
            http,
            api_key: settings.sendgrid_api_key.clone().filter(|v| !v.is_empty()),
            from: settings.from_email.clone().filter(|v| !v.is_empty()),
            recipient: settings.recipient.clone().filter(|v| !v.is_empty()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.from.is_some() && self.recipient.is_some()
    }

    /// Send to the configured recipient. Never fails the caller.
    pub async fn send(&self, subject: &str, body: &str) {
        let (Some(api_key), Some(from), Some(to)) = (
            self.api_key.as_deref(),
            self.from.as_deref(),
            self.recipient.as_deref(),
        ) else {
            debug!("email not configured, skipping notification");
            return;
        };

        let payload = json!({
            "personalizations": [{ "to": [{ "email": to }] }],
            "from": { "email": from },
            "subject": subject,
            "content": [{ "type": "text/plain", "value": body }],
        });

        match self
            .http
            .post(SENDGRID_URL)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                debug!(subject, "notification email sent");
            }
            Ok(response) => {
                warn!(subject, status = %response.status(), "email send rejected");
            }
            Err(err) => {
                warn!(subject, error = %err, "email send failed");
            }
        }
    }
}
