//! SendGrid implementation of the notification collaborator.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error};

use super::template;
use super::{DeliveryReceipt, NotificationRequest, Notifier, NotifyError};

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";
const DEFAULT_FROM_EMAIL: &str = "noreply@chainalert.app";
const DEFAULT_FROM_NAME: &str = "ChainAlert";

/// Sends rendered notifications through the SendGrid v3 mail API.
pub struct SendGridNotifier {
    api_key: String,
    from_email: String,
    from_name: String,
    client: reqwest::Client,
}

impl SendGridNotifier {
    pub fn new(
        api_key: impl Into<String>,
        from_email: impl Into<String>,
        from_name: impl Into<String>,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NotifyError::RequestFailed(e.to_string()))?;
        Ok(Self {
            api_key: api_key.into(),
            from_email: from_email.into(),
            from_name: from_name.into(),
            client,
        })
    }

    /// Build from `SENDGRID_API_KEY` / `SENDGRID_FROM_EMAIL` /
    /// `SENDGRID_FROM_NAME`. A missing API key disables the whole
    /// escalation path, reported distinctly as [`NotifyError::NotConfigured`].
    pub fn from_env() -> Result<Self, NotifyError> {
        let api_key = std::env::var("SENDGRID_API_KEY")
            .map_err(|_| NotifyError::NotConfigured("SENDGRID_API_KEY is not set".into()))?;
        let from_email = std::env::var("SENDGRID_FROM_EMAIL")
            .unwrap_or_else(|_| DEFAULT_FROM_EMAIL.to_string());
        let from_name =
            std::env::var("SENDGRID_FROM_NAME").unwrap_or_else(|_| DEFAULT_FROM_NAME.to_string());
        Self::new(api_key, from_email, from_name)
    }
}

#[async_trait]
impl Notifier for SendGridNotifier {
    async fn send(&self, request: &NotificationRequest) -> Result<DeliveryReceipt, NotifyError> {
        let message = template::render(request);

        let body = serde_json::json!({
            "personalizations": [{
                "to": [{ "email": request.to_email, "name": request.to_name }],
                "subject": message.subject,
            }],
            "from": {
                "email": self.from_email,
                "name": self.from_name,
            },
            "content": [{
                "type": "text/html",
                "value": message.html,
            }],
        });

        let response = self
            .client
            .post(SENDGRID_SEND_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, to = %request.to_email, phase = %request.phase, "sendgrid rejected send");
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        debug!(to = %request.to_email, phase = %request.phase, "notification delivered");
        Ok(DeliveryReceipt { message_id })
    }
}
