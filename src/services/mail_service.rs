//! Transactional mail over a Mailtrap-style HTTP send API.
//!
//! Mail is optional: unless both `MAIL_API_URL` and `MAIL_API_TOKEN` are
//! configured, sends are skipped with a log line. Delivery failures are
//! logged and never surfaced to the caller; registration must not fail
//! because a mail provider is down.

use std::time::Duration;

use serde_json::json;
use url::Url;

use crate::config::Config;

/// Per-message timeout, so a slow provider cannot hang a request.
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct Mailer {
    endpoint: Option<String>,
    token: Option<String>,
    sender: String,
    base_url: String,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Self {
        let endpoint = config.mail_api_url.as_deref().and_then(|raw| {
            match Url::parse(raw) {
                Ok(url) => Some(url.to_string()),
                Err(err) => {
                    tracing::warn!(error = %err, "invalid MAIL_API_URL, mail disabled");
                    None
                }
            }
        });
        let base_url = config
            .public_base_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", config.server_port));
        Self {
            endpoint,
            token: config.mail_api_token.clone(),
            sender: config.mail_sender.clone(),
            base_url,
        }
    }

    pub fn enabled(&self) -> bool {
        self.endpoint.is_some() && self.token.is_some()
    }

    /// Dispatch the account verification email.
    pub async fn send_verification(&self, username: &str, recipient: &str, token: &str) {
        let (Some(endpoint), Some(api_token)) = (self.endpoint.as_deref(), self.token.as_deref())
        else {
            tracing::info!("mail disabled via configuration, skipping verification email");
            return;
        };
        let Some(verify_url) = self.verify_url(token) else {
            tracing::warn!("invalid PUBLIC_BASE_URL, skipping verification email");
            return;
        };

        let payload = json!({
            "from": { "email": self.sender },
            "to": [{ "email": recipient }],
            "subject": "Verify your Race Analytics account",
            "text": format!(
                "Hello {username},\n\nConfirm your email by visiting {verify_url}\n\n\
                 If you did not register, ignore this message."
            ),
        });

        let client = match reqwest::Client::builder().timeout(SEND_TIMEOUT).build() {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!(error = %err, "could not build mail HTTP client");
                return;
            }
        };

        match client
            .post(endpoint)
            .bearer_auth(api_token)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                tracing::info!(recipient, "verification email dispatched");
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "mail provider rejected message");
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to reach mail provider");
            }
        }
    }

    fn verify_url(&self, token: &str) -> Option<Url> {
        let mut url = Url::parse(&self.base_url).ok()?;
        url.set_path("/api/v1/auth/verify");
        url.set_query(Some(&format!("token={token}")));
        Some(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailer(base_url: &str) -> Mailer {
        Mailer {
            endpoint: Some("https://send.api.mailtrap.io/api/send".to_string()),
            token: Some("secret".to_string()),
            sender: "no-reply@race-analytics.local".to_string(),
            base_url: base_url.to_string(),
        }
    }

    #[test]
    fn verification_link_targets_the_verify_endpoint() {
        let url = mailer("https://stats.example.com").verify_url("abc123").unwrap();
        assert_eq!(
            url.as_str(),
            "https://stats.example.com/api/v1/auth/verify?token=abc123"
        );
    }

    #[test]
    fn unparseable_base_urls_produce_no_link() {
        assert!(mailer("not a url").verify_url("abc123").is_none());
    }

    #[test]
    fn mailer_is_disabled_without_credentials() {
        let mut m = mailer("https://stats.example.com");
        assert!(m.enabled());
        m.token = None;
        assert!(!m.enabled());
    }
}
