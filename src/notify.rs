//! Outbound delivery of push messages and e-mails.
//!
//! Delivery providers sit behind the `Notifier` trait. `HttpNotifier`
//! posts JSON to a push gateway and a mail relay; a channel without a
//! configured URL only logs what it would have sent.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::models::PushSubscription;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Cannot reach {channel} endpoint at {url}")]
    Connection { channel: &'static str, url: String },

    #[error("{channel} endpoint returned {status}")]
    Rejected { channel: &'static str, status: u16 },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
}

/// Payload shown by the browser when a push arrives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
}

pub trait Notifier: Send + Sync {
    fn send_push(&self, subscription: &PushSubscription, message: &PushMessage)
        -> Result<(), NotifyError>;

    fn send_mail(&self, message: &MailMessage) -> Result<(), NotifyError>;
}

pub struct HttpNotifier {
    push_gateway_url: Option<String>,
    mail_relay_url: Option<String>,
    sender: String,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct PushEnvelope<'a> {
    subscription: SubscriptionInfo<'a>,
    payload: &'a PushMessage,
}

#[derive(Serialize)]
struct SubscriptionInfo<'a> {
    endpoint: &'a str,
    keys: SubscriptionKeys<'a>,
}

#[derive(Serialize)]
struct SubscriptionKeys<'a> {
    p256dh: &'a str,
    auth: &'a str,
}

#[derive(Serialize)]
struct MailEnvelope<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    text: &'a str,
}

impl HttpNotifier {
    pub fn new(
        push_gateway_url: Option<String>,
        mail_relay_url: Option<String>,
        sender: &str,
        timeout_secs: u64,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| NotifyError::HttpClient(e.to_string()))?;
        Ok(Self {
            push_gateway_url: push_gateway_url.filter(|u| !u.trim().is_empty()),
            mail_relay_url: mail_relay_url.filter(|u| !u.trim().is_empty()),
            sender: sender.to_string(),
            client,
        })
    }

    fn post<T: Serialize>(&self, channel: &'static str, url: &str, body: &T) -> Result<(), NotifyError> {
        let response = self.client.post(url).json(body).send().map_err(|e| {
            if e.is_connect() {
                NotifyError::Connection {
                    channel,
                    url: url.to_string(),
                }
            } else {
                NotifyError::HttpClient(e.to_string())
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                channel,
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

impl Notifier for HttpNotifier {
    fn send_push(
        &self,
        subscription: &PushSubscription,
        message: &PushMessage,
    ) -> Result<(), NotifyError> {
        let Some(url) = &self.push_gateway_url else {
            tracing::info!(
                endpoint = %endpoint_tail(&subscription.endpoint),
                title = %message.title,
                "Push gateway not configured, message logged only"
            );
            return Ok(());
        };
        let envelope = PushEnvelope {
            subscription: SubscriptionInfo {
                endpoint: &subscription.endpoint,
                keys: SubscriptionKeys {
                    p256dh: &subscription.p256dh,
                    auth: &subscription.auth,
                },
            },
            payload: message,
        };
        self.post("push", url, &envelope)
    }

    fn send_mail(&self, message: &MailMessage) -> Result<(), NotifyError> {
        if let Some(bad) = message.to.iter().find(|addr| !is_plausible_email(addr)) {
            return Err(NotifyError::InvalidRecipient(bad.clone()));
        }
        let Some(url) = &self.mail_relay_url else {
            tracing::info!(
                recipients = message.to.len(),
                subject = %message.subject,
                "Mail relay not configured, message logged only"
            );
            return Ok(());
        };
        let envelope = MailEnvelope {
            from: &self.sender,
            to: &message.to,
            subject: &message.subject,
            text: &message.text,
        };
        self.post("mail", url, &envelope)
    }
}

/// Last characters of a push endpoint, safe to show and log.
pub fn endpoint_tail(endpoint: &str) -> String {
    let chars: Vec<char> = endpoint.chars().collect();
    let start = chars.len().saturating_sub(16);
    format!("…{}", chars[start..].iter().collect::<String>())
}

pub fn is_plausible_email(addr: &str) -> bool {
    let addr = addr.trim();
    match addr.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !addr.contains(' ')
        }
        None => false,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Notifier that records everything it is asked to deliver.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub pushes: Mutex<Vec<(String, PushMessage)>>,
        pub mails: Mutex<Vec<MailMessage>>,
    }

    impl Notifier for RecordingNotifier {
        fn send_push(
            &self,
            subscription: &PushSubscription,
            message: &PushMessage,
        ) -> Result<(), NotifyError> {
            self.pushes
                .lock()
                .unwrap()
                .push((subscription.endpoint.clone(), message.clone()));
            Ok(())
        }

        fn send_mail(&self, message: &MailMessage) -> Result<(), NotifyError> {
            self.mails.lock().unwrap().push(message.clone());
            Ok(())
        }
    }
}
