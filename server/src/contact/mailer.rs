//! Outbound mail for the contact form.
//!
//! [`SesMailer`] calls the SES v2 `SendEmail` API with AWS Signature V4.
//! [`LogMailer`] only logs, for deployments without mail credentials.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::MailConfig;

type HmacSha256 = Hmac<Sha256>;

const SES_PATH: &str = "/v2/email/outbound-emails";
const SES_SERVICE: &str = "ses";

/// One message to the operational inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMail {
    pub subject: String,
    pub body: String,
    pub reply_to: String,
}

impl OutboundMail {
    /// Build the message relayed for a contact form submission.
    pub fn from_contact(name: &str, email: &str, message: &str) -> Self {
        Self {
            subject: format!("New Message from {}", name),
            body: format!("Name: {}\nEmail: {}\nMessage: {}", name, email, message),
            reply_to: email.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail service rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("request signing failed: {0}")]
    Signing(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutboundMail) -> Result<(), MailError>;
}

/// Logs the message instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutboundMail) -> Result<(), MailError> {
        tracing::info!(
            subject = %mail.subject,
            reply_to = %mail.reply_to,
            "Mail delivery disabled, contact message logged only"
        );
        Ok(())
    }
}

/// Sends through Amazon SES.
pub struct SesMailer {
    http_client: Client,
    region: String,
    host: String,
    sender: String,
    recipient: String,
    access_key_id: String,
    secret_access_key: String,
}

impl SesMailer {
    /// Returns `None` unless both credentials are configured.
    pub fn from_config(config: &MailConfig) -> Option<Self> {
        let access_key_id = config.access_key_id.clone()?;
        let secret_access_key = config.secret_access_key.clone()?;
        Some(Self {
            http_client: Client::new(),
            host: format!("email.{}.amazonaws.com", config.region),
            region: config.region.clone(),
            sender: config.sender.clone(),
            recipient: config.recipient.clone(),
            access_key_id,
            secret_access_key,
        })
    }

    fn request_body(&self, mail: &OutboundMail) -> String {
        json!({
            "FromEmailAddress": self.sender,
            "Destination": { "ToAddresses": [self.recipient] },
            "ReplyToAddresses": [mail.reply_to],
            "Content": {
                "Simple": {
                    "Subject": { "Data": mail.subject },
                    "Body": { "Text": { "Data": mail.body } }
                }
            }
        })
        .to_string()
    }

    /// `Authorization` header value for a JSON POST to the SES endpoint.
    fn authorization(&self, body: &str, now: DateTime<Utc>) -> Result<String, MailError> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/{}/aws4_request", date, self.region, SES_SERVICE);
        let signed_headers = "content-type;host;x-amz-date";

        let canonical_request = format!(
            "POST\n{}\n\ncontent-type:application/json\nhost:{}\nx-amz-date:{}\n\n{}\n{}",
            SES_PATH,
            self.host,
            amz_date,
            signed_headers,
            sha256_hex(body.as_bytes()),
        );
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            scope,
            sha256_hex(canonical_request.as_bytes()),
        );

        let key = signing_key(&self.secret_access_key, &date, &self.region, SES_SERVICE)?;
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);

        Ok(format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.access_key_id, scope, signed_headers, signature
        ))
    }
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send(&self, mail: &OutboundMail) -> Result<(), MailError> {
        let body = self.request_body(mail);
        let now = Utc::now();
        let authorization = self.authorization(&body, now)?;

        let response = self
            .http_client
            .post(format!("https://{}{}", self.host, SES_PATH))
            .header("content-type", "application/json")
            .header("x-amz-date", now.format("%Y%m%dT%H%M%SZ").to_string())
            .header("authorization", authorization)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(reply_to = %mail.reply_to, "Contact message sent");
        Ok(())
    }
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, MailError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| MailError::Signing(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// SigV4 key derivation: date, region, service, then the `aws4_request` terminator.
fn signing_key(
    secret: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, MailError> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn mailer() -> SesMailer {
        SesMailer::from_config(&MailConfig {
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            secret_access_key: Some("secret".to_string()),
            ..MailConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_contact_mail_format() {
        let mail = OutboundMail::from_contact("Ada", "ada@example.com", "Hi there");
        assert_eq!(mail.subject, "New Message from Ada");
        assert_eq!(
            mail.body,
            "Name: Ada\nEmail: ada@example.com\nMessage: Hi there"
        );
        assert_eq!(mail.reply_to, "ada@example.com");
    }

    #[test]
    fn test_signing_key_matches_aws_reference() {
        let key = signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        )
        .unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn test_ses_requires_both_credentials() {
        let config = MailConfig {
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            ..MailConfig::default()
        };
        assert!(SesMailer::from_config(&config).is_none());
    }

    #[test]
    fn test_authorization_header_shape() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap();
        let header = mailer().authorization("{}", now).unwrap();
        assert!(header.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20250601/us-east-1/ses/aws4_request, \
             SignedHeaders=content-type;host;x-amz-date, Signature="
        ));
        let signature = header.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn test_request_body_addresses() {
        let mail = OutboundMail::from_contact("Ada", "ada@example.com", "Hi");
        let body: serde_json::Value = serde_json::from_str(&mailer().request_body(&mail)).unwrap();
        assert_eq!(body["FromEmailAddress"], "info@bullride.us");
        assert_eq!(body["Destination"]["ToAddresses"][0], "info@bullride.us");
        assert_eq!(body["ReplyToAddresses"][0], "ada@example.com");
        assert_eq!(
            body["Content"]["Simple"]["Subject"]["Data"],
            "New Message from Ada"
        );
    }
}
