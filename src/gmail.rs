//! Gmail mailbox gateway.
//!
//! Talks to the Gmail REST API (`users/me/...`) with an OAuth access token
//! taken from a Google "authorized user" token file, the JSON written by the
//! Google client libraries after the consent flow:
//!
//! ```json
//! {"token": "ya29...", "refresh_token": "1//...", "client_id": "...",
//!  "client_secret": "...", "token_uri": "https://oauth2.googleapis.com/token",
//!  "expiry": "2026-10-19T12:00:00.000000Z"}
//! ```
//!
//! No consent flow runs here. An expired token is refreshed once when the
//! file carries a refresh token and client credentials; otherwise
//! [`GmailMailbox::authenticate`] fails with [`Error::Authentication`].
//!
//! Messages are fetched with `format=raw`, which does not change their read
//! state, and decoded locally: the body is every `text/plain` part joined in
//! order, or the sole payload of a single-part message.

use async_trait::async_trait;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};
use lettre::message::header::ContentType;
use lettre::message::Mailbox as Address;
use mail_parser::{MessageParser, MessagePart, MimeHeaders, PartType};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::GmailConfig;
use crate::error::{describe_http_error, Error, Result};
use crate::models::{Email, OutgoingReply};
use crate::traits::Mailbox;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// URL-safe base64 that accepts both padded and unpadded input.
const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Deserialize)]
struct AuthorizedUser {
    #[serde(default, alias = "access_token")]
    token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
    #[serde(default)]
    expiry: Option<String>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct Profile {
    #[serde(rename = "emailAddress")]
    email_address: String,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Deserialize)]
struct RawMessage {
    id: String,
    #[serde(rename = "threadId")]
    thread_id: String,
    raw: String,
}

/// An authenticated Gmail session.
pub struct GmailMailbox {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    address: String,
    timeout: Duration,
}

impl GmailMailbox {
    /// Load the token file, refresh if needed, and resolve the account address.
    pub async fn authenticate(config: &GmailConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        let creds = read_token_file(&config.token_path)?;
        let access_token = match usable_token(&creds, Utc::now()) {
            Some(token) => token,
            None => refresh_access_token(&client, &creds, timeout).await?,
        };

        let mut mailbox = Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token,
            address: String::new(),
            timeout,
        };

        let profile: Profile = mailbox
            .get_json("users/me/profile", &[])
            .await
            .map_err(|e| match e {
                Error::Fetch(msg) => Error::Authentication(msg),
                other => other,
            })?;
        mailbox.address = profile.email_address;

        info!(address = %mailbox.address, "authenticated to Gmail");
        Ok(mailbox)
    }

    /// The authenticated account's address, used as the reply sender.
    pub fn address(&self) -> &str {
        &self.address
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Fetch(describe_http_error(&e, self.timeout)))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::Authentication(format!(
                "Gmail API rejected the token ({}): {}",
                status, body_text
            )));
        }
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::Fetch(format!(
                "Gmail API error {}: {}",
                status, body_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Fetch(format!("invalid Gmail response: {}", e)))
    }
}

#[async_trait]
impl Mailbox for GmailMailbox {
    async fn list_recent(&self, limit: usize) -> Result<Vec<Email>> {
        let list: ListResponse = self
            .get_json(
                "users/me/messages",
                &[
                    ("labelIds", "INBOX".to_string()),
                    ("maxResults", limit.to_string()),
                ],
            )
            .await?;

        let mut emails = Vec::with_capacity(list.messages.len().min(limit));
        for msg_ref in list.messages.iter().take(limit) {
            let msg: RawMessage = self
                .get_json(
                    &format!("users/me/messages/{}", msg_ref.id),
                    &[("format", "raw".to_string())],
                )
                .await?;

            let raw = BASE64_URL
                .decode(msg.raw.trim())
                .map_err(|e| Error::Fetch(format!("message {}: bad base64: {}", msg.id, e)))?;
            emails.push(parse_raw_email(&msg.id, &msg.thread_id, &raw)?);
        }

        debug!(count = emails.len(), "fetched inbox messages");
        Ok(emails)
    }

    async fn send_reply(&self, reply: &OutgoingReply) -> Result<()> {
        let raw = build_raw_reply(&self.address, reply)?;
        let body = serde_json::json!({
            "raw": BASE64_URL.encode(raw),
            "threadId": reply.thread_id,
        });

        let response = self
            .client
            .post(format!("{}/users/me/messages/send", self.base_url))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Send(describe_http_error(&e, self.timeout)))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::Authentication(format!(
                "Gmail API rejected the token ({}): {}",
                status, body_text
            )));
        }
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::Send(format!("Gmail API error {}: {}", status, body_text)));
        }

        info!(to = %reply.to, thread_id = %reply.thread_id, "reply sent");
        Ok(())
    }
}

fn read_token_file(path: &Path) -> Result<AuthorizedUser> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Authentication(format!("cannot read token file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Authentication(format!("invalid token file {}: {}", path.display(), e))
    })
}

/// The stored access token, if present and not (nearly) expired.
fn usable_token(creds: &AuthorizedUser, now: DateTime<Utc>) -> Option<String> {
    let token = creds.token.clone().filter(|t| !t.is_empty())?;
    match creds.expiry.as_deref().map(parse_expiry) {
        None => Some(token),
        Some(Some(expiry)) if expiry.timestamp() - EXPIRY_SKEW_SECS > now.timestamp() => {
            Some(token)
        }
        Some(_) => None,
    }
}

fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

async fn refresh_access_token(
    client: &reqwest::Client,
    creds: &AuthorizedUser,
    timeout: Duration,
) -> Result<String> {
    let (Some(refresh_token), Some(client_id), Some(client_secret)) = (
        creds.refresh_token.as_deref(),
        creds.client_id.as_deref(),
        creds.client_secret.as_deref(),
    ) else {
        return Err(Error::Authentication(
            "access token expired and no refresh credentials are available; \
             re-run the consent flow to obtain a new token file"
                .to_string(),
        ));
    };

    let token_uri = creds.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
    warn!("access token expired, refreshing");

    let response = client
        .post(token_uri)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ])
        .send()
        .await
        .map_err(|e| Error::Authentication(describe_http_error(&e, timeout)))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        return Err(Error::Authentication(format!(
            "token refresh failed ({}): {}",
            status, body_text
        )));
    }

    let refreshed: RefreshResponse = response
        .json()
        .await
        .map_err(|e| Error::Authentication(format!("invalid token response: {}", e)))?;
    Ok(refreshed.access_token)
}

/// Decode a raw RFC 5322 message into an [`Email`].
pub fn parse_raw_email(id: &str, thread_id: &str, raw: &[u8]) -> Result<Email> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| Error::Fetch(format!("message {}: unparseable MIME", id)))?;

    let sender = message
        .from()
        .and_then(|a| a.first())
        .map(|addr| match (addr.name(), addr.address()) {
            (Some(name), Some(address)) => format!("{} <{}>", name, address),
            (None, Some(address)) => address.to_string(),
            (Some(name), None) => name.to_string(),
            (None, None) => String::new(),
        })
        .unwrap_or_default();

    let body = match message.parts.first() {
        Some(root) if matches!(root.body, PartType::Multipart(_)) => message
            .parts
            .iter()
            .filter(|part| is_text_plain(part))
            .filter_map(|part| part.text_contents())
            .collect::<String>(),
        Some(root) => root.text_contents().unwrap_or_default().to_string(),
        None => String::new(),
    };

    Ok(Email {
        id: id.to_string(),
        thread_id: thread_id.to_string(),
        subject: message.subject().unwrap_or_default().to_string(),
        sender,
        body: body.trim().to_string(),
        message_id: message.message_id().map(|m| format!("<{}>", m)),
    })
}

fn is_text_plain(part: &MessagePart) -> bool {
    if !matches!(part.body, PartType::Text(_)) {
        return false;
    }
    // A part without Content-Type defaults to text/plain
    part.content_type().map_or(true, |ct| {
        ct.ctype().eq_ignore_ascii_case("text")
            && ct
                .subtype()
                .map_or(true, |sub| sub.eq_ignore_ascii_case("plain"))
    })
}

/// Render `reply` as an RFC 5322 message from `from`.
pub fn build_raw_reply(from: &str, reply: &OutgoingReply) -> Result<Vec<u8>> {
    let from: Address = from
        .parse()
        .map_err(|e| Error::Send(format!("invalid sender address '{}': {}", from, e)))?;
    let to = parse_recipient(&reply.to)?;

    let mut builder = lettre::Message::builder()
        .from(from)
        .to(to)
        .subject(reply.subject.clone())
        .header(ContentType::TEXT_PLAIN);

    if let Some(parent) = reply.in_reply_to.as_deref() {
        builder = builder
            .in_reply_to(parent.to_string())
            .references(parent.to_string());
    }

    let message = builder
        .body(reply.body.clone())
        .map_err(|e| Error::Send(format!("cannot build reply: {}", e)))?;

    Ok(message.formatted())
}

/// Parse a `From`-style string, falling back to the bare `<address>`.
fn parse_recipient(to: &str) -> Result<Address> {
    if let Ok(mailbox) = to.parse::<Address>() {
        return Ok(mailbox);
    }
    let bare = to
        .rfind('<')
        .zip(to.rfind('>'))
        .filter(|(open, close)| open < close)
        .map(|(open, close)| &to[open + 1..close]);
    bare.and_then(|addr| addr.parse::<Address>().ok())
        .ok_or_else(|| Error::Send(format!("invalid recipient address '{}'", to)))
}
