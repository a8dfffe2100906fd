//! Fetched email messages and the two views the engine needs of them:
//! a header map and the decoded HTML body.

use crate::error::MessageError;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

const TEXT_HTML: &str = "text/html";

/// Header name to value, last occurrence wins
pub type HeaderMap = HashMap<String, String>;

/// An email as supplied by the mail-fetching service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    /// Provider message id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Root of the MIME part tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<MessagePart>,
}

/// One node of a MIME part tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<Header>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<PartBody>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<MessagePart>,
}

/// A single header line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Part content in transport encoding
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartBody {
    /// Base64-encoded content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl Message {
    /// Flatten the top-level headers into a map
    #[must_use]
    pub fn headers(&self) -> HeaderMap {
        self.payload
            .iter()
            .flat_map(|p| &p.headers)
            .map(|h| (h.name.clone(), h.value.clone()))
            .collect()
    }

    /// Decoded text of the first `text/html` part, searched depth-first.
    ///
    /// Returns an empty string when the message has no HTML part.
    #[must_use]
    pub fn html_body(&self) -> String {
        self.payload
            .as_ref()
            .and_then(MessagePart::find_html)
            .unwrap_or_default()
    }

    /// Build a message from raw RFC 5322 bytes.
    ///
    /// Part bodies are decoded from their content transfer encoding and
    /// re-encoded as base64, so the result looks like a fetched message.
    pub fn from_rfc822(id: impl Into<String>, raw: &[u8]) -> Result<Self, MessageError> {
        let parsed =
            mailparse::parse_mail(raw).map_err(|e| MessageError::Structure(e.to_string()))?;
        Ok(Self {
            id: Some(id.into()),
            payload: Some(MessagePart::from_parsed(&parsed)),
        })
    }
}

impl MessagePart {
    fn find_html(&self) -> Option<String> {
        if self.mime_type.as_deref() == Some(TEXT_HTML)
            && let Some(data) = self.body.as_ref().and_then(|b| b.data.as_deref())
            && !data.is_empty()
        {
            match decode_body(data) {
                Some(html) => return Some(html),
                None => debug!("Skipping undecodable text/html part"),
            }
        }

        self.parts.iter().find_map(Self::find_html)
    }

    fn from_parsed(parsed: &mailparse::ParsedMail) -> Self {
        let headers = parsed
            .headers
            .iter()
            .map(|h| Header {
                name: h.get_key(),
                value: h.get_value(),
            })
            .collect();

        let body = if parsed.subparts.is_empty() {
            parsed.get_body_raw().ok().map(|bytes| PartBody {
                data: Some(STANDARD.encode(bytes)),
            })
        } else {
            None
        };

        Self {
            mime_type: Some(parsed.ctype.mimetype.to_lowercase()),
            headers,
            body,
            parts: parsed.subparts.iter().map(Self::from_parsed).collect(),
        }
    }
}

/// Decode base64 body data, accepting the standard and URL-safe alphabets
fn decode_body(data: &str) -> Option<String> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let unpadded = compact.trim_end_matches('=');
    let bytes = STANDARD
        .decode(&compact)
        .or_else(|_| STANDARD_NO_PAD.decode(unpadded))
        .or_else(|_| URL_SAFE_NO_PAD.decode(unpadded))
        .ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}
