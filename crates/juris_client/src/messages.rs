//! Wire types for the `/ask/` endpoint: the JSON request body and the
//! newline-delimited events streamed back.

use serde::{Deserialize, Deserializer, Serialize};

/// Client → server: body of `POST {api_url}/ask/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskRequest<'a> {
    pub query: &'a str,
    pub k: u32,
    pub temperature: f64,
}

impl<'a> AskRequest<'a> {
    pub fn new(query: &'a str, k: u32, temperature: f64) -> Self {
        Self {
            query,
            k,
            temperature,
        }
    }
}

/// Source document metadata attached to a retrieval context.
///
/// Decoding is lenient: `null` strings become empty and a page that is not an
/// integer becomes unknown, so odd metadata never fails a finished answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(default, deserialize_with = "page_number")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "page_number")]
    pub total_pages: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
}

/// One supporting source returned with the end-of-stream event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalContext {
    #[serde(default, deserialize_with = "null_as_default")]
    pub document: Document,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Integer page, whole float (`3.0`) or numeric string (`"3"`); anything else is unknown.
fn page_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// One decoded line of the answer stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Token(String),
    End(Vec<RetrievalContext>),
}

/// A line that does not decode into a [`StreamEvent`]. Fatal for the stream it came from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed event: {0}")]
pub struct MalformedEvent(pub String);

/// Server → client line; discriminator is the JSON "stage" field.
#[derive(Debug, Deserialize)]
#[serde(tag = "stage")]
enum WireEvent {
    #[serde(rename = "tok")]
    Tok { data: String },
    #[serde(rename = "end")]
    End {
        #[serde(default)]
        contexts: Option<Vec<RetrievalContext>>,
    },
}

/// Decode one line of the response body. Pure: the same input always yields the same result.
pub fn parse_line(line: &[u8]) -> Result<StreamEvent, MalformedEvent> {
    let wire: WireEvent =
        serde_json::from_slice(line).map_err(|e| MalformedEvent(e.to_string()))?;
    Ok(match wire {
        WireEvent::Tok { data } => StreamEvent::Token(data),
        WireEvent::End { contexts } => StreamEvent::End(contexts.unwrap_or_default()),
    })
}
