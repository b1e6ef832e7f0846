use std::time::Duration;

use anyhow::Context;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use reqwest::StatusCode;
use reqwest::Url;
use serde_json::Value;

use crate::domain::SubscriberEmail;

/// The one outbound call the subscribe form makes. `SubscriptionController`
/// is generic over this, so tests can swap the HTTP client for an in-memory
/// fake.
// only ever used as a generic bound (no `dyn`), so the lack of a `Send` bound
// on the returned future is fine
#[allow(async_fn_in_trait)]
pub trait SubscribeApi {
    async fn subscribe(
        &self,
        email: &SubscriberEmail,
    ) -> Result<(), SubscribeError>;
}

#[derive(thiserror::Error, Debug)]
pub enum SubscribeError {
    /// The server answered, but not with a truthy `success`. Covers rate
    /// limiting and duplicate addresses, which the server reports in
    /// `message`.
    #[error("Subscription was rejected by the server ({status})")]
    Rejected {
        status: StatusCode,
        message: Option<String>,
    },
    /// No usable answer: connection refused, DNS, timeout, truncated body...
    #[error("Failed to reach the subscription endpoint")]
    Transport(#[from] reqwest::Error),
}

impl SubscribeError {
    /// The human-readable text the server attached to its rejection, if any
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Rejected { message, .. } => message.as_deref(),
            Self::Transport(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct SubscriptionClient {
    http_client: Client,
    subscribe_url: Url,
}

impl SubscriptionClient {
    /// `endpoint` is resolved against `base_url` once, here, so that a bad
    /// configuration fails at startup rather than on the first submission.
    pub fn new(
        base_url: &str,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<Self, anyhow::Error> {
        let subscribe_url = Url::parse(base_url)
            .with_context(|| format!("Invalid subscription base url: {base_url:?}"))?
            .join(endpoint)
            .with_context(|| format!("Invalid subscription endpoint: {endpoint:?}"))?;

        // the timeout applies to the whole request, body included
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build http client")?;

        Ok(Self {
            http_client,
            subscribe_url,
        })
    }

    pub fn subscribe_url(&self) -> &Url { &self.subscribe_url }
}

impl SubscribeApi for SubscriptionClient {
    #[tracing::instrument(
        name = "POSTing subscription request",
        skip_all,
        fields(url = %self.subscribe_url, status = tracing::field::Empty)
    )]
    async fn subscribe(
        &self,
        email: &SubscriberEmail,
    ) -> Result<(), SubscribeError> {
        let request_body = SubscribeRequest {
            email: email.as_ref(),
        };

        // `send` only fails on transport problems; status codes are judged by
        // `interpret_reply`, since a 429 still carries a useful message
        let response = self
            .http_client
            .post(self.subscribe_url.clone())
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        tracing::Span::current().record("status", status.as_u16());

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await?;

        interpret_reply(status, content_type.as_deref(), &body)
    }
}

#[derive(serde::Serialize)]
struct SubscribeRequest<'a> {
    email: &'a str,
}

/// Decide whether a reply from the subscription endpoint means "subscribed".
///
/// Only a 2xx whose JSON body has a truthy `success` field counts. Anything
/// else is a `Rejected`, carrying whatever message the server offered:
/// a JSON `message` field, a bare JSON string, or a `text/plain` body.
pub fn interpret_reply(
    status: StatusCode,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<(), SubscribeError> {
    let json: Option<Value> = serde_json::from_slice(body).ok();

    let success = json
        .as_ref()
        .and_then(|v| v.get("success"))
        .is_some_and(is_truthy);
    if status.is_success() && success {
        return Ok(());
    }

    // a plain-text body is shown as-is, even if it happens to parse as JSON
    // (a proxy answering `429`, say)
    let message = if is_plain_text(content_type) {
        std::str::from_utf8(body).ok().and_then(non_empty)
    } else {
        match &json {
            Some(Value::Object(fields)) => match fields.get("message") {
                Some(Value::String(s)) => non_empty(s),
                _ => None,
            },
            Some(Value::String(s)) => non_empty(s),
            _ => None,
        }
    };

    Err(SubscribeError::Rejected { status, message })
}

/// JavaScript's notion of truthiness, which is what the endpoint's clients
/// have always applied to `success`
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Server messages are passed on verbatim; only blank ones are dropped
fn non_empty(s: &str) -> Option<String> { (!s.trim().is_empty()).then(|| s.to_string()) }

fn is_plain_text(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| {
        ct.split(';')
            .next()
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("text/plain"))
    })
}
