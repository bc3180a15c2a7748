use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::PplxError;
use crate::model::{ChatRequest, ChatResponse, Completion, ErrorEnvelope};
use crate::providers::http_errors::api_request_error;
use crate::rate_limiter::RateLimiter;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Sends one chat request and classifies the outcome. Never retries.
pub async fn send(
    client: &Client,
    cfg: &Config,
    limiter: &RateLimiter,
    request: &ChatRequest,
) -> Result<Completion, PplxError> {
    let api_url = cfg.api_url.as_str();
    let body = serde_json::to_vec(request)?;

    debug!(period_ms = limiter.period().as_millis() as u64, "waiting for rate limiter grant");
    limiter.acquire().await;

    debug!(
        api_url = %api_url,
        model = %request.model(),
        message_count = request.messages().len(),
        body_len = body.len(),
        "sending perplexity chat request"
    );

    let response = client
        .post(api_url)
        .header(AUTHORIZATION, format!("Bearer {}", cfg.api_key))
        .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
        .header(ACCEPT, JSON_CONTENT_TYPE)
        .body(body)
        .send()
        .await
        .map_err(|err| {
            warn!(
                api_url = %api_url,
                model = %request.model(),
                error = %err,
                "perplexity request failed"
            );
            api_request_error(err, api_url, cfg.timeout_secs)
        })?;

    let status = response.status();
    let response_body = response.text().await.map_err(|err| {
        warn!(api_url = %api_url, status = %status, error = %err, "failed to read response body");
        PplxError::Transport(format!("Error reading response: {err}"))
    })?;

    let completion = decode_response(status, &response_body)?;
    debug!(
        status = %status,
        response_len = response_body.len(),
        empty = matches!(completion, Completion::Empty),
        "received perplexity chat response"
    );
    Ok(completion)
}

/// Structured error bodies win over the HTTP status; the status only matters when the
/// body carries no error of its own.
pub(crate) fn decode_response(
    status: reqwest::StatusCode,
    body: &str,
) -> Result<Completion, PplxError> {
    if let Some(error) = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
    {
        warn!(status = %status, api_message = %error.message, "perplexity returned an error payload");
        return Err(PplxError::Upstream(error.message));
    }

    if !status.is_success() {
        warn!(
            status = %status,
            response_body_len = body.len(),
            "perplexity returned non-success status"
        );
        return Err(PplxError::Status {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }

    let parsed = serde_json::from_str::<ChatResponse>(body).map_err(|err| {
        warn!(error = %err, response_body_len = body.len(), "failed to parse chat response");
        PplxError::Decode {
            reason: err.to_string(),
            body: body.to_string(),
        }
    })?;
    debug!(id = %parsed.id, choices = parsed.choices.len(), "decoded chat response");
    parsed.into_completion()
}
