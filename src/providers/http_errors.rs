use std::error::Error as StdError;
use std::io::ErrorKind;

use crate::error::PplxError;

fn error_chain_has_kind(
    err: &(dyn StdError + 'static),
    kind: ErrorKind,
    needle: &str,
) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == kind
        {
            return true;
        }

        if source.to_string().to_ascii_lowercase().contains(needle) {
            return true;
        }

        current = source.source();
    }

    false
}

fn error_chain_has_connection_refused(err: &(dyn StdError + 'static)) -> bool {
    error_chain_has_kind(err, ErrorKind::ConnectionRefused, "connection refused")
}

fn error_chain_has_timeout(err: &(dyn StdError + 'static)) -> bool {
    error_chain_has_kind(err, ErrorKind::TimedOut, "timed out")
}

pub(crate) fn api_request_error(
    err: reqwest::Error,
    api_url: &str,
    timeout_secs: Option<u64>,
) -> PplxError {
    if err.is_timeout() || error_chain_has_timeout(&err) {
        let limit = timeout_secs
            .map(|secs| format!(" after {secs}s"))
            .unwrap_or_default();
        return PplxError::Transport(format!(
            "Request to '{api_url}' timed out{limit}. \
             Set or increase PPLX_TIMEOUT_SECS, or retry later."
        ));
    }

    if err.is_connect() {
        if error_chain_has_connection_refused(&err) {
            return PplxError::Transport(format!(
                "Connection refused by API at '{api_url}'. Check PPLX_API_URL."
            ));
        }

        return PplxError::Transport(format!(
            "Failed to connect to API at '{api_url}'. \
             Check PPLX_API_URL and network connectivity."
        ));
    }

    PplxError::Transport(format!("Error sending request to '{api_url}': {err}"))
}
