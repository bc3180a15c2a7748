use std::env;
use std::fmt;

use crate::error::PplxError;
use crate::model::{SamplingParams, SearchRecency};

pub const DEFAULT_API_URL: &str = "https://api.perplexity.ai/chat/completions";
const MAX_TOP_K: u32 = 2048;

#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub api_url: String,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub timeout_secs: Option<u64>,
    pub sampling: SamplingParams,
}

// Keeps the credential out of logs and panic output.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("system_prompt", &self.system_prompt)
            .field("timeout_secs", &self.timeout_secs)
            .field("sampling", &self.sampling)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, PplxError> {
        Self::from_env_with(|key| env::var(key).ok())
    }

    pub(crate) fn from_env_with(
        mut get_var: impl FnMut(&str) -> Option<String>,
    ) -> Result<Self, PplxError> {
        let api_key = non_blank(get_var("PPLX_API_KEY")).ok_or(PplxError::MissingApiKey)?;
        let api_url = non_blank(get_var("PPLX_API_URL"))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let sampling = SamplingParams {
            temperature: parse_temperature(get_var("PPLX_TEMPERATURE").as_deref()),
            top_p: parse_top_p(get_var("PPLX_TOP_P").as_deref()),
            top_k: parse_top_k(get_var("PPLX_TOP_K").as_deref()),
            max_tokens: parse_positive_u64(get_var("PPLX_MAX_TOKENS").as_deref())
                .and_then(|value| u32::try_from(value).ok()),
            presence_penalty: parse_presence_penalty(
                get_var("PPLX_PRESENCE_PENALTY").as_deref(),
            ),
            frequency_penalty: parse_frequency_penalty(
                get_var("PPLX_FREQUENCY_PENALTY").as_deref(),
            ),
            search_domain_filter: parse_domain_list(
                get_var("PPLX_SEARCH_DOMAIN_FILTER").as_deref(),
            ),
            search_recency: parse_search_recency(get_var("PPLX_SEARCH_RECENCY").as_deref()),
            return_images: parse_bool(get_var("PPLX_RETURN_IMAGES").as_deref()),
            return_related_questions: parse_bool(
                get_var("PPLX_RETURN_RELATED_QUESTIONS").as_deref(),
            ),
        };

        Ok(Self {
            api_key,
            api_url,
            model: non_blank(get_var("PPLX_MODEL")),
            system_prompt: non_blank(get_var("SYSTEM_PROMPT")),
            timeout_secs: parse_positive_u64(get_var("PPLX_TIMEOUT_SECS").as_deref()),
            sampling,
        })
    }
}

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_positive_u64(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}

fn parse_f64_in(raw: Option<&str>, accept: impl Fn(f64) -> bool) -> Option<f64> {
    raw.and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite() && accept(*value))
}

fn parse_temperature(raw: Option<&str>) -> Option<f64> {
    parse_f64_in(raw, |value| (0.0..2.0).contains(&value))
}

fn parse_top_p(raw: Option<&str>) -> Option<f64> {
    parse_f64_in(raw, |value| value > 0.0 && value <= 1.0)
}

fn parse_top_k(raw: Option<&str>) -> Option<u32> {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|value| *value <= MAX_TOP_K)
}

fn parse_presence_penalty(raw: Option<&str>) -> Option<f64> {
    parse_f64_in(raw, |value| (-2.0..=2.0).contains(&value))
}

fn parse_frequency_penalty(raw: Option<&str>) -> Option<f64> {
    parse_f64_in(raw, |value| value > 0.0)
}

fn parse_bool(raw: Option<&str>) -> Option<bool> {
    match raw?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Comma-separated domains; a leading `-` excludes a domain.
fn parse_domain_list(raw: Option<&str>) -> Option<Vec<String>> {
    let domains: Vec<String> = raw?
        .split(',')
        .map(str::trim)
        .filter(|domain| !domain.is_empty() && *domain != "-")
        .map(str::to_string)
        .collect();
    (!domains.is_empty()).then_some(domains)
}

fn parse_search_recency(raw: Option<&str>) -> Option<SearchRecency> {
    match raw?.trim().to_ascii_lowercase().as_str() {
        "hour" => Some(SearchRecency::Hour),
        "day" => Some(SearchRecency::Day),
        "week" => Some(SearchRecency::Week),
        "month" => Some(SearchRecency::Month),
        _ => None,
    }
}
