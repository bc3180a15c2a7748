use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::PplxError;
use crate::sanitize::sanitize_input;

pub const NO_RESPONSE: &str = "No response received";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Models offered on the startup menu, in menu order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedModel {
    SonarSmall,
    SonarLarge,
    SonarHuge,
}

impl SupportedModel {
    pub const ALL: [SupportedModel; 3] = [Self::SonarSmall, Self::SonarLarge, Self::SonarHuge];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SonarSmall => "llama-3.1-sonar-small-128k-online",
            Self::SonarLarge => "llama-3.1-sonar-large-128k-online",
            Self::SonarHuge => "llama-3.1-sonar-huge-128k-online",
        }
    }

    /// Resolves a menu number (`"1"`..`"3"`) or a canonical model name.
    pub fn from_menu_choice(raw: &str) -> Result<Self, PplxError> {
        let choice = raw.trim();
        let by_number = match choice {
            "1" => Some(Self::SonarSmall),
            "2" => Some(Self::SonarLarge),
            "3" => Some(Self::SonarHuge),
            _ => None,
        };

        by_number
            .or_else(|| {
                Self::ALL
                    .into_iter()
                    .find(|model| model.as_str().eq_ignore_ascii_case(choice))
            })
            .ok_or_else(|| PplxError::InvalidModel(choice.to_string()))
    }
}

impl fmt::Display for SupportedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchRecency {
    Hour,
    Day,
    Week,
    Month,
}

impl SearchRecency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

impl Serialize for SearchRecency {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Optional generation and search knobs. Unset fields are left out of the request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SamplingParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_domain_filter: Option<Vec<String>>,
    #[serde(
        rename = "search_recency_filter",
        skip_serializing_if = "Option::is_none"
    )]
    pub search_recency: Option<SearchRecency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_images: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_related_questions: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(flatten)]
    params: SamplingParams,
}

impl ChatRequest {
    pub fn new(model: SupportedModel, messages: Vec<Message>) -> Result<Self, PplxError> {
        if messages.is_empty() {
            return Err(PplxError::InvalidRequest(
                "at least one message is required".to_string(),
            ));
        }

        Ok(Self {
            model: model.as_str().to_string(),
            messages,
            params: SamplingParams::default(),
        })
    }

    pub fn with_params(mut self, params: SamplingParams) -> Self {
        self.params = params;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

/// Builds the single-turn request sent per run. Only the user prompt is sanitized;
/// the system prompt is operator configuration.
pub fn build_request(
    model: SupportedModel,
    system_prompt: Option<&str>,
    prompt: &str,
    params: SamplingParams,
) -> Result<ChatRequest, PplxError> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system_prompt) = system_prompt.filter(|value| !value.trim().is_empty()) {
        messages.push(Message::system(system_prompt));
    }
    messages.push(Message::user(sanitize_input(prompt)));

    Ok(ChatRequest::new(model, messages)?.with_params(params))
}

// Missing and `null` fields decode to their defaults, like a zero value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Choice {
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: ReplyMessage,
}

/// Assistant turn as returned by the API. The role is kept verbatim.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplyMessage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiError {
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
}

/// Only the `error` member, so a populated error is seen even when the rest of the
/// body has an unexpected shape.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Reply(String),
    Empty,
}

impl ChatResponse {
    /// A populated `error` takes precedence over any choices.
    pub fn into_completion(self) -> Result<Completion, PplxError> {
        if let Some(error) = self.error {
            return Err(PplxError::Upstream(error.message));
        }

        Ok(self
            .choices
            .into_iter()
            .next()
            .map(|choice| Completion::Reply(choice.message.content))
            .unwrap_or(Completion::Empty))
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reply(content) => write!(f, "Response: {content}"),
            Self::Empty => f.write_str(NO_RESPONSE),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{
        ChatRequest, ChatResponse, Completion, ErrorEnvelope, Message, MessageRole,
        SamplingParams, SearchRecency, SupportedModel, build_request,
    };
    use crate::error::PplxError;

    fn decode(body: Value) -> ChatResponse {
        serde_json::from_value(body).expect("response should decode")
    }

    #[test]
    fn single_user_message_request_has_one_user_entry() {
        let request = ChatRequest::new(
            SupportedModel::SonarLarge,
            vec![Message::user("What are the three laws of robotics")],
        )
        .expect("request should build");

        let body = serde_json::to_value(&request).expect("request should serialize");
        assert_eq!(body["model"], "llama-3.1-sonar-large-128k-online");
        let messages = body["messages"].as_array().expect("messages array");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(
            messages[0]["content"],
            "What are the three laws of robotics"
        );
    }

    #[test]
    fn request_without_messages_is_rejected() {
        let err = ChatRequest::new(SupportedModel::SonarSmall, Vec::new())
            .expect_err("empty request should fail");
        assert!(matches!(err, PplxError::InvalidRequest(_)));
    }

    #[test]
    fn unset_sampling_params_are_omitted_from_body() {
        let request = build_request(SupportedModel::SonarSmall, None, "hi", Default::default())
            .expect("request should build");
        let body = serde_json::to_value(&request).expect("request should serialize");
        let keys: Vec<&str> = body
            .as_object()
            .expect("object body")
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys.len(), 2, "unexpected keys: {keys:?}");
        assert!(body.get("model").is_some());
        assert!(body.get("messages").is_some());
    }

    #[test]
    fn sampling_params_are_flattened_into_body() {
        let params = SamplingParams {
            temperature: Some(0.2),
            top_p: Some(0.9),
            top_k: Some(0),
            max_tokens: Some(256),
            presence_penalty: Some(0.0),
            frequency_penalty: Some(1.0),
            search_domain_filter: Some(vec!["perplexity.ai".to_string()]),
            search_recency: Some(SearchRecency::Month),
            return_images: Some(false),
            return_related_questions: Some(true),
        };
        let request = build_request(SupportedModel::SonarHuge, None, "hi", params)
            .expect("request should build");
        let body = serde_json::to_value(&request).expect("request should serialize");

        assert_eq!(body["temperature"], json!(0.2));
        assert_eq!(body["top_p"], json!(0.9));
        assert_eq!(body["max_tokens"], json!(256));
        assert_eq!(body["top_k"], json!(0));
        assert_eq!(body["presence_penalty"], json!(0.0));
        assert_eq!(body["frequency_penalty"], json!(1.0));
        assert_eq!(body["search_domain_filter"], json!(["perplexity.ai"]));
        assert_eq!(body["search_recency_filter"], "month");
        assert_eq!(body["return_images"], json!(false));
        assert_eq!(body["return_related_questions"], json!(true));
    }

    #[test]
    fn build_request_sanitizes_prompt_and_orders_system_first() {
        let request = build_request(
            SupportedModel::SonarSmall,
            Some("Be precise and concise."),
            "Hello, World! 123",
            SamplingParams::default(),
        )
        .expect("request should build");

        let messages = request.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[0].content, "Be precise and concise.");
        assert_eq!(messages[1].role, MessageRole::User);
        assert_eq!(messages[1].content, "Hello World 123");
    }

    #[test]
    fn build_request_skips_blank_system_prompt() {
        let request = build_request(
            SupportedModel::SonarSmall,
            Some("   "),
            "hi",
            SamplingParams::default(),
        )
        .expect("request should build");
        assert_eq!(request.messages().len(), 1);
        assert_eq!(request.messages()[0].role, MessageRole::User);
    }

    #[test]
    fn menu_choice_accepts_numbers_and_canonical_names() {
        assert_eq!(
            SupportedModel::from_menu_choice("1").expect("valid"),
            SupportedModel::SonarSmall
        );
        assert_eq!(
            SupportedModel::from_menu_choice(" 2\n").expect("valid"),
            SupportedModel::SonarLarge
        );
        assert_eq!(
            SupportedModel::from_menu_choice("LLAMA-3.1-SONAR-HUGE-128K-ONLINE").expect("valid"),
            SupportedModel::SonarHuge
        );
    }

    #[test]
    fn menu_choice_rejects_values_outside_the_set() {
        for raw in ["", "0", "4", "sonar", "gpt-4"] {
            let err = SupportedModel::from_menu_choice(raw).expect_err("should be invalid");
            assert!(matches!(err, PplxError::InvalidModel(_)), "raw: {raw:?}");
        }
    }

    #[test]
    fn error_payload_wins_over_choices() {
        let response = decode(json!({
            "id": "abc",
            "choices": [{"message": {"role": "assistant", "content": "ignored"}}],
            "error": {"message": "Invalid API key"}
        }));

        let err = response.into_completion().expect_err("error should win");
        assert_eq!(err.to_string(), "API Error: Invalid API key");
    }

    #[test]
    fn empty_choices_yield_no_response_outcome() {
        let response = decode(json!({"id": "abc", "choices": []}));
        let completion = response.into_completion().expect("empty is not an error");
        assert_eq!(completion, Completion::Empty);
        assert_eq!(completion.to_string(), "No response received");
    }

    #[test]
    fn first_choice_content_is_the_reply() {
        let response = decode(json!({
            "id": "abc",
            "model": "llama-3.1-sonar-small-128k-online",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "Three laws..."}},
                {"index": 1, "message": {"role": "assistant", "content": "second"}}
            ]
        }));

        assert_eq!(
            response.into_completion().expect("reply expected"),
            Completion::Reply("Three laws...".to_string())
        );
    }

    #[test]
    fn null_id_and_choices_decode_to_no_response() {
        let response = decode(json!({"id": null, "choices": null}));
        assert!(response.id.is_empty());
        assert_eq!(
            response.into_completion().expect("empty is not an error"),
            Completion::Empty
        );
    }

    #[test]
    fn error_wins_over_loosely_shaped_choices() {
        let shapes = [
            json!({"id": null, "choices": null, "error": {"message": "Invalid API key"}}),
            json!({"choices": [{"message": {"content": "no role"}}], "error": {"message": "Invalid API key"}}),
            json!({"choices": [{"message": {"role": "assistant", "content": null}}], "error": {"message": "Invalid API key"}}),
            json!({"choices": [{"message": {"role": "tool", "content": "x"}}], "error": {"message": "Invalid API key"}}),
        ];

        for body in shapes {
            let err = decode(body.clone())
                .into_completion()
                .expect_err("error should win");
            assert_eq!(err.to_string(), "API Error: Invalid API key", "body: {body}");
        }
    }

    #[test]
    fn unknown_role_and_null_content_still_produce_a_reply() {
        let response = decode(json!({
            "id": "abc",
            "choices": [{"message": {"role": "tool", "content": null}}]
        }));
        assert_eq!(
            response.into_completion().expect("reply expected"),
            Completion::Reply(String::new())
        );
    }

    #[test]
    fn error_envelope_ignores_the_rest_of_the_body() {
        let envelope: ErrorEnvelope = serde_json::from_value(json!({
            "id": 42,
            "choices": "not a list",
            "error": {"message": "quota exceeded", "code": 429}
        }))
        .expect("envelope should decode");
        assert_eq!(
            envelope.error.map(|error| error.message).as_deref(),
            Some("quota exceeded")
        );
    }

    #[test]
    fn error_only_payload_decodes_without_id_or_choices() {
        let response = decode(json!({"error": {"message": "rate limited", "type": "x"}}));
        assert!(response.id.is_empty());
        assert!(response.choices.is_empty());
        assert!(response.into_completion().is_err());
    }
}
