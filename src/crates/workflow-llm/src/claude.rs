//! Anthropic Claude gateway.
//!
//! Implements [`workflow_core::llm::LlmGateway`] against the Messages API. Two
//! retry layers apply here, per the gateway's retry policy split: transient HTTP
//! failures retry with exponential backoff via [`tooling::async_utils::retry`];
//! a plan that fails schema validation is retried with a corrective prompt, up to
//! `planner_retry_limit`, entirely separate from the HTTP-level retry.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use tooling::async_utils::retry::{with_retry, RetryPolicy};
use workflow_core::error::GraphError;
use workflow_core::llm::{LlmGateway, StepOutcome, TokenSink};
use workflow_core::types::{GraphState, Message, MessageRole, Plan, Step};
use workflow_registry::Tool;

use crate::config::GatewayConfig;
use crate::dispatch::{NoopToolDispatcher, ToolDispatcher};
use crate::error::LlmError;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct ClaudeGateway {
    config: GatewayConfig,
    client: Client,
    http_retry: RetryPolicy,
    dispatcher: Arc<dyn ToolDispatcher>,
}

impl ClaudeGateway {
    pub fn new(config: GatewayConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to build HTTP client");

        Self {
            config,
            client,
            http_retry: RetryPolicy::new(3).with_initial_interval(0.5).with_max_interval(8.0),
            dispatcher: Arc::new(NoopToolDispatcher),
        }
    }

    /// Wire a real tool-dispatch backend in place of the disclosed no-op default.
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn ToolDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    fn convert_messages(&self, messages: &[Message]) -> (Option<String>, Vec<ClaudeMessage>) {
        let mut system_prompt = None;
        let mut out = Vec::new();

        for msg in messages {
            match msg.role {
                MessageRole::System => {
                    system_prompt = Some(match system_prompt {
                        Some(existing) => format!("{existing}\n\n{}", msg.content),
                        None => msg.content.clone(),
                    });
                }
                MessageRole::User | MessageRole::Tool => {
                    out.push(ClaudeMessage {
                        role: "user".to_string(),
                        content: msg.content.clone(),
                    });
                }
                MessageRole::Assistant => {
                    out.push(ClaudeMessage {
                        role: "assistant".to_string(),
                        content: msg.content.clone(),
                    });
                }
            }
        }

        (system_prompt, out)
    }

    async fn send(&self, system: Option<String>, messages: Vec<ClaudeMessage>) -> Result<String, LlmError> {
        let url = format!("{}/v1/messages", self.config.base_url);
        let body = ClaudeRequest {
            model: self.config.model.clone(),
            messages,
            system,
            max_tokens: 4096,
            stream: false,
        };

        let response = with_retry(&self.http_retry, || async {
            let resp = self
                .client
                .post(&url)
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(LlmError::Http)?;

            if resp.status().is_server_error() || resp.status().as_u16() == 429 {
                let status = resp.status();
                return Err(LlmError::Provider(format!("transient status {status}")));
            }
            Ok(resp)
        })
        .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(if status.as_u16() == 401 {
                LlmError::Authentication(text)
            } else {
                LlmError::Provider(format!("claude API error {status}: {text}"))
            });
        }

        let parsed: ClaudeResponse = response.json().await.map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(parsed
            .content
            .into_iter()
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

#[async_trait]
impl LlmGateway for ClaudeGateway {
    async fn plan(
        &self,
        request: &str,
        history: &[Message],
        tools: &[Tool],
        tokens: TokenSink,
    ) -> Result<Plan, GraphError> {
        let tool_list = tools.iter().map(|t| format!("- {} ({})", t.id, t.display_name)).collect::<Vec<_>>().join("\n");
        let base_prompt = format!(
            "You are a planning assistant. Produce a JSON plan for this request.\n\
             Request: {request}\n\
             Available tools:\n{tool_list}\n\
             Respond with ONLY a JSON object: {{\"rationale\": string, \"steps\": [{{\"description\": string, \"expected_tool_ids\": [string], \"requires_approval\": bool}}]}}"
        );

        let (system, mut messages) = self.convert_messages(history);
        messages.push(ClaudeMessage { role: "user".to_string(), content: base_prompt });

        let mut last_error = String::new();
        for attempt in 0..self.config.planner_retry_limit {
            let text = self
                .send(system.clone(), messages.clone())
                .await
                .map_err(|e| e.into_planner_error())?;

            if let Some(sink) = &tokens {
                let _ = sink.try_send(text.clone());
            }

            match parse_plan(request, &text) {
                Ok(plan) => return Ok(plan),
                Err(e) => {
                    last_error = e;
                    messages.push(ClaudeMessage { role: "assistant".to_string(), content: text });
                    messages.push(ClaudeMessage {
                        role: "user".to_string(),
                        content: format!(
                            "That was not valid JSON matching the schema: {last_error}. Respond again with ONLY the corrected JSON object."
                        ),
                    });
                    tracing::warn!(attempt, error = %last_error, "planner output failed validation, retrying");
                }
            }
        }

        Err(LlmError::PlanerRetriesExhausted {
            attempts: self.config.planner_retry_limit,
            last_error,
        }
        .into_planner_error())
    }

    async fn execute_step(
        &self,
        step: &Step,
        state: &GraphState,
        tools: &[Tool],
        tokens: TokenSink,
    ) -> Result<StepOutcome, GraphError> {
        let tool_list = tools.iter().map(|t| t.id.clone()).collect::<Vec<_>>().join(", ");
        let prompt = format!(
            "Execute this step of the plan and respond with the result in plain text.\n\
             Step: {}\n\
             Tools available this step: {}",
            step.description, tool_list
        );

        let (system, mut messages) = self.convert_messages(&state.messages);
        messages.push(ClaudeMessage { role: "user".to_string(), content: prompt });

        let mut iterations = 0;
        loop {
            iterations += 1;
            if iterations > self.config.max_tool_call_iterations {
                return Err(LlmError::Provider("exceeded max tool call iterations".to_string()).into_execution_error());
            }

            let text = self.send(system.clone(), messages.clone()).await.map_err(|e| e.into_execution_error())?;

            if let Some(sink) = &tokens {
                let _ = sink.try_send(text.clone());
            }

            if let Some(tool_id) = extract_requested_tool(&text, tools) {
                let tool_result = self
                    .dispatcher
                    .dispatch(&tool_id, &step.description)
                    .await
                    .map_err(|e| e.into_execution_error())?;
                messages.push(ClaudeMessage { role: "assistant".to_string(), content: text });
                messages.push(ClaudeMessage {
                    role: "user".to_string(),
                    content: format!("[tool result for {tool_id}] {tool_result}"),
                });
                continue;
            }

            return Ok(StepOutcome {
                result_text: text,
                tool_outputs: None,
                rationale: format!("completed after {iterations} model call(s)"),
            });
        }
    }
}

/// A tool id mentioned verbatim in the model's response is treated as a request
/// to call that tool. A real deployment would use Claude's structured tool-use
/// blocks instead of text sniffing; this keeps the gateway's HTTP shape simple
/// since the concrete tool catalog is deployment-specific.
fn extract_requested_tool(text: &str, tools: &[Tool]) -> Option<String> {
    tools.iter().find(|t| text.contains(&format!("CALL_TOOL:{}", t.id))).map(|t| t.id.clone())
}

fn parse_plan(original_request: &str, text: &str) -> Result<Plan, String> {
    let trimmed = text.trim().trim_start_matches("```json").trim_start_matches("```").trim_end_matches("```");
    let raw: RawPlan = serde_json::from_str(trimmed.trim()).map_err(|e| e.to_string())?;

    let steps = raw
        .steps
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            let mut step = Step::new((i as u32) + 1, s.description);
            step.expected_tool_ids = s.expected_tool_ids;
            step.requires_approval = s.requires_approval;
            step
        })
        .collect();

    let plan = Plan::new(original_request, raw.rationale, steps);
    plan.validate().map_err(|e| e.to_string())?;
    Ok(plan)
}

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: usize,
    stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
}

#[derive(Debug, Deserialize)]
struct ClaudeContent {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    rationale: String,
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    description: String,
    #[serde(default)]
    expected_tool_ids: Vec<String>,
    #[serde(default)]
    requires_approval: bool,
}
