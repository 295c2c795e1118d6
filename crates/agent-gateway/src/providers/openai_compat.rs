//! An OpenAI-compatible chat-completions provider.
//!
//! Works against OpenAI itself, Azure OpenAI, Ollama, vLLM, and anything
//! else speaking the `/chat/completions` wire format — `agent_core` only
//! needs a [`Provider`], and this is one real implementation of it.

use async_trait::async_trait;
use serde_json::Value;

use agent_core::{ChatMessage, Error, Event, Provider, Result, Role, ToolCallRecord, ToolDefinition};

pub struct OpenAiCompatProvider {
    base_url: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("reqwest client builds with static config"),
        }
    }

    fn build_body(&self, messages: &[ChatMessage], tools: &[&ToolDefinition]) -> Value {
        let messages: Vec<Value> = messages.iter().map(message_to_openai).collect();
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });
        if !tools.is_empty() {
            let tools: Vec<Value> = tools.iter().map(|t| tool_to_openai(t)).collect();
            body["tools"] = Value::Array(tools);
        }
        body
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    async fn run(&self, messages: &[ChatMessage], tools: &[&ToolDefinition]) -> Result<Vec<Event>> {
        let body = self.build_body(messages, tools);
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Provider(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!("{status}: {text}")));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("invalid response body: {e}")))?;

        parse_completion(&payload)
    }
}

fn message_to_openai(msg: &ChatMessage) -> Value {
    match msg.role {
        Role::Tool => serde_json::json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id,
            "content": msg.content.clone().unwrap_or_default(),
        }),
        Role::Assistant => {
            let mut obj = serde_json::json!({
                "role": "assistant",
                "content": msg.content,
            });
            if let Some(calls) = &msg.tool_calls {
                let tool_calls: Vec<Value> = calls
                    .iter()
                    .map(|c| {
                        serde_json::json!({
                            "id": c.call_id,
                            "type": "function",
                            "function": {
                                "name": c.tool_name,
                                "arguments": c.args.to_string(),
                            }
                        })
                    })
                    .collect();
                obj["tool_calls"] = Value::Array(tool_calls);
            }
            obj
        }
        role => serde_json::json!({
            "role": role_to_str(role),
            "content": msg.content.clone().unwrap_or_default(),
        }),
    }
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

fn parse_completion(payload: &Value) -> Result<Vec<Event>> {
    let choice = payload["choices"].get(0).ok_or_else(|| {
        Error::Provider("response had no choices".into())
    })?;
    let message = &choice["message"];

    let mut events = Vec::new();
    if let Some(text) = message["content"].as_str() {
        if !text.is_empty() {
            events.push(Event::text(text.to_string()));
        }
    }
    if let Some(calls) = message["tool_calls"].as_array() {
        for call in calls {
            let call_id = call["id"].as_str().unwrap_or_default().to_string();
            let tool_name = call["function"]["name"].as_str().unwrap_or_default().to_string();
            let args_str = call["function"]["arguments"].as_str().unwrap_or("{}");
            let args: Value = serde_json::from_str(args_str).unwrap_or(Value::Null);
            events.push(Event::ToolCall(ToolCallRecord {
                call_id,
                tool_name,
                args,
            }));
        }
    }
    Ok(events)
}
