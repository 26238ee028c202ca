//! Bounded agent execution - the LLM/tool loop that answers one task.

use serde_json::Value;

use super::{Agent, AgentContext, AgentError, AgentOutput};
use crate::llm::{ChatMessage, Role, ToolCall};
use crate::task::ExecutionRecord;
use crate::tools::{ToolArgs, ToolErrorKind, ToolInvocation, ToolPayload};

/// Everything an agent is given for one task.
#[derive(Debug, Clone)]
pub struct TaskInput<'a> {
    /// Rendered instruction
    pub instruction: String,
    /// Expected-output contract
    pub expected_output: &'a str,
    /// Declared upstream records, in dependency order
    pub upstream: Vec<&'a ExecutionRecord>,
    /// Pipeline seed input
    pub seed: &'a str,
}

/// Runs one agent on one task.
///
/// # Algorithm
/// 1. Build the system prompt from the persona and permitted tools
/// 2. Call the LLM with only the permitted tool schemas
/// 3. If the LLM requests tool calls: check each against the capability
///    set, dispatch the permitted ones, feed every payload back
/// 4. Repeat until the LLM answers without tool calls, or the iteration
///    limit is reached
pub struct AgentExecutor<'a> {
    agent: &'a Agent,
    ctx: &'a AgentContext,
}

impl<'a> AgentExecutor<'a> {
    pub fn new(agent: &'a Agent, ctx: &'a AgentContext) -> Self {
        Self { agent, ctx }
    }

    /// Build the system prompt for this agent.
    pub fn system_prompt(&self) -> String {
        let mut prompt = format!(
            "You are {name}.\nRole: {role}\nGoal: {goal}\n",
            name = self.agent.name(),
            role = self.agent.role_text(),
            goal = self.agent.goal_text(),
        );
        if !self.agent.backstory_text().is_empty() {
            prompt.push_str(&format!("\n{}\n", self.agent.backstory_text()));
        }

        let tools = self.ctx.tools.describe(self.agent.capabilities());
        if !tools.is_empty() {
            let tool_descriptions = tools
                .iter()
                .map(|t| format!("- **{}**: {}", t.name, t.description))
                .collect::<Vec<_>>()
                .join("\n");
            prompt.push_str(&format!(
                r#"
## Available Tools
{tool_descriptions}

A tool may answer with {{"error": "...", "kind": "..."}} instead of results.
When that happens, carry on with what you have and say which source is missing.
"#
            ));
        }

        prompt.push_str(
            r#"
## Rules
1. Resolve the task yourself; you cannot hand work to other agents
2. Only use the tools listed above
3. When you have the answer, reply with it directly and request no tools"#,
        );
        prompt
    }

    /// Build the user prompt: instruction, contract, upstream context, seed.
    pub fn user_prompt(input: &TaskInput<'_>) -> String {
        let mut prompt = input.instruction.trim().to_string();

        if !input.expected_output.trim().is_empty() {
            prompt.push_str("\n\n## Expected output\n");
            prompt.push_str(input.expected_output.trim());
        }

        if !input.upstream.is_empty() {
            prompt.push_str("\n\n## Context from earlier tasks");
            for record in &input.upstream {
                prompt.push_str(&format!(
                    "\n\n### {} ({})\n{}",
                    record.task(),
                    record.agent(),
                    record.context_text().trim()
                ));
            }
        }

        prompt.push_str("\n\n## User input\n");
        prompt.push_str(input.seed.trim());
        prompt
    }

    /// Run the loop for one task.
    pub async fn execute(&self, input: &TaskInput<'_>) -> Result<AgentOutput, AgentError> {
        let limit = self.agent.iteration_limit();
        let schemas = self.ctx.tools.schemas_for(self.agent.capabilities());
        let tool_schemas = (!schemas.is_empty()).then_some(schemas.as_slice());

        let mut messages = vec![
            ChatMessage::new(Role::System, self.system_prompt()),
            ChatMessage::new(Role::User, Self::user_prompt(input)),
        ];
        let mut tool_log: Vec<ToolInvocation> = Vec::new();

        for iteration in 1..=limit {
            tracing::debug!(
                "Agent '{}' iteration {}/{}",
                self.agent.name(),
                iteration,
                limit
            );

            let response = self
                .ctx
                .llm
                .chat_completion(&self.ctx.model, &messages, tool_schemas)
                .await
                .map_err(|e| AgentError::Llm(e.to_string()))?;

            let requested = response.requested_tool_calls();
            if !requested.is_empty() {
                messages.push(ChatMessage::assistant_tool_calls(
                    response.content.clone(),
                    requested.to_vec(),
                ));

                for call in requested {
                    let invocation = self.dispatch(call).await;
                    messages.push(ChatMessage::tool_result(
                        call.id.clone(),
                        invocation.payload.to_message(),
                    ));
                    tool_log.push(invocation);
                }
                continue;
            }

            return match response.content.as_deref().map(str::trim) {
                Some(content) if !content.is_empty() => Ok(AgentOutput {
                    content: content.to_string(),
                    iterations: iteration,
                    tool_calls: tool_log,
                }),
                _ => Err(AgentError::EmptyResponse),
            };
        }

        tracing::warn!(
            "Agent '{}' used all {} rounds without a final answer",
            self.agent.name(),
            limit
        );
        Err(AgentError::IterationBudgetExhausted { limit })
    }

    /// Execute a single tool call, never failing the task.
    async fn dispatch(&self, call: &ToolCall) -> ToolInvocation {
        let tool = call.function.name.clone();

        if !self.agent.can_use(&tool) {
            tracing::warn!(
                "Agent '{}' attempted tool '{}' outside its capability set",
                self.agent.name(),
                tool
            );
            return ToolInvocation {
                payload: ToolPayload::error(
                    ToolErrorKind::NotPermitted,
                    format!("agent '{}' may not call '{}'", self.agent.name(), tool),
                ),
                tool,
                arguments: ToolArgs::new(),
            };
        }

        let arguments = match parse_arguments(&call.function.arguments) {
            Ok(arguments) => arguments,
            Err(payload) => {
                tracing::warn!("Tool '{}' called with unusable arguments", tool);
                return ToolInvocation {
                    tool,
                    arguments: ToolArgs::new(),
                    payload,
                };
            }
        };

        tracing::debug!("Agent '{}' calling tool '{}'", self.agent.name(), tool);
        let payload = self.ctx.tools.invoke(&tool, &arguments).await;
        if let Some(kind) = payload.error_kind() {
            tracing::warn!("Tool '{}' returned an error body ({}), passing it to the model", tool, kind);
        }

        ToolInvocation {
            tool,
            arguments,
            payload,
        }
    }
}

/// Decode the model's JSON-string arguments into an argument map.
fn parse_arguments(raw: &str) -> Result<ToolArgs, ToolPayload> {
    if raw.trim().is_empty() {
        return Ok(ToolArgs::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(ToolArgs::new()),
        Ok(other) => Err(ToolPayload::error(
            ToolErrorKind::InvalidArguments,
            format!("arguments must be a JSON object, got {}", other),
        )),
        Err(e) => Err(ToolPayload::error(
            ToolErrorKind::InvalidArguments,
            format!("arguments are not valid JSON: {}", e),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedLlm;
    use crate::tools::testing::FakeTool;
    use crate::tools::{ToolError, ToolRegistry};
    use serde_json::json;
    use std::sync::Arc;

    fn input(seed: &str) -> TaskInput<'_> {
        TaskInput {
            instruction: "Find sources".to_string(),
            expected_output: "JSON with 'citations'",
            upstream: Vec::new(),
            seed,
        }
    }

    fn search_call(id: &str, tool: &str) -> ToolCall {
        ToolCall::function(id, tool, r#"{"query": "focus"}"#)
    }

    fn context(llm: Arc<ScriptedLlm>, tools: Vec<Arc<FakeTool>>) -> AgentContext {
        let mut registry = ToolRegistry::default();
        for tool in tools {
            registry.register(tool);
        }
        AgentContext::new(llm, Arc::new(registry), "test-model")
    }

    fn researcher(limit: usize) -> Agent {
        Agent::new("research")
            .role("Finds relevant sources")
            .goal("Return curated links")
            .tool("web_search")
            .max_iterations(limit)
    }

    #[tokio::test]
    async fn test_final_answer_without_tools() {
        let llm = Arc::new(ScriptedLlm::new().reply("  a final answer \n"));
        let ctx = context(llm.clone(), Vec::new());
        let agent = Agent::new("conversation").role("Clarifies goals");

        let output = AgentExecutor::new(&agent, &ctx).execute(&input("learn chess")).await.unwrap();

        assert_eq!(output.content, "a final answer");
        assert_eq!(output.iterations, 1);
        let calls = llm.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].tools.is_empty());
        assert!(calls[0].system_prompt().contains("Role: Clarifies goals"));
        assert!(calls[0].user_prompt().ends_with("## User input\nlearn chess"));
    }

    #[tokio::test]
    async fn test_tool_round_then_answer() {
        let web = Arc::new(FakeTool::ok("web_search", json!({"results": [{"title": "t"}]})));
        let other = Arc::new(FakeTool::ok("reddit_search", json!({"results": []})));
        let llm = Arc::new(
            ScriptedLlm::new()
                .tool_round(vec![search_call("call_1", "web_search")])
                .reply("{\"citations\": []}"),
        );
        let ctx = context(llm.clone(), vec![web.clone(), other]);

        let output = AgentExecutor::new(&researcher(2), &ctx)
            .execute(&input("focus"))
            .await
            .unwrap();

        assert_eq!(output.iterations, 2);
        assert_eq!(output.tool_calls.len(), 1);
        assert_eq!(output.tool_calls[0].arguments["query"], "focus");
        assert!(!output.tool_calls[0].payload.is_error());
        assert_eq!(web.call_count(), 1);

        let calls = llm.calls();
        // only permitted schemas are offered
        assert_eq!(calls[0].tools, vec!["web_search"]);
        let tool_message = calls[1]
            .messages
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_1"));
        assert!(tool_message.content.as_deref().unwrap().contains("\"title\":\"t\""));
    }

    #[tokio::test]
    async fn test_iteration_limit_stops_the_loop() {
        let web = Arc::new(FakeTool::ok("web_search", json!({"results": []})));
        let llm = Arc::new(
            ScriptedLlm::new()
                .tool_round(vec![search_call("call_1", "web_search")])
                .tool_round(vec![search_call("call_2", "web_search")])
                .reply("done"),
        );
        let ctx = context(llm.clone(), vec![web]);

        let err = AgentExecutor::new(&researcher(1), &ctx)
            .execute(&input("focus"))
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::IterationBudgetExhausted { limit: 1 }));
        assert!(err.to_string().contains("iteration budget exhausted"));
        assert_eq!(llm.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_disallowed_tool_is_a_local_error() {
        let reddit = Arc::new(FakeTool::ok("reddit_search", json!({"results": []})));
        let llm = Arc::new(
            ScriptedLlm::new()
                .tool_round(vec![search_call("call_1", "reddit_search")])
                .reply("answer without reddit"),
        );
        let ctx = context(llm.clone(), vec![reddit.clone()]);

        let output = AgentExecutor::new(&researcher(2), &ctx)
            .execute(&input("focus"))
            .await
            .unwrap();

        assert_eq!(output.content, "answer without reddit");
        assert_eq!(reddit.call_count(), 0);
        assert_eq!(
            output.tool_calls[0].payload.error_kind(),
            Some(ToolErrorKind::NotPermitted)
        );
        let fed_back = llm.calls()[1]
            .messages
            .iter()
            .any(|m| m.role == Role::Tool && m.content.as_deref().unwrap_or("").contains("not_permitted"));
        assert!(fed_back);
    }

    #[tokio::test]
    async fn test_tool_failures_are_absorbed() {
        let web = Arc::new(FakeTool::failing(
            "web_search",
            ToolError::missing_credentials("SERPAPI_KEY missing"),
        ));
        let llm = Arc::new(
            ScriptedLlm::new()
                .tool_round(vec![
                    search_call("call_1", "web_search"),
                    ToolCall::function("call_2", "web_search", "not json"),
                ])
                .reply("web search unavailable; partial answer"),
        );
        let ctx = context(llm, vec![web.clone()]);

        let output = AgentExecutor::new(&researcher(2), &ctx)
            .execute(&input("focus"))
            .await
            .unwrap();

        assert_eq!(
            output.tool_calls[0].payload.error_kind(),
            Some(ToolErrorKind::MissingCredentials)
        );
        assert_eq!(
            output.tool_calls[1].payload.error_kind(),
            Some(ToolErrorKind::InvalidArguments)
        );
        assert_eq!(web.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_and_failed_responses() {
        let ctx = context(Arc::new(ScriptedLlm::new().reply("   ")), Vec::new());
        let agent = Agent::new("responder");
        let err = AgentExecutor::new(&agent, &ctx).execute(&input("x")).await.unwrap_err();
        assert!(matches!(err, AgentError::EmptyResponse));

        let ctx = context(Arc::new(ScriptedLlm::new().fail("503 from backend")), Vec::new());
        let err = AgentExecutor::new(&agent, &ctx).execute(&input("x")).await.unwrap_err();
        assert!(matches!(err, AgentError::Llm(ref m) if m.contains("503")));
    }

    #[test]
    fn test_user_prompt_lists_upstream_in_order() {
        let a = ExecutionRecord::new("clarify".into(), "conversation", "summary: chess");
        let b = ExecutionRecord::new("research".into(), "research", "citations")
            .with_structured(json!({"citations": []}));
        let prompt = AgentExecutor::user_prompt(&TaskInput {
            instruction: "Plan it".to_string(),
            expected_output: "JSON with 'tasks'",
            upstream: vec![&b, &a],
            seed: "learn chess",
        });

        let research = prompt.find("### research (research)").unwrap();
        let clarify = prompt.find("### clarify (conversation)").unwrap();
        assert!(research < clarify);
        assert!(prompt.contains("\"citations\": []"));
        assert!(prompt.starts_with("Plan it\n\n## Expected output\nJSON with 'tasks'"));
    }

    #[test]
    fn test_argument_parsing() {
        assert!(parse_arguments("").unwrap().is_empty());
        assert!(parse_arguments("null").unwrap().is_empty());
        assert_eq!(parse_arguments(r#"{"query": "q"}"#).unwrap()["query"], "q");
        assert!(parse_arguments("[1]").is_err());
    }
}
