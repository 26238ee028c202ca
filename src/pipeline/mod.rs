//! Preset pipelines.
//!
//! The default chatbot runs clarify → research → plan → respond: four
//! agents, one task each, every task sees all earlier tasks and the
//! research agent is the only one with tools. [`TopicReport`] is the
//! topic-seeded research → analysis → report crew.

pub(crate) mod report;

pub use report::{
    current_year, topic_report_agents, topic_report_tasks, TopicReport, ANALYSIS, REPORT,
};

use tokio_util::sync::CancellationToken;

use crate::agents::{Agent, AgentContext};
use crate::orchestrator::{Orchestrator, PipelineConfigError, PipelineError, PipelineOutput};
use crate::task::{OutputFormat, Task};

pub const CLARIFY: &str = "clarify";
pub const RESEARCH: &str = "research";
pub const PLAN: &str = "plan";
pub const RESPOND: &str = "respond";

/// Tools the research agent may call.
pub const RESEARCH_TOOLS: [&str; 3] = ["web_search", "scholar_search", "reddit_search"];

pub fn default_agents() -> Vec<Agent> {
    vec![
        Agent::new("conversation")
            .role("Clarifies the user's goal and constraints with empathy")
            .goal("Ask at most 4 useful follow-up questions and summarize the request")
            .backstory(
                "You coach neurodivergent people. Validate briefly, then clarify. \
                 Keep the summary short and only ask questions that change the plan.",
            ),
        Agent::new("researcher")
            .role("Finds relevant web articles, scholarly papers and Reddit threads")
            .goal("Return a curated list of sources with titles, URLs and why each matters")
            .backstory(
                "You are a precise researcher. Prefer high-signal links, drop duplicates, \
                 and include one or two practical Reddit discussions when they help.",
            )
            .tools(RESEARCH_TOOLS)
            .max_iterations(4),
        Agent::new("planner")
            .role("Turns the clarified request and research into a concrete task plan")
            .goal(
                "Produce at most 7 tasks with time_hours and impact_pct (summing to about 100)",
            )
            .backstory("You design plans around short focus blocks with clear outcomes."),
        Agent::new("responder")
            .role("Writes the final chatbot reply")
            .goal("Be supportive, cite 3-6 sources and present the prioritized plan with a step for today")
            .backstory("You communicate clearly: brief validation, then concrete actions."),
    ]
}

pub fn default_tasks() -> Vec<Task> {
    vec![
        Task::new(CLARIFY, "conversation")
            .description(
                "Read the user's message. If important details are missing, write up to 4 \
                 clarifying questions, then produce a concise summary of the request.\n\
                 Answer with a JSON object with keys \"summary\" and \"questions\" \
                 (a list, possibly empty).",
            )
            .expected_output("JSON with \"summary\" and \"questions\" (list).")
            .output_format(OutputFormat::Json),
        Task::new(RESEARCH, "researcher")
            .description(
                "Find information relevant to the summarized request. Call `web_search` \
                 for general links, `scholar_search` for studies and `reddit_search` for \
                 lived experience. If a tool returns an error, keep going with the others \
                 and mention the gap.\n\
                 Answer with a JSON object with key \"citations\": a list of \
                 {\"title\", \"url\", \"why\"}. Keep 4-8 items.",
            )
            .expected_output("JSON with a \"citations\" list of 4-8 curated items.")
            .context([CLARIFY])
            .output_format(OutputFormat::Json),
        Task::new(PLAN, "planner")
            .description(
                "Using the summary and citations, propose a plan of at most 7 tasks. \
                 For each task give \"name\", \"desc\", \"time_hours\" (a multiple of 0.25, \
                 at least 0.25) and \"impact_pct\" (the impacts sum to 100).\n\
                 Answer with a JSON object with keys \"tasks\" and \"notes\".",
            )
            .expected_output("JSON with \"tasks\" (list) and \"notes\".")
            .context([CLARIFY, RESEARCH])
            .output_format(OutputFormat::Plan),
        Task::new(RESPOND, "responder")
            .description(
                "Write the final reply to the user:\n\
                 1) one sentence of validation\n\
                 2) a brief summary of their goal\n\
                 3) a bullet list of the prioritized tasks, showing time, impact and \
                 priority_score, highest score first\n\
                 4) a 'Do today' step of 25-50 minutes\n\
                 5) 3-6 citations with hyperlinked titles; if some sources could not be \
                 searched, say so in one line\n\
                 Tone: supportive, concise and actionable.",
            )
            .expected_output("A clear, friendly message with bullets and linked citations.")
            .context([CLARIFY, RESEARCH, PLAN]),
    ]
}

/// The default pipeline bound to its collaborators.
pub struct ChatPipeline {
    orchestrator: Orchestrator,
    ctx: AgentContext,
}

impl ChatPipeline {
    /// Validate the default pipeline against the context's tool registry.
    pub fn new(ctx: AgentContext) -> Result<Self, PipelineConfigError> {
        let orchestrator = Orchestrator::new(default_agents(), default_tasks(), &ctx.tools)?;
        Ok(Self { orchestrator, ctx })
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Answer one user message.
    pub async fn chat(&self, message: &str) -> Result<PipelineOutput, PipelineError> {
        self.orchestrator.run(message, &self.ctx).await
    }

    /// Answer one user message, stopping at the next task boundary once
    /// `token` is cancelled.
    pub async fn chat_with_cancel(
        &self,
        message: &str,
        token: CancellationToken,
    ) -> Result<PipelineOutput, PipelineError> {
        let ctx = self.ctx.with_cancel_token(token);
        self.orchestrator.run(message, &ctx).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted collaborators for the default pipeline.

    use std::sync::Arc;

    use serde_json::json;

    use crate::llm::testing::ScriptedLlm;
    use crate::llm::ToolCall;
    use crate::tools::testing::FakeTool;
    use crate::tools::{ToolError, ToolRegistry};

    pub const FINAL_REPLY: &str = "You can do this. Plan: 1) Daily drill (0.5h, 60%, score 120) ... Do today: 30 minutes of drills.";

    /// Registry with the three research tools; Reddit is not configured.
    pub fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::default();
        registry.register(Arc::new(FakeTool::ok(
            "web_search",
            json!({"query": "learn", "results": [{"title": "Deliberate practice", "url": "https://a.example", "snippet": "s"}]}),
        )));
        registry.register(Arc::new(FakeTool::ok(
            "scholar_search",
            json!({"query": "learn", "results": [{"title": "Spacing effect", "year": 2006, "doi": null, "open_access": true, "url": "https://b.example"}]}),
        )));
        registry.register(Arc::new(FakeTool::failing(
            "reddit_search",
            ToolError::missing_credentials("Reddit credentials missing"),
        )));
        registry
    }

    /// A full successful script: four stages, one research tool round.
    pub fn script() -> ScriptedLlm {
        ScriptedLlm::new()
            .reply(r#"{"summary": "Learn a new skill in 2 weeks", "questions": ["Which skill?"]}"#)
            .tool_round(vec![
                ToolCall::function("c1", "web_search", r#"{"query": "learn a skill fast"}"#),
                ToolCall::function("c2", "scholar_search", r#"{"query": "skill acquisition"}"#),
                ToolCall::function("c3", "reddit_search", r#"{"query": "learned in two weeks"}"#),
            ])
            .reply(r#"{"citations": [{"title": "Deliberate practice", "url": "https://a.example", "why": "method"}]}"#)
            .reply(
                "```json\n{\"tasks\": [\
                 {\"name\": \"Pick the skill\", \"desc\": \"decide\", \"time_hours\": 0.25, \"impact_pct\": 10},\
                 {\"name\": \"Daily drill\", \"desc\": \"practice\", \"time_hours\": 0.5, \"impact_pct\": 60},\
                 {\"name\": \"Weekend project\", \"desc\": \"apply\", \"time_hours\": 3, \"impact_pct\": 30}],\
                 \"notes\": \"Use 25 minute blocks\"}\n```",
            )
            .reply(FINAL_REPLY)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::testing::{registry, script, FINAL_REPLY};
    use super::*;
    use crate::llm::testing::ScriptedLlm;
    use crate::tools::ToolErrorKind;

    fn pipeline(llm: Arc<ScriptedLlm>) -> ChatPipeline {
        ChatPipeline::new(AgentContext::new(llm, Arc::new(registry()), "test-model")).unwrap()
    }

    #[test]
    fn test_default_pipeline_is_valid_and_linear() {
        let pipeline = pipeline(Arc::new(ScriptedLlm::new()));
        let order: Vec<&str> = pipeline
            .orchestrator()
            .execution_order()
            .map(|id| id.as_str())
            .collect();
        assert_eq!(order, vec![CLARIFY, RESEARCH, PLAN, RESPOND]);

        // each task depends on exactly its prefix
        for (i, task) in pipeline.orchestrator().tasks().iter().enumerate() {
            let deps: Vec<&str> = task.dependencies().iter().map(|d| d.as_str()).collect();
            assert_eq!(deps, order[..i].to_vec());
        }
    }

    #[test]
    fn test_missing_tool_fails_construction() {
        let ctx = AgentContext::new(
            Arc::new(ScriptedLlm::new()),
            Arc::new(crate::tools::ToolRegistry::default()),
            "test-model",
        );
        assert!(matches!(
            ChatPipeline::new(ctx),
            Err(PipelineConfigError::UnknownTool { .. })
        ));
    }

    #[tokio::test]
    async fn test_learn_a_skill_end_to_end() {
        let llm = Arc::new(script());
        let pipeline = pipeline(llm.clone());

        let output = pipeline.chat("Help me learn a new skill in 2 weeks").await.unwrap();

        assert_eq!(output.final_output, FINAL_REPLY);
        assert_eq!(output.records.len(), 4);
        for id in [CLARIFY, RESEARCH, PLAN, RESPOND] {
            assert!(output.records.contains(&id.into()), "missing record for {}", id);
        }

        let clarify = output.records.get(&CLARIFY.into()).unwrap();
        assert_eq!(clarify.structured().unwrap()["questions"][0], "Which skill?");

        let research = output.records.get(&RESEARCH.into()).unwrap();
        assert_eq!(research.iterations(), 2);
        assert_eq!(research.tool_calls().len(), 3);
        assert_eq!(
            research.tool_calls()[2].payload.error_kind(),
            Some(ToolErrorKind::MissingCredentials)
        );

        let plan = output.records.get(&PLAN.into()).unwrap().structured().unwrap();
        assert_eq!(plan["subtasks"][0]["name"], "Daily drill");
        assert_eq!(plan["subtasks"][0]["priority_score"], 120.0);

        let calls = llm.calls();
        assert_eq!(calls.len(), 5);
        assert!(calls.iter().all(|call| call.model == "test-model"));
        // only the research stage is offered tools
        assert!(calls[0].tools.is_empty());
        assert_eq!(calls[1].tools.len(), 3);
        assert!(calls[4].tools.is_empty());
        // the responder sees the scored plan
        assert!(calls[4].user_prompt().contains("\"priority_score\": 120.0"));
        assert!(calls[4].user_prompt().contains("Help me learn a new skill in 2 weeks"));
        assert_eq!(llm.remaining(), 0);
    }

    #[tokio::test]
    async fn test_cancel_token_stops_the_chat() {
        let pipeline = pipeline(Arc::new(script()));
        let token = CancellationToken::new();
        token.cancel();

        let err = pipeline
            .chat_with_cancel("Help me learn a new skill in 2 weeks", token)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { .. }));
    }
}
