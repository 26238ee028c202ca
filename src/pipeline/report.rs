//! Topic report crew: research → analysis → report.
//!
//! The seed is a topic string ("Neurodivergence"). The research agent
//! searches every source, the analyst cross-checks the findings and the
//! reporter writes a markdown report.

use chrono::{Datelike, Utc};
use tokio_util::sync::CancellationToken;

use super::{RESEARCH, RESEARCH_TOOLS};
use crate::agents::{Agent, AgentContext};
use crate::orchestrator::{Orchestrator, PipelineConfigError, PipelineError, PipelineOutput};
use crate::task::Task;

pub const ANALYSIS: &str = "analysis";
pub const REPORT: &str = "report";

/// Calendar year used to steer research towards recent material.
pub fn current_year() -> i32 {
    Utc::now().year()
}

pub fn topic_report_agents() -> Vec<Agent> {
    vec![
        Agent::new("topic_researcher")
            .role("Senior research specialist for the requested topic")
            .goal("Uncover the most relevant and recent developments on the topic from several sources")
            .backstory(
                "You are a seasoned researcher with a knack for finding the latest work on a \
                 subject and presenting it clearly. You cross web results with studies and \
                 community discussions.",
            )
            .tools(RESEARCH_TOOLS)
            .max_iterations(4),
        Agent::new("analyst")
            .role("Data analyst who verifies research findings")
            .goal("Check key claims, identify trends and rate the credibility of sources")
            .backstory(
                "You are a meticulous analyst. You verify claims, cross-reference \
                 information and flag anything weakly sourced.",
            )
            .tool("web_search")
            .max_iterations(2),
        Agent::new("reporting_analyst")
            .role("Report writer")
            .goal("Turn research and analysis into a detailed, readable report")
            .backstory(
                "You turn complex findings into clear reports that are easy to act on.",
            ),
    ]
}

/// Tasks for a topic report; `year` is written into the research brief.
pub fn topic_report_tasks(year: i32) -> Vec<Task> {
    vec![
        Task::new(RESEARCH, "topic_researcher")
            .description(format!(
                "Conduct thorough research about {{{{input}}}}. Use `web_search` for news and \
                 overviews, `scholar_search` for studies and `reddit_search` for lived \
                 experience. Focus on material relevant in {year}. If a tool returns an \
                 error, continue with the others and note the gap.",
            ))
            .expected_output(
                "A list of 10 bullet points with the most relevant information about the \
                 topic, each with its source URL.",
            ),
        Task::new(ANALYSIS, "analyst")
            .description(
                "Analyze the research findings on {{input}}:\n\
                 1) verify the key claims\n\
                 2) identify trends and patterns\n\
                 3) assess the credibility of each source\n\
                 4) outline likely next developments",
            )
            .expected_output("An analysis with verified findings, trends and source credibility notes.")
            .context([RESEARCH]),
        Task::new(REPORT, "reporting_analyst")
            .description(
                "Write the final report on {{input}}. Start with an executive summary, \
                 expand each finding into its own section, and end with actionable \
                 insights and the list of sources.",
            )
            .expected_output(
                "A fully fledged markdown report with an executive summary, one section per \
                 main topic and actionable insights. No code fences.",
            )
            .context([RESEARCH, ANALYSIS]),
    ]
}

/// The topic report crew bound to its collaborators.
pub struct TopicReport {
    orchestrator: Orchestrator,
    ctx: AgentContext,
}

impl TopicReport {
    /// Validate the crew for the current year.
    pub fn new(ctx: AgentContext) -> Result<Self, PipelineConfigError> {
        Self::for_year(ctx, current_year())
    }

    pub fn for_year(ctx: AgentContext, year: i32) -> Result<Self, PipelineConfigError> {
        let orchestrator =
            Orchestrator::new(topic_report_agents(), topic_report_tasks(year), &ctx.tools)?;
        Ok(Self { orchestrator, ctx })
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Research and write a report on `topic`.
    pub async fn report(&self, topic: &str) -> Result<PipelineOutput, PipelineError> {
        self.orchestrator.run(topic, &self.ctx).await
    }

    pub async fn report_with_cancel(
        &self,
        topic: &str,
        token: CancellationToken,
    ) -> Result<PipelineOutput, PipelineError> {
        let ctx = self.ctx.with_cancel_token(token);
        self.orchestrator.run(topic, &ctx).await
    }
}
