//! Orchestrator assembly and up-front validation.
//!
//! Every structural problem with a pipeline is reported here, before any
//! task runs.

use std::collections::{HashMap, HashSet};

use super::{Orchestrator, PipelineConfigError};
use crate::agents::Agent;
use crate::task::{template, Task, TaskId, INPUT_PLACEHOLDER};
use crate::tools::ToolRegistry;

/// Collects agents and tasks in declaration order.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorBuilder {
    agents: Vec<Agent>,
    tasks: Vec<Task>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn agent(mut self, agent: Agent) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn agents(mut self, agents: impl IntoIterator<Item = Agent>) -> Self {
        self.agents.extend(agents);
        self
    }

    /// Append a task. Tasks run in the order they are added.
    pub fn task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn tasks(mut self, tasks: impl IntoIterator<Item = Task>) -> Self {
        self.tasks.extend(tasks);
        self
    }

    /// Validate against `tools` and build.
    pub fn build(self, tools: &ToolRegistry) -> Result<Orchestrator, PipelineConfigError> {
        let bindings = validate(&self.agents, &self.tasks, tools)?;
        tracing::debug!(
            "Pipeline validated: {} agents, {} tasks",
            self.agents.len(),
            self.tasks.len()
        );
        Ok(Orchestrator {
            agents: self.agents,
            tasks: self.tasks,
            bindings,
        })
    }
}

/// Check agents and the task list.
///
/// Returns, per task, the index of its bound agent.
///
/// # Checks
/// - agent names and task ids are unique; the task list is non-empty
/// - task ids are valid placeholder names and are not `input`
/// - agents: `max_iterations >= 1`, no delegation, every capability is a
///   registered tool
/// - tasks: bound agent exists; each dependency is declared once, is not
///   the task itself and appears strictly earlier in the list; every
///   template placeholder is `input` or a declared dependency
pub(super) fn validate(
    agents: &[Agent],
    tasks: &[Task],
    tools: &ToolRegistry,
) -> Result<Vec<usize>, PipelineConfigError> {
    let mut agent_index: HashMap<&str, usize> = HashMap::with_capacity(agents.len());
    for (i, agent) in agents.iter().enumerate() {
        if agent_index.insert(agent.name(), i).is_some() {
            return Err(PipelineConfigError::DuplicateAgent(agent.name().to_string()));
        }
        if agent.iteration_limit() == 0 {
            return Err(PipelineConfigError::ZeroIterations(agent.name().to_string()));
        }
        if agent.delegates() {
            return Err(PipelineConfigError::DelegationEnabled(agent.name().to_string()));
        }
        if let Some(tool) = agent.capabilities().iter().find(|t| !tools.has_tool(t)) {
            return Err(PipelineConfigError::UnknownTool {
                agent: agent.name().to_string(),
                tool: tool.clone(),
            });
        }
    }

    if tasks.is_empty() {
        return Err(PipelineConfigError::NoTasks);
    }

    let positions: HashMap<&TaskId, usize> =
        tasks.iter().enumerate().map(|(i, t)| (t.id(), i)).collect();

    let mut seen: HashSet<&TaskId> = HashSet::with_capacity(tasks.len());
    let mut bindings = Vec::with_capacity(tasks.len());

    for (i, task) in tasks.iter().enumerate() {
        if !seen.insert(task.id()) {
            return Err(PipelineConfigError::DuplicateTask(task.id().clone()));
        }
        if task.id().as_str() == INPUT_PLACEHOLDER {
            return Err(PipelineConfigError::ReservedTaskId(task.id().clone()));
        }
        if !template::is_placeholder_name(task.id().as_str()) {
            return Err(PipelineConfigError::InvalidTaskId(task.id().clone()));
        }

        let agent = agent_index.get(task.agent()).copied().ok_or_else(|| {
            PipelineConfigError::UnknownAgent {
                task: task.id().clone(),
                agent: task.agent().to_string(),
            }
        })?;
        bindings.push(agent);

        let mut declared: HashSet<&TaskId> = HashSet::with_capacity(task.dependencies().len());
        for dep in task.dependencies() {
            if dep == task.id() {
                return Err(PipelineConfigError::SelfDependency(task.id().clone()));
            }
            if !declared.insert(dep) {
                return Err(PipelineConfigError::DuplicateDependency {
                    task: task.id().clone(),
                    dependency: dep.clone(),
                });
            }
            match positions.get(dep) {
                Some(&pos) if pos < i => {}
                Some(_) => {
                    return Err(PipelineConfigError::ForwardReference {
                        task: task.id().clone(),
                        dependency: dep.clone(),
                    })
                }
                None => {
                    return Err(PipelineConfigError::UnknownDependency {
                        task: task.id().clone(),
                        dependency: dep.clone(),
                    })
                }
            }
        }

        if let Some(placeholder) = task.placeholders().into_iter().find(|name| {
            name != INPUT_PLACEHOLDER && !declared.iter().any(|dep| dep.as_str() == name)
        }) {
            return Err(PipelineConfigError::UnknownPlaceholder {
                task: task.id().clone(),
                placeholder,
            });
        }
    }

    Ok(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::FakeTool;
    use serde_json::json;
    use std::sync::Arc;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::default();
        registry.register(Arc::new(FakeTool::ok("web_search", json!({"results": []}))));
        registry
    }

    fn worker() -> Agent {
        Agent::new("worker").role("does things")
    }

    fn build(tasks: Vec<Task>) -> Result<Orchestrator, PipelineConfigError> {
        OrchestratorBuilder::new()
            .agent(worker())
            .tasks(tasks)
            .build(&registry())
    }

    #[test]
    fn accepts_a_linear_chain() {
        let orchestrator = build(vec![
            Task::new("a", "worker").description("Start from {{input}}"),
            Task::new("b", "worker").context(["a"]).description("Use {{a}}"),
            Task::new("c", "worker").context(["a", "b"]),
        ])
        .unwrap();

        let order: Vec<&str> = orchestrator
            .execution_order()
            .map(TaskId::as_str)
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn accepts_non_prefix_dependencies() {
        assert!(build(vec![
            Task::new("a", "worker"),
            Task::new("b", "worker"),
            Task::new("c", "worker").context(["a"]),
        ])
        .is_ok());
    }

    #[test]
    fn rejects_forward_and_missing_references() {
        let err = build(vec![
            Task::new("a", "worker").context(["b"]),
            Task::new("b", "worker"),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            PipelineConfigError::ForwardReference {
                task: "a".into(),
                dependency: "b".into()
            }
        );

        let err = build(vec![Task::new("a", "worker").context(["ghost"])]).unwrap_err();
        assert_eq!(
            err,
            PipelineConfigError::UnknownDependency {
                task: "a".into(),
                dependency: "ghost".into()
            }
        );
    }

    #[test]
    fn rejects_self_and_duplicate_dependencies() {
        assert_eq!(
            build(vec![Task::new("a", "worker").context(["a"])]).unwrap_err(),
            PipelineConfigError::SelfDependency("a".into())
        );
        assert!(matches!(
            build(vec![
                Task::new("a", "worker"),
                Task::new("b", "worker").context(["a", "a"]),
            ]),
            Err(PipelineConfigError::DuplicateDependency { .. })
        ));
    }

    #[test]
    fn rejects_duplicates_and_empty_lists() {
        assert_eq!(build(Vec::new()).unwrap_err(), PipelineConfigError::NoTasks);
        assert_eq!(
            build(vec![Task::new("a", "worker"), Task::new("a", "worker")]).unwrap_err(),
            PipelineConfigError::DuplicateTask("a".into())
        );
        let err = OrchestratorBuilder::new()
            .agent(worker())
            .agent(worker())
            .task(Task::new("a", "worker"))
            .build(&registry())
            .unwrap_err();
        assert_eq!(err, PipelineConfigError::DuplicateAgent("worker".into()));
    }

    #[test]
    fn rejects_ids_that_placeholders_cannot_reach() {
        assert_eq!(
            build(vec![Task::new("input", "worker")]).unwrap_err(),
            PipelineConfigError::ReservedTaskId("input".into())
        );
        assert_eq!(
            build(vec![Task::new("deep research", "worker")]).unwrap_err(),
            PipelineConfigError::InvalidTaskId("deep research".into())
        );
        assert_eq!(
            build(vec![Task::new("", "worker")]).unwrap_err(),
            PipelineConfigError::InvalidTaskId("".into())
        );
        assert!(build(vec![Task::new("step_1-a", "worker")]).is_ok());
    }

    #[test]
    fn rejects_unknown_agent_and_placeholders() {
        assert!(matches!(
            build(vec![Task::new("a", "nobody")]),
            Err(PipelineConfigError::UnknownAgent { .. })
        ));

        // b ran earlier but is not a declared dependency of c
        let err = build(vec![
            Task::new("a", "worker"),
            Task::new("b", "worker"),
            Task::new("c", "worker").context(["a"]).description("{{a}} and {{b}}"),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            PipelineConfigError::UnknownPlaceholder {
                task: "c".into(),
                placeholder: "b".into()
            }
        );
    }

    #[test]
    fn rejects_bad_agent_definitions() {
        let check = |agent: Agent| {
            OrchestratorBuilder::new()
                .agent(agent)
                .task(Task::new("a", "worker"))
                .build(&registry())
                .unwrap_err()
        };

        assert_eq!(
            check(worker().max_iterations(0)),
            PipelineConfigError::ZeroIterations("worker".into())
        );
        assert_eq!(
            check(worker().allow_delegation(true)),
            PipelineConfigError::DelegationEnabled("worker".into())
        );
        assert_eq!(
            check(worker().tool("web_search").tool("telepathy")),
            PipelineConfigError::UnknownTool {
                agent: "worker".into(),
                tool: "telepathy".into()
            }
        );
    }
}
