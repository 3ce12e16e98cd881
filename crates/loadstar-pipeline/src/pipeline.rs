//! Pipeline composition.
//!
//! A [`Pipeline`] is a validated DAG of operators. Tasks keep their
//! declaration order; [`Pipeline::execution_order`] yields a topological order
//! that prefers earlier-declared tasks when several are ready.

use std::collections::{BTreeSet, HashMap, HashSet};

use loadstar_config::DefaultArgs;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::operators::Operator;

/// An operator together with the ids of the tasks it waits on.
#[derive(Debug)]
pub struct PipelineTask {
    operator: Box<dyn Operator>,
    dependencies: Vec<String>,
}

impl PipelineTask {
    pub fn id(&self) -> &str {
        self.operator.task_id()
    }

    pub fn operator(&self) -> &dyn Operator {
        self.operator.as_ref()
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

/// A validated, acyclic set of tasks.
#[derive(Debug)]
pub struct Pipeline {
    name: String,
    description: String,
    defaults: DefaultArgs,
    tasks: Vec<PipelineTask>,
    order: Vec<usize>,
}

impl Pipeline {
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Scheduler defaults carried with the pipeline. Never acted on here.
    pub fn defaults(&self) -> &DefaultArgs {
        &self.defaults
    }

    /// Tasks in declaration order.
    pub fn tasks(&self) -> &[PipelineTask] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&PipelineTask> {
        self.tasks.iter().find(|t| t.id() == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks in a deterministic topological order.
    pub fn execution_order(&self) -> impl Iterator<Item = &PipelineTask> {
        self.order.iter().map(|&i| &self.tasks[i])
    }

    /// Ids of every task that transitively depends on `id`.
    pub fn downstream(&self, id: &str) -> HashSet<String> {
        let mut found = HashSet::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            for task in &self.tasks {
                let depends = task.dependencies.iter().any(|d| *d == current);
                if depends && found.insert(task.id().to_string()) {
                    stack.push(task.id().to_string());
                }
            }
        }
        found
    }
}

/// Assembles a [`Pipeline`] task by task.
///
/// ```
/// use loadstar_pipeline::{Marker, Pipeline};
///
/// let pipeline = Pipeline::builder("demo")
///     .task(Marker::new("begin").unwrap(), &[])
///     .task(Marker::new("end").unwrap(), &["begin"])
///     .build()
///     .unwrap();
/// let order: Vec<&str> = pipeline.execution_order().map(|t| t.id()).collect();
/// assert_eq!(order, ["begin", "end"]);
/// ```
#[derive(Debug)]
pub struct PipelineBuilder {
    name: String,
    description: String,
    defaults: DefaultArgs,
    tasks: Vec<PipelineTask>,
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            defaults: DefaultArgs::default(),
            tasks: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn defaults(mut self, defaults: DefaultArgs) -> Self {
        self.defaults = defaults;
        self
    }

    /// Add a task that runs after every task in `dependencies`.
    pub fn task(self, operator: impl Operator + 'static, dependencies: &[&str]) -> Self {
        let dependencies = dependencies.iter().map(|d| d.to_string()).collect();
        self.boxed_task(Box::new(operator), dependencies)
    }

    pub fn boxed_task(mut self, operator: Box<dyn Operator>, dependencies: Vec<String>) -> Self {
        self.tasks.push(PipelineTask {
            operator,
            dependencies,
        });
        self
    }

    /// Validate the graph and freeze it.
    pub fn build(self) -> Result<Pipeline> {
        let nodes: Vec<(&str, &[String])> = self
            .tasks
            .iter()
            .map(|t| (t.id(), t.dependencies.as_slice()))
            .collect();
        let order = plan_graph(&self.name, &nodes)?;
        debug!(pipeline = %self.name, tasks = self.tasks.len(), "built pipeline");

        Ok(Pipeline {
            name: self.name,
            description: self.description,
            defaults: self.defaults,
            tasks: self.tasks,
            order,
        })
    }
}

/// Validate a task graph given as `(id, dependencies)` pairs and return a
/// topological order of their indices.
///
/// Checks:
/// - Non-empty name and at least one task
/// - No empty or duplicate task IDs
/// - All dependency references point to existing tasks
/// - No cycles in the dependency graph
pub(crate) fn plan_graph(name: &str, nodes: &[(&str, &[String])]) -> Result<Vec<usize>> {
    if name.trim().is_empty() {
        return Err(PipelineError::InvalidPipeline(
            "Pipeline name cannot be empty".into(),
        ));
    }
    if nodes.is_empty() {
        return Err(PipelineError::InvalidPipeline(
            "Pipeline must have at least one task".into(),
        ));
    }

    let mut index = HashMap::new();
    for (i, (id, _)) in nodes.iter().enumerate() {
        if id.trim().is_empty() {
            return Err(PipelineError::InvalidPipeline(
                "Task ID cannot be empty".into(),
            ));
        }
        if index.insert(*id, i).is_some() {
            return Err(PipelineError::InvalidPipeline(format!(
                "Duplicate task ID: {}",
                id
            )));
        }
    }

    for (id, deps) in nodes {
        for dep in deps.iter() {
            if !index.contains_key(dep.as_str()) {
                return Err(PipelineError::InvalidPipeline(format!(
                    "Task '{}' depends on unknown task '{}'",
                    id, dep
                )));
            }
        }
    }

    topological_order(nodes, &index)
}

/// Kahn's algorithm; among ready tasks the earliest declared goes first.
fn topological_order(
    nodes: &[(&str, &[String])],
    index: &HashMap<&str, usize>,
) -> Result<Vec<usize>> {
    let n = nodes.len();
    let mut in_degree = vec![0usize; n];
    let mut adj: Vec<Vec<usize>> = vec![vec![]; n];

    for (idx, (_, deps)) in nodes.iter().enumerate() {
        for dep in deps.iter() {
            let dep_idx = index[dep.as_str()];
            adj[dep_idx].push(idx);
            in_degree[idx] += 1;
        }
    }

    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(node) = ready.pop_first() {
        order.push(node);
        for &neighbor in &adj[node] {
            in_degree[neighbor] -= 1;
            if in_degree[neighbor] == 0 {
                ready.insert(neighbor);
            }
        }
    }

    if order.len() != n {
        let stuck: Vec<&str> = (0..n)
            .filter(|&i| in_degree[i] > 0)
            .map(|i| nodes[i].0)
            .collect();
        return Err(PipelineError::InvalidPipeline(format!(
            "Cycle detected in task dependencies involving: {}",
            stuck.join(", ")
        )));
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::Marker;

    fn marker(id: &str) -> Marker {
        Marker::new(id).unwrap()
    }

    fn order(pipeline: &Pipeline) -> Vec<&str> {
        pipeline.execution_order().map(|t| t.id()).collect()
    }

    #[test]
    fn test_fan_out_fan_in_order() {
        let pipeline = Pipeline::builder("p")
            .task(marker("begin"), &[])
            .task(marker("b"), &["begin"])
            .task(marker("a"), &["begin"])
            .task(marker("end"), &["a", "b"])
            .build()
            .unwrap();
        assert_eq!(order(&pipeline), vec!["begin", "b", "a", "end"]);
    }

    #[test]
    fn test_declaration_order_does_not_need_to_be_topological() {
        let pipeline = Pipeline::builder("p")
            .task(marker("end"), &["begin"])
            .task(marker("begin"), &[])
            .build()
            .unwrap();
        assert_eq!(order(&pipeline), vec!["begin", "end"]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = Pipeline::builder("p")
            .task(marker("a"), &[])
            .task(marker("a"), &[])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate task ID: a"));
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let err = Pipeline::builder("p")
            .task(marker("a"), &["ghost"])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("unknown task 'ghost'"));
    }

    #[test]
    fn test_cycle_rejected() {
        let err = Pipeline::builder("p")
            .task(marker("a"), &["c"])
            .task(marker("b"), &["a"])
            .task(marker("c"), &["b"])
            .task(marker("free"), &[])
            .build()
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Cycle detected"));
        assert!(msg.contains("a, b, c"));
        assert!(!msg.contains("free"));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let err = Pipeline::builder("p").task(marker("a"), &["a"]).build().unwrap_err();
        assert!(err.to_string().contains("Cycle detected"));
    }

    #[test]
    fn test_empty_pipeline_rejected() {
        assert!(Pipeline::builder("p").build().is_err());
        assert!(Pipeline::builder(" ").task(marker("a"), &[]).build().is_err());
    }

    #[test]
    fn test_downstream_is_transitive() {
        let pipeline = Pipeline::builder("p")
            .task(marker("a"), &[])
            .task(marker("b"), &["a"])
            .task(marker("c"), &["b"])
            .task(marker("d"), &[])
            .build()
            .unwrap();
        let downstream = pipeline.downstream("a");
        assert_eq!(downstream.len(), 2);
        assert!(downstream.contains("b") && downstream.contains("c"));
        assert!(pipeline.downstream("d").is_empty());
    }
}
