//! Validated stage dependency graph and topological execution planning.
//!
//! Stages form a directed acyclic graph with two edge kinds: a *prerequisite*
//! edge gates execution (upstream failure blocks the dependent), an
//! *always-after* edge only orders it (the dependent runs once the upstream
//! reaches any terminal outcome). Both edge kinds participate in ordering,
//! so the combined relation must be acyclic.
//!
//! Topological ordering is computed via Kahn's algorithm. Ties between
//! simultaneously-ready stages are broken by declaration order, which keeps
//! runs reproducible.

use std::collections::HashMap;

use crate::error::{GraphError, GraphResult};
use crate::stage::StageSpec;

/// Validated, immutable graph over stage definitions.
///
/// Construction performs all validation; a constructed graph can always be
/// scheduled.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    /// Stages in declaration order.
    stages: Vec<StageSpec>,
    /// Stage id → declaration index.
    index: HashMap<String, usize>,
    /// Combined ordering edges, `upstream index → downstream indices`.
    downstream: Vec<Vec<usize>>,
    /// Hard prerequisite edges, `dependent index → prerequisite indices`.
    hard_upstream: Vec<Vec<usize>>,
    /// Topological position of each stage, precomputed at construction.
    topo_order: Vec<usize>,
    /// Kahn level of each stage (distance from the graph roots).
    level: Vec<usize>,
}

impl TaskGraph {
    /// Build and validate a graph from stage definitions.
    ///
    /// Fails with [`GraphError::DuplicateStage`] on a repeated id,
    /// [`GraphError::UnknownStage`] when an edge references an undeclared id,
    /// and [`GraphError::CycleDetected`] when the ordering relation is not a
    /// DAG. No stage runs if any of these fire.
    pub fn new(stages: Vec<StageSpec>) -> GraphResult<Self> {
        let mut index = HashMap::with_capacity(stages.len());
        for (i, stage) in stages.iter().enumerate() {
            if index.insert(stage.id.clone(), i).is_some() {
                return Err(GraphError::DuplicateStage {
                    stage: stage.id.clone(),
                });
            }
        }

        let n = stages.len();
        let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut hard_upstream: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (i, stage) in stages.iter().enumerate() {
            for prereq in &stage.prerequisites {
                let p = *index.get(prereq).ok_or_else(|| GraphError::UnknownStage {
                    stage: prereq.clone(),
                    referenced_by: stage.id.clone(),
                })?;
                downstream[p].push(i);
                hard_upstream[i].push(p);
            }
            for upstream in &stage.always_after {
                let u = *index.get(upstream).ok_or_else(|| GraphError::UnknownStage {
                    stage: upstream.clone(),
                    referenced_by: stage.id.clone(),
                })?;
                downstream[u].push(i);
            }
        }

        let (topo_order, level) = kahn_order(&stages, &downstream)?;

        Ok(Self {
            stages,
            index,
            downstream,
            hard_upstream,
            topo_order,
            level,
        })
    }

    /// Number of declared stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the graph has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// All stages in declaration order.
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Look up a stage by id.
    pub fn stage(&self, id: &str) -> Option<&StageSpec> {
        self.index.get(id).map(|&i| &self.stages[i])
    }

    /// Stages in deterministic topological order.
    pub fn topological_order(&self) -> Vec<&StageSpec> {
        self.topo_order.iter().map(|&i| &self.stages[i]).collect()
    }

    /// Hard prerequisites of `id`, in declaration order.
    pub fn hard_prerequisites_of(&self, id: &str) -> Vec<&StageSpec> {
        match self.index.get(id) {
            Some(&i) => {
                let mut ups = self.hard_upstream[i].clone();
                ups.sort_unstable();
                ups.into_iter().map(|p| &self.stages[p]).collect()
            }
            None => Vec::new(),
        }
    }

    /// Direct downstream stages of `id` (either edge kind).
    pub fn dependents_of(&self, id: &str) -> Vec<&StageSpec> {
        match self.index.get(id) {
            Some(&i) => {
                let mut downs = self.downstream[i].clone();
                downs.sort_unstable();
                downs.dedup();
                downs.into_iter().map(|d| &self.stages[d]).collect()
            }
            None => Vec::new(),
        }
    }

    /// Partition the topological order into execution waves.
    ///
    /// Stages in one wave share a Kahn level, so no path connects any two of
    /// them; a runner may execute a wave's stages concurrently without
    /// changing the observable verdict. Within a wave, stages appear in
    /// declaration order.
    pub fn waves(&self) -> Vec<Vec<&StageSpec>> {
        let mut by_level: Vec<Vec<usize>> = Vec::new();
        for &i in &self.topo_order {
            let level = self.level[i];
            if level >= by_level.len() {
                by_level.resize_with(level + 1, Vec::new);
            }
            by_level[level].push(i);
        }
        by_level
            .into_iter()
            .map(|mut wave| {
                wave.sort_unstable();
                wave.into_iter().map(|i| &self.stages[i]).collect()
            })
            .collect()
    }
}

/// Kahn's algorithm over the combined ordering edges.
///
/// Returns the topological order (declaration-order tie-break) and the level
/// of each node. Fails with the ids of the stages left unordered when a
/// cycle is present.
fn kahn_order(
    stages: &[StageSpec],
    downstream: &[Vec<usize>],
) -> GraphResult<(Vec<usize>, Vec<usize>)> {
    let n = stages.len();
    let mut in_degree = vec![0usize; n];
    for edges in downstream {
        for &d in edges {
            in_degree[d] += 1;
        }
    }

    let mut ready: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    ready.sort_unstable();

    let mut level = vec![0usize; n];
    let mut order = Vec::with_capacity(n);

    while !ready.is_empty() {
        let i = ready.remove(0);
        order.push(i);
        for &d in &downstream[i] {
            in_degree[d] -= 1;
            level[d] = level[d].max(level[i] + 1);
            if in_degree[d] == 0 {
                // Keep the ready set sorted so ties resolve by declaration
                // order.
                let pos = ready.binary_search(&d).unwrap_or_else(|p| p);
                ready.insert(pos, d);
            }
        }
    }

    if order.len() != n {
        let stuck: Vec<String> = (0..n)
            .filter(|&i| in_degree[i] > 0)
            .map(|i| stages[i].id.clone())
            .collect();
        return Err(GraphError::CycleDetected { stages: stuck });
    }

    Ok((order, level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{StageKind, StageSpec, ToolConfig};

    fn stage(id: &str) -> StageSpec {
        StageSpec::custom(id, StageKind::Test, ToolConfig::new("noop", ["true"], 60))
    }

    fn verification_chain() -> Vec<StageSpec> {
        vec![
            stage("compile"),
            stage("test").requires("compile"),
            stage("coverage").follows("test"),
        ]
    }

    #[test]
    fn test_topological_order_respects_prerequisites() {
        let graph = TaskGraph::new(verification_chain()).unwrap();
        let order: Vec<&str> = graph
            .topological_order()
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        let compile = order.iter().position(|&x| x == "compile").unwrap();
        let test = order.iter().position(|&x| x == "test").unwrap();
        let coverage = order.iter().position(|&x| x == "coverage").unwrap();
        assert!(compile < test, "compile must come before test");
        assert!(test < coverage, "test must come before coverage");
    }

    #[test]
    fn test_ties_break_by_declaration_order() {
        // style and bug_check are both ready after compile; style is
        // declared first and must stay first.
        let graph = TaskGraph::new(vec![
            stage("compile"),
            stage("style").requires("compile"),
            stage("bug_check").requires("compile"),
        ])
        .unwrap();
        let order: Vec<&str> = graph
            .topological_order()
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(order, vec!["compile", "style", "bug_check"]);
    }

    #[test]
    fn test_cycle_detection_rejects_mutual_prerequisites() {
        let result = TaskGraph::new(vec![
            stage("a").requires("b"),
            stage("b").requires("a"),
        ]);
        assert!(matches!(result, Err(GraphError::CycleDetected { .. })));
    }

    #[test]
    fn test_cycle_through_always_after_is_rejected() {
        // No schedule exists for this graph even though the prerequisite
        // relation alone is acyclic.
        let result = TaskGraph::new(vec![
            stage("a").follows("b"),
            stage("b").requires("a"),
        ]);
        assert!(matches!(result, Err(GraphError::CycleDetected { .. })));
    }

    #[test]
    fn test_cycle_error_names_participants() {
        let err = TaskGraph::new(vec![
            stage("compile"),
            stage("a").requires("b").requires("compile"),
            stage("b").requires("a"),
        ])
        .unwrap_err();
        match err {
            GraphError::CycleDetected { stages } => {
                assert!(stages.contains(&"a".to_string()));
                assert!(stages.contains(&"b".to_string()));
                assert!(!stages.contains(&"compile".to_string()));
            }
            other => panic!("expected CycleDetected, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_prerequisite_is_rejected() {
        let result = TaskGraph::new(vec![stage("coverage").requires("missing")]);
        match result {
            Err(GraphError::UnknownStage {
                stage,
                referenced_by,
            }) => {
                assert_eq!(stage, "missing");
                assert_eq!(referenced_by, "coverage");
            }
            other => panic!("expected UnknownStage, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_always_after_is_rejected() {
        let result = TaskGraph::new(vec![stage("coverage").follows("missing")]);
        assert!(matches!(result, Err(GraphError::UnknownStage { .. })));
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let result = TaskGraph::new(vec![stage("compile"), stage("compile")]);
        assert!(matches!(result, Err(GraphError::DuplicateStage { .. })));
    }

    #[test]
    fn test_waves_group_independent_stages() {
        let graph = TaskGraph::new(vec![
            stage("compile"),
            stage("style").requires("compile"),
            stage("bug_check").requires("compile"),
            stage("test").requires("compile"),
            stage("coverage").follows("test"),
        ])
        .unwrap();
        let waves: Vec<Vec<&str>> = graph
            .waves()
            .iter()
            .map(|w| w.iter().map(|s| s.id.as_str()).collect())
            .collect();
        assert_eq!(
            waves,
            vec![
                vec!["compile"],
                vec!["style", "bug_check", "test"],
                vec!["coverage"],
            ]
        );
    }

    #[test]
    fn test_diamond_graph_resolves() {
        let graph = TaskGraph::new(vec![
            stage("a"),
            stage("b").requires("a"),
            stage("c").requires("a"),
            stage("d").requires("b").requires("c"),
        ])
        .unwrap();
        let order: Vec<&str> = graph
            .topological_order()
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(order.first(), Some(&"a"));
        assert_eq!(order.last(), Some(&"d"));
    }

    #[test]
    fn test_hard_prerequisites_exclude_always_after() {
        let graph = TaskGraph::new(verification_chain()).unwrap();
        let prereqs = graph.hard_prerequisites_of("coverage");
        assert!(prereqs.is_empty(), "always-after must not gate");
        let prereqs = graph.hard_prerequisites_of("test");
        assert_eq!(prereqs.len(), 1);
        assert_eq!(prereqs[0].id, "compile");
    }

    #[test]
    fn test_empty_graph_is_valid() {
        let graph = TaskGraph::new(Vec::new()).unwrap();
        assert!(graph.is_empty());
        assert!(graph.waves().is_empty());
    }

    #[test]
    fn test_dependents_of_covers_both_edge_kinds() {
        let graph = TaskGraph::new(verification_chain()).unwrap();
        let deps: Vec<&str> = graph
            .dependents_of("test")
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(deps, vec!["coverage"]);
    }
}
