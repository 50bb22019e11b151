//! The workflow graph: job nodes, dependency edges, and serialization
//! into DAGMan descriptor files.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use petgraph::Direction;
use petgraph::algo::is_cyclic_directed;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use tracing::info;

use skydag_descriptors::{DagNodeEntry, PreStepEntry, generate_dag, generate_submit};
use skydag_shared::{Result, SkyDagError};

use crate::stage::{OptionMap, StageTemplate};

/// Handle to a stage registered on a [`WorkflowGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageId(usize);

/// A script DAGMan runs before the node's job is submitted.
#[derive(Debug, Clone)]
pub struct PreStep {
    pub script: String,
    pub args: Vec<String>,
}

// ---------------------------------------------------------------------------
// Job node
// ---------------------------------------------------------------------------

/// One schedulable job: a stage plus its per-node macro bindings.
#[derive(Debug, Clone)]
pub struct JobNode {
    id: String,
    stage: StageId,
    vars: OptionMap,
    pre_step: Option<PreStep>,
}

impl JobNode {
    pub fn new(id: impl Into<String>, stage: StageId) -> Self {
        Self {
            id: id.into(),
            stage,
            vars: OptionMap::new(),
            pre_step: None,
        }
    }

    /// Bind a DAGMan VARS macro for this node.
    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.set(key, value);
    }

    pub fn set_pre_step(&mut self, script: impl Into<String>, args: Vec<String>) {
        self.pre_step = Some(PreStep {
            script: script.into(),
            args,
        });
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn stage(&self) -> StageId {
        self.stage
    }

    pub fn vars(&self) -> &OptionMap {
        &self.vars
    }

    pub fn pre_step(&self) -> Option<&PreStep> {
        self.pre_step.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Workflow graph
// ---------------------------------------------------------------------------

/// Paths produced by [`WorkflowGraph::serialize`].
#[derive(Debug, Clone)]
pub struct SerializedWorkflow {
    pub dag_path: PathBuf,
    pub submit_paths: Vec<PathBuf>,
}

/// Directed acyclic graph of batch jobs, ready to serialize.
#[derive(Debug)]
pub struct WorkflowGraph {
    dag_file: String,
    log_file: String,
    stages: Vec<StageTemplate>,
    graph: StableDiGraph<JobNode, ()>,
}

impl WorkflowGraph {
    pub fn new(dag_file: impl Into<String>, log_file: impl Into<String>) -> Self {
        Self {
            dag_file: dag_file.into(),
            log_file: log_file.into(),
            stages: Vec::new(),
            graph: StableDiGraph::new(),
        }
    }

    pub fn add_stage(&mut self, stage: StageTemplate) -> StageId {
        self.stages.push(stage);
        StageId(self.stages.len() - 1)
    }

    pub fn stage(&self, id: StageId) -> &StageTemplate {
        &self.stages[id.0]
    }

    pub fn add_node(&mut self, node: JobNode) -> NodeIndex {
        self.graph.add_node(node)
    }

    /// Require `parent` to finish before `child` starts.
    pub fn add_dependency(&mut self, parent: NodeIndex, child: NodeIndex) {
        self.graph.add_edge(parent, child, ());
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Ids of the node's parents, in the order the parents were added to
    /// the graph.
    pub fn parent_ids(&self, node: NodeIndex) -> Vec<String> {
        let mut parents: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .collect();
        parents.sort();
        parents
            .into_iter()
            .map(|idx| self.graph[idx].id().to_string())
            .collect()
    }

    /// Check the graph is well-formed: node ids unique, no cycles.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for idx in self.graph.node_indices() {
            let id = self.graph[idx].id();
            if !seen.insert(id) {
                return Err(SkyDagError::Graph(format!("duplicate node id '{id}'")));
            }
        }
        if is_cyclic_directed(&self.graph) {
            return Err(SkyDagError::Graph(
                "dependency cycle detected".to_string(),
            ));
        }
        Ok(())
    }

    /// Write every stage's submit file and the DAG file into `submit_dir`.
    ///
    /// Files are written atomically (temp file then rename) so a crash
    /// mid-write never leaves a truncated descriptor behind.
    pub fn serialize(&self, submit_dir: &Path) -> Result<SerializedWorkflow> {
        self.validate()?;

        let mut submit_paths = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            let path = submit_dir.join(stage.submit_file());
            let contents = generate_submit(&stage.submit_description(&self.log_file));
            write_atomic(&path, &contents)?;
            submit_paths.push(path);
        }

        let entries: Vec<DagNodeEntry> = self
            .graph
            .node_indices()
            .map(|idx| {
                let node = &self.graph[idx];
                DagNodeEntry {
                    id: node.id().to_string(),
                    submit_file: self.stage(node.stage()).submit_file().to_string(),
                    vars: node
                        .vars()
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                    pre_step: node.pre_step().map(|pre| PreStepEntry {
                        script: pre.script.clone(),
                        args: pre.args.clone(),
                    }),
                    parents: self.parent_ids(idx),
                }
            })
            .collect();

        let dag_path = submit_dir.join(&self.dag_file);
        write_atomic(&dag_path, &generate_dag(&entries))?;

        info!(
            dag = %dag_path.display(),
            submits = submit_paths.len(),
            nodes = self.node_count(),
            "serialized workflow descriptors"
        );

        Ok(SerializedWorkflow {
            dag_path,
            submit_paths,
        })
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| SkyDagError::config(format!("invalid descriptor path {path:?}")))?;
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&tmp, contents).map_err(|e| SkyDagError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| SkyDagError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::stage::Universe;

    use super::*;

    fn two_stage_graph() -> (WorkflowGraph, NodeIndex, NodeIndex, NodeIndex) {
        let mut graph = WorkflowGraph::new("test.dag", "test.log");
        let extract = graph.add_stage(StageTemplate::new(
            "extract",
            Universe::Vanilla,
            "narrowBandExtract",
        ));
        let compute = graph.add_stage(StageTemplate::new(
            "compute",
            Universe::Standard,
            "FrComputeFStatistic",
        ));

        let root = graph.add_node(JobNode::new("narrowBandExtract", extract));
        let mut a = JobNode::new("000000", compute);
        a.set_var("patch", "-a 1.0 -d 0.5");
        let a = graph.add_node(a);
        let b = graph.add_node(JobNode::new("000001", compute));
        graph.add_dependency(root, a);
        graph.add_dependency(root, b);
        (graph, root, a, b)
    }

    #[test]
    fn counts_track_nodes_and_edges() {
        let (graph, _, _, _) = two_stage_graph();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn parent_ids_sorted_by_insertion() {
        let mut graph = WorkflowGraph::new("test.dag", "test.log");
        let stage = graph.add_stage(StageTemplate::new("s", Universe::Vanilla, "exe"));
        let first = graph.add_node(JobNode::new("first", stage));
        let second = graph.add_node(JobNode::new("second", stage));
        let sink = graph.add_node(JobNode::new("sink", stage));
        // Edges added in reverse of node order; ids still come back sorted.
        graph.add_dependency(second, sink);
        graph.add_dependency(first, sink);
        assert_eq!(graph.parent_ids(sink), vec!["first", "second"]);
    }

    #[test]
    fn validate_rejects_duplicate_ids() {
        let mut graph = WorkflowGraph::new("test.dag", "test.log");
        let stage = graph.add_stage(StageTemplate::new("s", Universe::Vanilla, "exe"));
        graph.add_node(JobNode::new("000000", stage));
        graph.add_node(JobNode::new("000000", stage));
        let err = graph.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate node id"));
    }

    #[test]
    fn validate_rejects_cycles() {
        let mut graph = WorkflowGraph::new("test.dag", "test.log");
        let stage = graph.add_stage(StageTemplate::new("s", Universe::Vanilla, "exe"));
        let a = graph.add_node(JobNode::new("a", stage));
        let b = graph.add_node(JobNode::new("b", stage));
        graph.add_dependency(a, b);
        graph.add_dependency(b, a);
        let err = graph.validate().unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn serialize_writes_dag_and_submits() {
        let tmp = tempfile::tempdir().unwrap();
        let (graph, _, _, _) = two_stage_graph();
        let written = graph.serialize(tmp.path()).unwrap();

        assert_eq!(written.dag_path, tmp.path().join("test.dag"));
        assert_eq!(written.submit_paths.len(), 2);
        for path in &written.submit_paths {
            assert!(path.is_file(), "missing submit file {path:?}");
        }

        let dag = std::fs::read_to_string(&written.dag_path).unwrap();
        assert!(dag.contains("JOB narrowBandExtract narrowBandExtract.sub"));
        assert!(dag.contains("JOB 000000 FrComputeFStatistic.sub"));
        assert!(dag.contains("VARS 000000 patch=\"-a 1.0 -d 0.5\""));
        assert!(dag.contains("PARENT narrowBandExtract CHILD 000000"));
        assert!(dag.contains("PARENT narrowBandExtract CHILD 000001"));
    }

    #[test]
    fn serialize_leaves_no_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let (graph, _, _, _) = two_stage_graph();
        graph.serialize(tmp.path()).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "stray temp files: {leftovers:?}");
    }

    #[test]
    fn serialize_is_byte_reproducible() {
        let (graph, _, _, _) = two_stage_graph();
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let out_a = graph.serialize(dir_a.path()).unwrap();
        let out_b = graph.serialize(dir_b.path()).unwrap();

        let dag_a = std::fs::read(&out_a.dag_path).unwrap();
        let dag_b = std::fs::read(&out_b.dag_path).unwrap();
        assert_eq!(dag_a, dag_b);

        for (a, b) in out_a.submit_paths.iter().zip(&out_b.submit_paths) {
            assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
        }
    }
}
