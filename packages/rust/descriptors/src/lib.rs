//! Scheduler descriptor text generation.
//!
//! Pure text, no I/O: one reusable submit descriptor per stage, plus the
//! top-level workflow descriptor wiring node identifiers to their stages,
//! macro bindings, pre-steps, and parent sets. The graph layer decides
//! where these land on disk.

// ---------------------------------------------------------------------------
// Submit descriptors
// ---------------------------------------------------------------------------

/// Input for one stage's submit descriptor.
#[derive(Debug, Clone)]
pub struct SubmitDescription {
    /// Scheduler universe (`vanilla`, `standard`).
    pub universe: String,
    /// Executable invoked by every node of the stage.
    pub executable: String,
    /// Rendered argument string, may reference `$(macro)` bindings.
    pub arguments: String,
    /// Shared scheduler log file.
    pub log: String,
    /// Stdout target, may reference `$(node)`.
    pub stdout: String,
    /// Stderr target, may reference `$(node)`.
    pub stderr: String,
}

/// Render a stage's submit descriptor.
pub fn generate_submit(desc: &SubmitDescription) -> String {
    let mut out = String::new();
    out.push_str(&format!("universe = {}\n", desc.universe));
    out.push_str(&format!("executable = {}\n", desc.executable));
    if !desc.arguments.is_empty() {
        out.push_str(&format!("arguments = {}\n", desc.arguments));
    }
    out.push_str(&format!("log = {}\n", desc.log));
    out.push_str(&format!("error = {}\n", desc.stderr));
    out.push_str(&format!("output = {}\n", desc.stdout));
    out.push_str("notification = never\n");
    out.push_str("queue 1\n");
    out
}

// ---------------------------------------------------------------------------
// Workflow descriptor
// ---------------------------------------------------------------------------

/// One node's entry in the workflow descriptor.
#[derive(Debug, Clone)]
pub struct DagNodeEntry {
    /// Unique node identifier.
    pub id: String,
    /// Submit descriptor file for the node's stage.
    pub submit_file: String,
    /// Macro bindings substituted into the stage's `$(...)` references.
    pub vars: Vec<(String, String)>,
    /// Script run by the scheduler before the node's main action.
    pub pre_step: Option<PreStepEntry>,
    /// Identifiers of the node's parents.
    pub parents: Vec<String>,
}

/// A pre-execution script attached to a node.
#[derive(Debug, Clone)]
pub struct PreStepEntry {
    pub script: String,
    pub args: Vec<String>,
}

/// Render the workflow descriptor.
///
/// Emits one `JOB` line per node (with its `SCRIPT PRE` and `VARS` lines)
/// in the given order, then the `PARENT ... CHILD ...` relation, one line
/// per node with parents. Output is byte-stable for a fixed input order.
pub fn generate_dag(nodes: &[DagNodeEntry]) -> String {
    let mut out = String::new();

    for node in nodes {
        out.push_str(&format!("JOB {} {}\n", node.id, node.submit_file));
        if let Some(pre) = &node.pre_step {
            out.push_str(&format!("SCRIPT PRE {} {}", node.id, pre.script));
            for arg in &pre.args {
                out.push_str(&format!(" {arg}"));
            }
            out.push('\n');
        }
        if !node.vars.is_empty() {
            out.push_str(&format!("VARS {}", node.id));
            for (key, value) in &node.vars {
                out.push_str(&format!(" {key}=\"{}\"", escape_var(value)));
            }
            out.push('\n');
        }
    }

    for node in nodes {
        if node.parents.is_empty() {
            continue;
        }
        out.push_str(&format!(
            "PARENT {} CHILD {}\n",
            node.parents.join(" "),
            node.id
        ));
    }

    out
}

/// Escape a macro value for a double-quoted VARS assignment.
fn escape_var(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
