//! End-to-end workflow build: parameters → epoch → catalog → graph → descriptors.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, instrument, warn};

use skydag_catalog::PatchCatalog;
use skydag_ephemeris::EpochResolver;
use skydag_shared::{
    Instrument, MetricMode, Result, SearchParameters, SkyDagError, ValidationPolicy,
};

use crate::graph::{JobNode, WorkflowGraph};
use crate::naming::{NamingScheme, RunStamp};
use crate::stage::{StageTemplate, Universe};

/// Workflow descriptor filename, written to the submit directory.
pub const DAG_FILE: &str = "ClusterComputeF.dag";
/// Scheduler log shared by every stage.
pub const LOG_FILE: &str = "ClusterComputeF.log";
/// Raw-data file list produced by the metadata-query stage.
pub const SFT_LIST_FILE: &str = "sftList.txt";
/// Local raw-data paths produced by the gather stage.
pub const SFT_PATH_FILE: &str = "sftPath.txt";

const QUERY_EXECUTABLE: &str = "lalapps_QueryMetadataLFN";
const GATHER_EXECUTABLE: &str = "lalapps_GatherLFN";
const EXTRACT_EXECUTABLE: &str = "narrowBandExtract";
const COMPUTE_EXECUTABLE: &str = "FrComputeFStatistic";

/// Configuration for one workflow build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Sky-patch catalog file.
    pub catalog_path: PathBuf,
    /// Shared filesystem root the run directory is created under.
    pub shared_dir: PathBuf,
    /// Where descriptor files are written.
    pub submit_dir: PathBuf,
    /// Directory holding the ephemeris data files.
    pub ephemeris_dir: PathBuf,
    /// Instrument name (H1, H2, L1, G).
    pub instrument: String,
    /// GPS window start (inclusive).
    pub gps_start: i64,
    /// GPS window end (exclusive).
    pub gps_end: i64,
    /// Search start frequency in Hz.
    pub frequency: f64,
    /// Search bandwidth in Hz.
    pub bandwidth: f64,
    /// Spindown range base.
    pub spindown: f64,
    /// Spindown range width.
    pub spindown_band: f64,
    /// Metric-computation mode code (0, 1, or 2).
    pub metric_code: u8,
    /// Metric mismatch bound.
    pub mismatch: f64,
    /// Detection threshold.
    pub threshold: f64,
    /// Calibration type.
    pub calibration: String,
    /// Calibration version.
    pub calibration_version: u32,
    /// Replica-location server the gather stage queries.
    pub rls_server: String,
    /// First catalog index to select.
    pub list_start: usize,
    /// Number of patches to select; negative means all remaining.
    pub num: i64,
    /// Handling of recoverable catalog conditions.
    pub policy: ValidationPolicy,
    /// Run identity for output naming.
    pub stamp: RunStamp,
    /// Tool version written to the provenance stamp.
    pub tool_version: String,
    /// Verbatim invocation written to the provenance stamp.
    pub command_line: String,
}

/// Result of a workflow build.
#[derive(Debug)]
pub struct BuildResult {
    /// Timestamped run directory on shared storage.
    pub output_dir: PathBuf,
    /// Workflow descriptor path.
    pub dag_path: PathBuf,
    /// Stage submit descriptor paths.
    pub submit_paths: Vec<PathBuf>,
    /// Total nodes in the graph.
    pub node_count: usize,
    /// Total dependency edges.
    pub edge_count: usize,
    /// Compute nodes fanned out.
    pub compute_count: usize,
    /// Catalog index of the first compute node, if any were selected.
    pub first_index: Option<usize>,
    /// Total elapsed time.
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting build status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a compute node is added during fan-out.
    fn node_built(&self, id: &str, current: usize, total: usize);
    /// Called when the build completes.
    fn done(&self, result: &BuildResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn node_built(&self, _id: &str, _current: usize, _total: usize) {}
    fn done(&self, _result: &BuildResult) {}
}

/// Build and serialize the full workflow.
///
/// 1. Validate search parameters
/// 2. Resolve the ephemeris epoch
/// 3. Read and check the patch catalog
/// 4. Create the run directory, write provenance
/// 5. Wire the stage spine and fan out compute nodes
/// 6. Serialize descriptors
///
/// Every precondition is checked before step 4, so a failed build leaves
/// no run directory behind.
#[instrument(skip_all, fields(catalog = %config.catalog_path.display(), instrument = %config.instrument))]
pub fn build_workflow(
    config: &BuildConfig,
    epochs: &dyn EpochResolver,
    progress: &dyn ProgressReporter,
) -> Result<BuildResult> {
    let start = Instant::now();

    info!(
        gps_start = config.gps_start,
        gps_end = config.gps_end,
        frequency = config.frequency,
        bandwidth = config.bandwidth,
        "starting workflow build"
    );

    // --- Phase 1: Validate parameters ---
    progress.phase("Validating search parameters");
    let instrument: Instrument = config.instrument.parse()?;
    let metric = MetricMode::from_code(config.metric_code)?;
    if config.gps_end <= config.gps_start {
        return Err(SkyDagError::config(format!(
            "empty GPS window: end {} must be after start {}",
            config.gps_end, config.gps_start
        )));
    }

    // --- Phase 2: Resolve ephemeris epoch ---
    progress.phase("Resolving ephemeris epoch");
    let epoch = epochs
        .resolve(config.gps_start, config.gps_end)?
        .ok_or_else(|| {
            SkyDagError::Ephemeris(format!(
                "no ephemerides covering GPS times {}-{}",
                config.gps_start, config.gps_end
            ))
        })?;

    let params = SearchParameters {
        instrument,
        gps_start: config.gps_start,
        gps_end: config.gps_end,
        frequency: config.frequency,
        bandwidth: config.bandwidth,
        spindown: config.spindown,
        spindown_band: config.spindown_band,
        metric,
        mismatch: config.mismatch,
        threshold: config.threshold,
        calibration: config.calibration.clone(),
        calibration_version: config.calibration_version,
        epoch,
    };

    // --- Phase 3: Read patch catalog ---
    progress.phase("Reading patch catalog");
    let limit = (config.num >= 0).then_some(config.num as usize);
    let catalog = PatchCatalog::read(&config.catalog_path, config.list_start, limit)?;

    if let Some(requested) = limit {
        if catalog.len() < requested {
            let message = format!(
                "only {} patches read ({} requested)",
                catalog.len(),
                requested
            );
            match config.policy {
                ValidationPolicy::Strict => return Err(SkyDagError::validation(message)),
                ValidationPolicy::BestEffort => warn!("{message} -- continuing anyway"),
            }
        }
    }

    let warnings = catalog.check();
    if !warnings.is_empty() {
        match config.policy {
            ValidationPolicy::Strict => {
                return Err(SkyDagError::validation(format!(
                    "{} patch geometry problems, first: {}",
                    warnings.len(),
                    warnings[0]
                )));
            }
            ValidationPolicy::BestEffort => {
                for warning in &warnings {
                    warn!(%warning, "patch geometry problem -- continuing anyway");
                }
            }
        }
    }

    if catalog.is_empty() {
        warn!("no patches selected; workflow will carry no compute nodes");
    }

    // --- Phase 4: Create run directory, write provenance ---
    progress.phase("Preparing output directory");
    let naming = NamingScheme::new(&config.shared_dir, config.stamp);
    let output_dir = naming.create_output_dir()?;
    write_provenance(&output_dir, &config.command_line, &config.tool_version)?;

    // --- Phase 5: Wire stages and nodes ---
    progress.phase("Assembling workflow graph");
    let mut graph = WorkflowGraph::new(DAG_FILE, LOG_FILE);

    let query = graph.add_stage(query_stage(&params, &output_dir));
    let gather = graph.add_stage(gather_stage(config, &output_dir));
    let extract = graph.add_stage(extract_stage(&params, &naming));
    let compute = graph.add_stage(compute_stage(config, &params, &naming));

    let query_node = graph.add_node(JobNode::new(QUERY_EXECUTABLE, query));
    let gather_node = graph.add_node(JobNode::new(GATHER_EXECUTABLE, gather));

    let mut extract_job = JobNode::new(EXTRACT_EXECUTABLE, extract);
    extract_job.set_pre_step(
        "/bin/cp",
        vec![
            config.catalog_path.display().to_string(),
            output_dir.display().to_string(),
        ],
    );
    let extract_node = graph.add_node(extract_job);

    graph.add_dependency(query_node, gather_node);
    graph.add_dependency(gather_node, extract_node);

    let total = catalog.len();
    for (i, patch) in catalog.patches().iter().enumerate() {
        let id = format!("{:06}", patch.index);
        let mut node = JobNode::new(&id, compute);
        node.set_var("node", &id);
        node.set_var("patch", &patch.descriptor);
        let index = graph.add_node(node);
        graph.add_dependency(extract_node, index);
        progress.node_built(&id, i + 1, total);
    }

    // --- Phase 6: Serialize descriptors ---
    progress.phase("Writing descriptors");
    let written = graph.serialize(&config.submit_dir)?;

    let result = BuildResult {
        output_dir,
        dag_path: written.dag_path,
        submit_paths: written.submit_paths,
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        compute_count: catalog.len(),
        first_index: catalog.patches().first().map(|p| p.index),
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        nodes = result.node_count,
        edges = result.edge_count,
        compute = result.compute_count,
        elapsed_ms = result.elapsed.as_millis(),
        "workflow build complete"
    );

    Ok(result)
}

// ---------------------------------------------------------------------------
// Stage construction
// ---------------------------------------------------------------------------

fn query_stage(params: &SearchParameters, output_dir: &Path) -> StageTemplate {
    let mut stage = StageTemplate::new("metadata-query", Universe::Vanilla, QUERY_EXECUTABLE);
    stage.set_option("calibration", params.calibration.clone());
    stage.set_option("calibration-version", params.calibration_version.to_string());
    stage.set_option("instrument", params.instrument.to_string());
    stage.set_option("gps-start-time", params.gps_start.to_string());
    stage.set_option("gps-end-time", params.gps_end.to_string());
    stage.set_option("output", output_dir.join(SFT_LIST_FILE).display().to_string());
    stage.set_stdout(format!("{}/{}.out", output_dir.display(), QUERY_EXECUTABLE));
    stage.set_stderr(format!("{}/{}.err", output_dir.display(), QUERY_EXECUTABLE));
    stage
}

fn gather_stage(config: &BuildConfig, output_dir: &Path) -> StageTemplate {
    let mut stage = StageTemplate::new("gather", Universe::Vanilla, GATHER_EXECUTABLE);
    stage.set_option("input", output_dir.join(SFT_LIST_FILE).display().to_string());
    stage.set_option("output", output_dir.join(SFT_PATH_FILE).display().to_string());
    stage.set_option("server", config.rls_server.clone());
    stage.set_option("bucket", config.shared_dir.display().to_string());
    stage.set_stdout(format!("{}/{}.out", output_dir.display(), GATHER_EXECUTABLE));
    stage.set_stderr(format!("{}/{}.err", output_dir.display(), GATHER_EXECUTABLE));
    stage
}

fn extract_stage(params: &SearchParameters, naming: &NamingScheme) -> StageTemplate {
    let output_dir = naming.output_dir();
    let mut stage = StageTemplate::new("narrowband-extract", Universe::Standard, EXTRACT_EXECUTABLE);
    stage.set_option("frequency", format!("{:.6}", params.frequency));
    stage.set_option("bandwidth", format!("{:.6}", params.bandwidth));
    stage.set_option("input", output_dir.join(SFT_PATH_FILE).display().to_string());
    stage.set_option("output", naming.narrowband_path(params).display().to_string());
    stage.set_stdout(format!("{}/{}.out", output_dir.display(), EXTRACT_EXECUTABLE));
    stage.set_stderr(format!("{}/{}.err", output_dir.display(), EXTRACT_EXECUTABLE));
    stage
}

/// The fan-out stage. Per-node values come in through the `node` and
/// `patch` macros; everything else is fixed across all instances.
fn compute_stage(
    config: &BuildConfig,
    params: &SearchParameters,
    naming: &NamingScheme,
) -> StageTemplate {
    let output_dir = naming.output_dir();
    let mut stage = StageTemplate::new("compute", Universe::Standard, COMPUTE_EXECUTABLE);
    stage.set_short_option("I", params.instrument.code().to_string());
    stage.set_short_option("f", format!("{:.6}", params.frequency));
    stage.set_short_option("b", format!("{:.6}", params.bandwidth));
    stage.set_short_option("s", format!("{:.6}", params.spindown));
    stage.set_short_option("m", format!("{:.6}", params.spindown_band));
    stage.set_short_option("M", params.metric.code().to_string());
    stage.set_short_option("X", format!("{:.6}", params.mismatch));
    stage.set_short_option("F", format!("{:.6}", params.threshold));
    stage.set_short_option("i", naming.narrowband_path(params).display().to_string());
    stage.set_short_option("E", config.ephemeris_dir.display().to_string());
    stage.set_short_option("y", params.epoch.clone());
    stage.set_short_option("o", format!("{}/$(node)_", output_dir.display()));
    stage.set_var_arg("patch");
    stage.set_stdout(format!("{}/$(node).out", output_dir.display()));
    stage.set_stderr(format!("{}/$(node).err", output_dir.display()));
    stage
}

fn write_provenance(output_dir: &Path, command_line: &str, tool_version: &str) -> Result<()> {
    let command_path = output_dir.join("command");
    std::fs::write(&command_path, format!("{command_line}\n"))
        .map_err(|e| SkyDagError::io(&command_path, e))?;
    let version_path = output_dir.join("version");
    std::fs::write(&version_path, format!("{tool_version}\n"))
        .map_err(|e| SkyDagError::io(&version_path, e))?;
    Ok(())
}
