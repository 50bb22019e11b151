//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use skydag_core::builder::{BuildConfig, BuildResult, ProgressReporter, build_workflow};
use skydag_core::naming::RunStamp;
use skydag_ephemeris::EphemerisDir;
use skydag_shared::{AppConfig, ValidationPolicy, init_config, load_config};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// SkyDAG — assemble batch workflows for patched sky searches.
#[derive(Parser)]
#[command(
    name = "skydag",
    version,
    about = "Turn a sky-patch catalog and search parameters into cluster workflow descriptors.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build the workflow DAG for a sky-patch catalog.
    Build {
        /// Sky-patch catalog file (one descriptor per line).
        listfile: PathBuf,

        /// GPS start time.
        #[arg(short, long, default_value_t = 0)]
        start: i64,

        /// GPS end time (exclusive).
        #[arg(short, long, default_value_t = 86_400)]
        end: i64,

        /// Instrument: H1, H2, L1, or G.
        #[arg(short, long, default_value = "H1")]
        instrument: String,

        /// Search start frequency in Hz.
        #[arg(short, long, default_value_t = 1200.0)]
        frequency: f64,

        /// Search bandwidth in Hz.
        #[arg(short, long, default_value_t = 1.0)]
        bandwidth: f64,

        /// Spindown range base.
        #[arg(short = 'd', long, default_value_t = 0.0)]
        spindown: f64,

        /// Spindown range width.
        #[arg(short = 'p', long, default_value_t = 0.0)]
        spindown_band: f64,

        /// Metric mode: 0 (disabled), 1 (Ptolemaic), or 2 (coherent).
        #[arg(short, long, default_value_t = 1)]
        metric: u8,

        /// Metric mismatch bound.
        #[arg(short = 'x', long, default_value_t = 0.02)]
        mismatch: f64,

        /// Detection threshold.
        #[arg(short, long, default_value_t = 10.0)]
        threshold: f64,

        /// First catalog index to use.
        #[arg(short, long, default_value_t = 0)]
        liststart: usize,

        /// Number of patches to use; -1 means all remaining.
        #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
        num: i64,

        /// Replica-location server for the gather stage.
        #[arg(short, long)]
        rls_server: Option<String>,

        /// Calibration type.
        #[arg(short, long)]
        calibration: Option<String>,

        /// Calibration version.
        #[arg(long)]
        calibration_version: Option<u32>,

        /// Shared storage root for the run directory.
        #[arg(long)]
        shared_dir: Option<PathBuf>,

        /// Ephemeris data directory.
        #[arg(long)]
        ephem_dir: Option<PathBuf>,

        /// Where descriptor files are written.
        #[arg(long, default_value = ".")]
        submit_dir: PathBuf,

        /// Fail on short catalog reads and geometry warnings instead of
        /// proceeding with a warning.
        #[arg(long)]
        strict: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

/// Option bag carried from the `build` subcommand into its handler.
struct BuildOpts {
    listfile: PathBuf,
    start: i64,
    end: i64,
    instrument: String,
    frequency: f64,
    bandwidth: f64,
    spindown: f64,
    spindown_band: f64,
    metric: u8,
    mismatch: f64,
    threshold: f64,
    liststart: usize,
    num: i64,
    rls_server: Option<String>,
    calibration: Option<String>,
    calibration_version: Option<u32>,
    shared_dir: Option<PathBuf>,
    ephem_dir: Option<PathBuf>,
    submit_dir: PathBuf,
    strict: bool,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "skydag=info",
        1 => "skydag=debug",
        _ => "skydag=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build {
            listfile,
            start,
            end,
            instrument,
            frequency,
            bandwidth,
            spindown,
            spindown_band,
            metric,
            mismatch,
            threshold,
            liststart,
            num,
            rls_server,
            calibration,
            calibration_version,
            shared_dir,
            ephem_dir,
            submit_dir,
            strict,
        } => cmd_build(BuildOpts {
            listfile,
            start,
            end,
            instrument,
            frequency,
            bandwidth,
            spindown,
            spindown_band,
            metric,
            mismatch,
            threshold,
            liststart,
            num,
            rls_server,
            calibration,
            calibration_version,
            shared_dir,
            ephem_dir,
            submit_dir,
            strict,
        }),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Build command
// ---------------------------------------------------------------------------

fn cmd_build(opts: BuildOpts) -> Result<()> {
    let config = load_config()?;

    // CLI flags override config-file values, which override built-ins.
    let shared_dir = opts
        .shared_dir
        .unwrap_or_else(|| PathBuf::from(&config.defaults.shared_dir));
    let ephemeris_dir = opts
        .ephem_dir
        .unwrap_or_else(|| PathBuf::from(&config.defaults.ephemeris_dir));
    let rls_server = opts
        .rls_server
        .unwrap_or_else(|| config.defaults.rls_server.clone());
    let calibration = opts
        .calibration
        .unwrap_or_else(|| config.defaults.calibration.clone());
    let calibration_version = opts
        .calibration_version
        .unwrap_or(config.defaults.calibration_version);

    let command_line = std::env::args().collect::<Vec<_>>().join(" ");

    let build_config = BuildConfig {
        catalog_path: opts.listfile,
        shared_dir,
        submit_dir: opts.submit_dir,
        ephemeris_dir,
        instrument: opts.instrument,
        gps_start: opts.start,
        gps_end: opts.end,
        frequency: opts.frequency,
        bandwidth: opts.bandwidth,
        spindown: opts.spindown,
        spindown_band: opts.spindown_band,
        metric_code: opts.metric,
        mismatch: opts.mismatch,
        threshold: opts.threshold,
        calibration,
        calibration_version,
        rls_server,
        list_start: opts.liststart,
        num: opts.num,
        policy: if opts.strict {
            ValidationPolicy::Strict
        } else {
            ValidationPolicy::BestEffort
        },
        stamp: RunStamp::now(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        command_line,
    };

    info!(
        catalog = %build_config.catalog_path.display(),
        instrument = %build_config.instrument,
        liststart = build_config.list_start,
        num = build_config.num,
        "building workflow"
    );

    let resolver = EphemerisDir::new(&build_config.ephemeris_dir);
    let reporter = CliProgress::new();

    let result = build_workflow(&build_config, &resolver, &reporter)?;

    // Print summary
    println!();
    println!("  Workflow descriptors written!");
    match result.first_index {
        Some(first) => println!(
            "  Jobs:    {} compute ({:06}..{:06})",
            result.compute_count,
            first,
            first + result.compute_count - 1
        ),
        None => println!("  Jobs:    no compute nodes (empty selection)"),
    }
    println!(
        "  Nodes:   {} ({} edges)",
        result.node_count, result.edge_count
    );
    println!("  Shared:  {}", build_config.shared_dir.display());
    println!("  Output:  {}", result.output_dir.display());
    println!("  DAG:     {}", result.dag_path.display());
    println!("  Time:    {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn node_built(&self, id: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Fanning out [{current}/{total}] node {id}"));
    }

    fn done(&self, _result: &BuildResult) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
