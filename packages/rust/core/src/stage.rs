//! Stage templates: one per batch executable in the pipeline.
//!
//! A stage owns the fixed command-line bindings shared by every node
//! submitted against it, plus the submit-file boilerplate (universe,
//! stdio redirection). Per-node values are deferred to DAG macros.

use std::fmt;

use skydag_descriptors::SubmitDescription;

// ---------------------------------------------------------------------------
// Option map
// ---------------------------------------------------------------------------

/// An ordered key/value map for command-line option bindings.
///
/// Insertion order is the rendering order; re-binding a key overwrites the
/// value in place without moving it, so a stage's argument string stays
/// stable as defaults get refined.
#[derive(Debug, Clone, Default)]
pub struct OptionMap {
    entries: Vec<(String, String)>,
}

impl OptionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key` to `value`. An existing binding keeps its position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Stage template
// ---------------------------------------------------------------------------

/// Condor universe a stage runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Universe {
    #[default]
    Vanilla,
    Standard,
}

impl fmt::Display for Universe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Universe::Vanilla => write!(f, "vanilla"),
            Universe::Standard => write!(f, "standard"),
        }
    }
}

/// Template for one pipeline stage.
#[derive(Debug, Clone)]
pub struct StageTemplate {
    name: String,
    universe: Universe,
    executable: String,
    submit_file: String,
    stdout: String,
    stderr: String,
    options: OptionMap,
    short_options: OptionMap,
    var_arg: Option<String>,
}

impl StageTemplate {
    /// Create a stage for `executable`. The submit filename is derived
    /// from the executable's basename so stages never clash on disk.
    pub fn new(name: impl Into<String>, universe: Universe, executable: impl Into<String>) -> Self {
        let executable = executable.into();
        let basename = executable
            .rsplit('/')
            .next()
            .unwrap_or(executable.as_str())
            .to_string();
        Self {
            name: name.into(),
            universe,
            submit_file: format!("{basename}.sub"),
            executable,
            stdout: "/dev/null".to_string(),
            stderr: "/dev/null".to_string(),
            options: OptionMap::new(),
            short_options: OptionMap::new(),
            var_arg: None,
        }
    }

    pub fn set_stdout(&mut self, path: impl Into<String>) {
        self.stdout = path.into();
    }

    pub fn set_stderr(&mut self, path: impl Into<String>) {
        self.stderr = path.into();
    }

    /// Bind a long option, rendered as `--key value`.
    pub fn set_option(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.options.set(key, value);
    }

    /// Bind a short option, rendered as `-k value` after the long ones.
    pub fn set_short_option(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.short_options.set(key, value);
    }

    /// Append a bare `$(macro)` argument expanded per node by DAGMan.
    pub fn set_var_arg(&mut self, macro_name: impl Into<String>) {
        self.var_arg = Some(macro_name.into());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    pub fn submit_file(&self) -> &str {
        &self.submit_file
    }

    pub fn options(&self) -> &OptionMap {
        &self.options
    }

    pub fn short_options(&self) -> &OptionMap {
        &self.short_options
    }

    /// Render the full argument string: long options in insertion order,
    /// then short options, then the macro argument if any.
    pub fn arguments(&self) -> String {
        let mut parts = Vec::new();
        for (key, value) in self.options.iter() {
            parts.push(format!("--{key} {value}"));
        }
        for (key, value) in self.short_options.iter() {
            parts.push(format!("-{key} {value}"));
        }
        if let Some(macro_name) = &self.var_arg {
            parts.push(format!("$({macro_name})"));
        }
        parts.join(" ")
    }

    /// The submit description for this stage, pointed at the shared log.
    pub fn submit_description(&self, log: &str) -> SubmitDescription {
        SubmitDescription {
            universe: self.universe.to_string(),
            executable: self.executable.clone(),
            arguments: self.arguments(),
            log: log.to_string(),
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_map_preserves_insertion_order() {
        let mut map = OptionMap::new();
        map.set("calibration", "Funky");
        map.set("instrument", "H1");
        map.set("gps-start-time", "0");
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["calibration", "instrument", "gps-start-time"]);
    }

    #[test]
    fn option_map_overwrites_in_place() {
        let mut map = OptionMap::new();
        map.set("frequency", "100.0");
        map.set("bandwidth", "1.0");
        map.set("frequency", "1200.0");
        let entries: Vec<(&str, &str)> = map.iter().collect();
        assert_eq!(
            entries,
            vec![("frequency", "1200.0"), ("bandwidth", "1.0")]
        );
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("frequency"), Some("1200.0"));
        assert_eq!(map.get("threshold"), None);
    }

    #[test]
    fn submit_file_derived_from_executable_basename() {
        let stage = StageTemplate::new(
            "gather",
            Universe::Vanilla,
            "/opt/lscsoft/bin/lalapps_GatherLFN",
        );
        assert_eq!(stage.submit_file(), "lalapps_GatherLFN.sub");
        assert_eq!(stage.executable(), "/opt/lscsoft/bin/lalapps_GatherLFN");
    }

    #[test]
    fn arguments_render_long_then_short_then_macro() {
        let mut stage = StageTemplate::new("compute", Universe::Standard, "FrComputeFStatistic");
        stage.set_option("verbose", "1");
        stage.set_short_option("I", "2");
        stage.set_short_option("f", "1200.000000");
        stage.set_var_arg("patch");
        assert_eq!(stage.arguments(), "--verbose 1 -I 2 -f 1200.000000 $(patch)");
    }

    #[test]
    fn arguments_empty_when_nothing_bound() {
        let stage = StageTemplate::new("query", Universe::Vanilla, "lalapps_QueryMetadataLFN");
        assert_eq!(stage.arguments(), "");
    }

    #[test]
    fn submit_description_carries_stdio_and_log() {
        let mut stage = StageTemplate::new("extract", Universe::Vanilla, "narrowBandExtract");
        stage.set_option("input", "sftPath.txt");
        stage.set_stdout("extract.out");
        let desc = stage.submit_description("ClusterComputeF.log");
        assert_eq!(desc.universe, "vanilla");
        assert_eq!(desc.executable, "narrowBandExtract");
        assert_eq!(desc.arguments, "--input sftPath.txt");
        assert_eq!(desc.log, "ClusterComputeF.log");
        assert_eq!(desc.stdout, "extract.out");
        assert_eq!(desc.stderr, "/dev/null");
    }
}
