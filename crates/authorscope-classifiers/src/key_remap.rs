//! Reconciling saved parameter names with the live model structure
//!
//! Fine-tuned checkpoints for the code model were saved from a training
//! wrapper whose module names differ from the serving model: the encoder may
//! appear as `text_encoder.*`, as `additional_loss.sentence_embedder.*`, or
//! both. Loading proceeds in stages:
//!
//! 1. Direct load by name, tolerating missing and unexpected keys.
//! 2. If more live parameters are missing than the table's threshold, saved
//!    keys are rewritten through the prefix rules and the load is retried.
//! 3. If a direct load fails outright (shape or dtype mismatch), keys are
//!    partitioned: anything under one of the encoder aliases is stripped and
//!    loaded into the encoder submodule, everything else goes to the top
//!    level.
//!
//! The rules live in a versioned [`KeyMappingTable`] that can ship next to
//! the weights. A strict table refuses to serve a model with live parameters
//! left uninitialised.

use authorscope_core::{Error, Result};
use candle_core::Tensor;
use candle_nn::VarMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Key mapping table versions this build understands
pub const SUPPORTED_TABLE_VERSIONS: [u32; 1] = [1];

/// Number of keys listed per category in a load report
pub const REPORT_KEY_LIMIT: usize = 10;

fn default_remap_threshold() -> usize {
    100
}

fn default_true() -> bool {
    true
}

/// Rewrite saved keys starting with `from` to start with `to`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixRule {
    pub from: String,
    pub to: String,
}

impl PrefixRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    fn apply(&self, key: &str) -> Option<String> {
        key.strip_prefix(&self.from)
            .map(|rest| format!("{}{}", self.to, rest))
    }
}

/// Versioned description of how saved names map onto live names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMappingTable {
    pub version: u32,

    /// Missing-key count above which prefix rules are applied
    #[serde(default = "default_remap_threshold")]
    pub remap_threshold: usize,

    /// Rules tried in order; the first matching rule wins
    #[serde(default)]
    pub prefix_rules: Vec<PrefixRule>,

    /// Live path of the encoder submodule, without trailing dot
    pub submodule: String,

    /// Saved prefixes holding encoder weights, in priority order
    #[serde(default)]
    pub submodule_aliases: Vec<String>,

    /// Fail the load if any live parameter is left without a tensor
    #[serde(default = "default_true")]
    pub strict: bool,
}

impl Default for KeyMappingTable {
    fn default() -> Self {
        Self {
            version: 1,
            remap_threshold: default_remap_threshold(),
            prefix_rules: vec![PrefixRule::new(
                "text_encoder.",
                "additional_loss.sentence_embedder.",
            )],
            submodule: "additional_loss.sentence_embedder".to_string(),
            submodule_aliases: vec![
                "additional_loss.sentence_embedder.".to_string(),
                "text_encoder.".to_string(),
            ],
            strict: true,
        }
    }
}

impl KeyMappingTable {
    /// Load a table from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::load(format!(
                "Failed to read key mapping {}: {}",
                path.display(),
                e
            ))
        })?;
        let table: Self = serde_json::from_str(&contents).map_err(|e| {
            Error::load(format!(
                "Failed to parse key mapping {}: {}",
                path.display(),
                e
            ))
        })?;
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_TABLE_VERSIONS.contains(&self.version) {
            return Err(Error::load(format!(
                "Unsupported key mapping version {}",
                self.version
            )));
        }
        if self.submodule.is_empty() || self.submodule.ends_with('.') {
            return Err(Error::load(format!(
                "Invalid submodule path '{}'",
                self.submodule
            )));
        }
        let prefixes = self
            .prefix_rules
            .iter()
            .flat_map(|r| [&r.from, &r.to])
            .chain(&self.submodule_aliases);
        for prefix in prefixes {
            if !prefix.ends_with('.') {
                return Err(Error::load(format!(
                    "Key prefix '{}' must end with '.'",
                    prefix
                )));
            }
        }
        Ok(())
    }

    /// Apply the prefix rules to one saved key
    pub fn rename(&self, key: &str) -> String {
        self.prefix_rules
            .iter()
            .find_map(|rule| rule.apply(key))
            .unwrap_or_else(|| key.to_string())
    }
}

/// A live module whose parameters can be overwritten by name
pub trait ParameterTarget {
    /// Names of every live parameter
    fn parameter_names(&self) -> Result<Vec<String>>;

    /// Copy `value` into the live parameter `name`
    fn assign(&mut self, name: &str, value: &Tensor) -> Result<()>;
}

impl ParameterTarget for VarMap {
    fn parameter_names(&self) -> Result<Vec<String>> {
        let data = self
            .data()
            .lock()
            .map_err(|e| Error::internal(format!("Parameter map lock poisoned: {}", e)))?;
        let mut names: Vec<String> = data.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn assign(&mut self, name: &str, value: &Tensor) -> Result<()> {
        self.set_one(name, value)
            .map_err(|e| Error::load(format!("Cannot load '{}': {}", name, e)))
    }
}

/// How the final set of tensors was matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    Direct,
    PrefixRemap,
    SubmodulePartition,
}

impl fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::PrefixRemap => write!(f, "prefix remap"),
            Self::SubmodulePartition => write!(f, "submodule partition"),
        }
    }
}

/// Outcome of loading a saved parameter set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub strategy: LoadStrategy,
    /// Live parameters that received a tensor
    pub matched: Vec<String>,
    /// Live parameters that received nothing
    pub missing: Vec<String>,
    /// Saved tensors that were dropped
    pub unexpected: Vec<String>,
}

impl LoadReport {
    /// Human-readable report listing at most `limit` keys per category
    pub fn summary(&self, limit: usize) -> String {
        let mut out = format!("Loading strategy: {}\n", self.strategy);
        for (title, keys) in [
            ("Matched keys", &self.matched),
            ("Missing keys", &self.missing),
            ("Unexpected keys", &self.unexpected),
        ] {
            out.push_str(&format!("{}: {}\n", title, keys.len()));
            for key in keys.iter().take(limit) {
                out.push_str(&format!("  {}\n", key));
            }
            if keys.len() > limit {
                out.push_str(&format!("  ... and {} more\n", keys.len() - limit));
            }
        }
        out
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary(REPORT_KEY_LIMIT))
    }
}

/// Loads saved tensors into a [`ParameterTarget`] following a [`KeyMappingTable`]
pub struct KeyRemapper {
    table: KeyMappingTable,
}

impl KeyRemapper {
    pub fn new(table: KeyMappingTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &KeyMappingTable {
        &self.table
    }

    /// Load `saved` into `target`, returning which keys matched
    pub fn load_into<T: ParameterTarget>(
        &self,
        saved: &HashMap<String, Tensor>,
        target: &mut T,
    ) -> Result<LoadReport> {
        let live: BTreeSet<String> = target.parameter_names()?.into_iter().collect();
        let saved: BTreeMap<&str, &Tensor> =
            saved.iter().map(|(k, v)| (k.as_str(), v)).collect();

        debug!("Saved parameter keys ({}):", saved.len());
        for key in saved.keys() {
            debug!("  {}", key);
        }

        let report = match self.load_with_remap(&saved, &live, target) {
            Ok(report) => report,
            Err(e) => {
                warn!("Error loading parameters: {}", e);
                info!("Falling back to submodule partitioning");
                let report = self.load_partitioned(&saved, &live, target)?;
                info!("\n{}", report);
                report
            }
        };

        self.finish(report)
    }

    fn load_with_remap<T: ParameterTarget>(
        &self,
        saved: &BTreeMap<&str, &Tensor>,
        live: &BTreeSet<String>,
        target: &mut T,
    ) -> Result<LoadReport> {
        let entries: Vec<(String, &Tensor)> =
            saved.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        let report = load_by_name(LoadStrategy::Direct, &entries, live, target)?;
        info!("\n{}", report);

        if report.missing.len() <= self.table.remap_threshold || self.table.prefix_rules.is_empty()
        {
            return Ok(report);
        }

        info!(
            "{} missing keys exceed threshold {}, applying prefix rules",
            report.missing.len(),
            self.table.remap_threshold
        );
        let renamed: Vec<(String, &Tensor)> = saved
            .iter()
            .map(|(k, v)| (self.table.rename(k), *v))
            .collect();
        let report = load_by_name(LoadStrategy::PrefixRemap, &renamed, live, target)?;
        info!("After key correction:\n{}", report);
        Ok(report)
    }

    fn load_partitioned<T: ParameterTarget>(
        &self,
        saved: &BTreeMap<&str, &Tensor>,
        live: &BTreeSet<String>,
        target: &mut T,
    ) -> Result<LoadReport> {
        let mut partitioned: BTreeMap<String, &Tensor> = BTreeMap::new();

        for alias in &self.table.submodule_aliases {
            for (key, value) in saved.iter() {
                if let Some(rest) = key.strip_prefix(alias.as_str()) {
                    partitioned
                        .entry(format!("{}.{}", self.table.submodule, rest))
                        .or_insert(*value);
                }
            }
        }

        for (key, value) in saved.iter() {
            let is_submodule = self
                .table
                .submodule_aliases
                .iter()
                .any(|alias| key.starts_with(alias.as_str()));
            if !is_submodule {
                partitioned.entry(key.to_string()).or_insert(*value);
            }
        }

        let entries: Vec<(String, &Tensor)> = partitioned.into_iter().collect();
        load_by_name(LoadStrategy::SubmodulePartition, &entries, live, target)
            .map_err(|e| Error::load(format!("All parameter loading strategies failed: {}", e)))
    }

    fn finish(&self, report: LoadReport) -> Result<LoadReport> {
        if !report.unexpected.is_empty() {
            warn!(
                "{} saved tensors matched no live parameter and were dropped",
                report.unexpected.len()
            );
        }

        if self.table.strict && !report.missing.is_empty() {
            let shown: Vec<&str> = report
                .missing
                .iter()
                .take(REPORT_KEY_LIMIT)
                .map(String::as_str)
                .collect();
            return Err(Error::load(format!(
                "{} live parameters have no saved tensor after key mapping: {}{}",
                report.missing.len(),
                shown.join(", "),
                if report.missing.len() > REPORT_KEY_LIMIT {
                    ", ..."
                } else {
                    ""
                }
            )));
        }

        if !report.missing.is_empty() {
            warn!(
                "{} live parameters keep their initial values",
                report.missing.len()
            );
        }

        Ok(report)
    }
}

/// Assign every entry whose name is live; later duplicates win
fn load_by_name<T: ParameterTarget>(
    strategy: LoadStrategy,
    entries: &[(String, &Tensor)],
    live: &BTreeSet<String>,
    target: &mut T,
) -> Result<LoadReport> {
    let mut matched = BTreeSet::new();
    let mut unexpected = Vec::new();

    for (name, value) in entries {
        if live.contains(name) {
            target.assign(name, value)?;
            matched.insert(name.clone());
        } else {
            unexpected.push(name.clone());
        }
    }

    let missing = live
        .iter()
        .filter(|name| !matched.contains(*name))
        .cloned()
        .collect();

    Ok(LoadReport {
        strategy,
        matched: matched.into_iter().collect(),
        missing,
        unexpected,
    })
}
