use anyhow::Result;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SPOT_V: f64 = 0.5;
pub const DEFAULT_FAIL_PERC: f64 = 15.0;
pub const DEFAULT_SEUIL: f64 = -0.4;

/// Tunable analysis parameters plus presentation options, loadable from TOML.
///
/// Every key is optional in the file; missing keys fall back to the defaults
/// used by TLP testers in practice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Leakage extraction spot voltage, in volts.
    #[serde(default = "default_spot_v")]
    pub spot_v: f64,
    /// Leakage drift beyond this percentage marks the device as failed.
    #[serde(default = "default_fail_perc")]
    pub fail_perc: f64,
    /// Voltage-step threshold for triggering-point (snapback) detection.
    #[serde(default = "default_seuil")]
    pub seuil: f64,
    /// Stylesheet applied to generated reports; built-in style when absent.
    #[serde(default)]
    pub css: Option<PathBuf>,
    /// Report title override.
    #[serde(default)]
    pub title: Option<String>,
}

fn default_spot_v() -> f64 {
    DEFAULT_SPOT_V
}

fn default_fail_perc() -> f64 {
    DEFAULT_FAIL_PERC
}

fn default_seuil() -> f64 {
    DEFAULT_SEUIL
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            spot_v: DEFAULT_SPOT_V,
            fail_perc: DEFAULT_FAIL_PERC,
            seuil: DEFAULT_SEUIL,
            css: None,
            title: None,
        }
    }
}

impl AnalysisConfig {
    /// The presentation subset of this configuration.
    pub fn style(&self) -> ReportStyle {
        ReportStyle {
            css: self.css.clone(),
            title: self.title.clone(),
        }
    }
}

pub fn parse_analysis_config(path: impl AsRef<Path>) -> Result<AnalysisConfig> {
    let contents = fs::read_to_string(path)?;
    let data = toml::from_str(&contents)?;
    Ok(data)
}

/// Presentation options for report generation.
///
/// The stylesheet location is explicit caller-supplied configuration; report
/// generation never consults the process working directory.
#[derive(Debug, Clone, Default, Builder)]
#[builder(default, derive(Debug))]
pub struct ReportStyle {
    /// Path to a CSS stylesheet. The built-in style applies when `None`.
    pub css: Option<PathBuf>,
    /// Report title; defaults to "<device> TLP report".
    pub title: Option<String>,
}

impl ReportStyle {
    #[inline]
    pub fn builder() -> ReportStyleBuilder {
        ReportStyleBuilder::default()
    }
}
