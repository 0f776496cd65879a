use std::path::{Path, PathBuf};

use itertools::Itertools;
use log::debug;

use crate::curve::TlpCurve;
use crate::paths::out_plot;
use crate::Result;

pub mod leakage;
pub mod plot;

pub use leakage::LeakCurve;

/// Leakage measurements attached to an analysis.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LeakInput {
    /// No leakage data; the analysis skips failure classification.
    #[default]
    None,
    /// Full I-V sweeps, one per stress level.
    IvSweep(Vec<LeakCurve>),
    /// Pre-extracted leakage value per stress level.
    Evolution(Vec<f64>),
}

/// Snapback triggering point of the TLP curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerPoint {
    pub index: usize,
    pub vt1: f64,
    pub it1: f64,
}

/// First stress level at which the device leakage drifted past the failure
/// threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FailurePoint {
    pub index: usize,
    pub vt2: f64,
    pub it2: f64,
    /// Leakage drift relative to the pre-stress reference, in percent.
    pub drift_perc: f64,
}

/// Least-squares line fit of the on-state region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    /// Dynamic on-resistance (dV/dI), in ohms.
    pub ron: f64,
    /// Voltage-axis intercept of the fitted line, in volts.
    pub v_holding: f64,
}

/// Quantities computed by [`TlpAnalysis::update_analysis`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DerivedQuantities {
    pub trigger: Option<TriggerPoint>,
    pub failure: Option<FailurePoint>,
    pub fit: Option<LineFit>,
    pub leak_evolution: Vec<f64>,
    pub plots: Vec<PathBuf>,
}

/// Numeric extraction over one TLP curve and its leakage measurements.
///
/// Configured through setters, then [`Self::update_analysis`] recomputes every
/// derived quantity and renders the analysis plots into the base directory.
/// With an empty base directory the analysis stays purely in-memory, which is
/// how the numeric routines are exercised in isolation.
#[derive(Debug, Clone)]
pub struct TlpAnalysis {
    curve: TlpCurve,
    threshold: f64,
    spot_v: f64,
    fail_perc: f64,
    device_name: String,
    base_dir: PathBuf,
    leak_input: LeakInput,
    derived: DerivedQuantities,
}

impl TlpAnalysis {
    pub fn new(curve: TlpCurve) -> Self {
        Self {
            curve,
            threshold: crate::config::DEFAULT_SEUIL,
            spot_v: crate::config::DEFAULT_SPOT_V,
            fail_perc: crate::config::DEFAULT_FAIL_PERC,
            device_name: String::new(),
            base_dir: PathBuf::new(),
            leak_input: LeakInput::None,
            derived: DerivedQuantities::default(),
        }
    }

    /// Voltage-step threshold for triggering-point detection.
    pub fn set_threshold(&mut self, seuil: f64) {
        self.threshold = seuil;
    }

    /// Attaches leakage I-V sweeps; replaces any previous leakage input.
    pub fn set_leak_analysis(&mut self, curves: Vec<LeakCurve>) {
        self.leak_input = LeakInput::IvSweep(curves);
    }

    /// Attaches a pre-extracted leakage evolution; replaces any previous
    /// leakage input.
    pub fn set_evol_analysis(&mut self, evolution: Vec<f64>) {
        self.leak_input = LeakInput::Evolution(evolution);
    }

    pub fn set_spot(&mut self, spot_v: f64) {
        self.spot_v = spot_v;
    }

    pub fn set_fail(&mut self, fail_perc: f64) {
        self.fail_perc = fail_perc;
    }

    pub fn set_device_name(&mut self, name: impl Into<String>) {
        self.device_name = name.into();
    }

    /// Directory receiving the rendered plots.
    pub fn set_base_dir(&mut self, dir: impl AsRef<Path>) {
        self.base_dir = dir.as_ref().to_path_buf();
    }

    /// Recomputes the triggering point, leakage evolution, failure point, and
    /// on-state fit, then renders the plots.
    pub fn update_analysis(&mut self) -> Result<()> {
        let trigger = self.find_trigger();
        let leak_evolution = match &self.leak_input {
            LeakInput::IvSweep(curves) => leakage::extract_at_spot(curves, self.spot_v),
            LeakInput::Evolution(values) => values.clone(),
            LeakInput::None => Vec::new(),
        };
        let failure = leakage::classify_failure(&leak_evolution, self.fail_perc).map(
            |(index, drift_perc)| {
                let last = self.curve.len().saturating_sub(1);
                let at = index.min(last);
                FailurePoint {
                    index,
                    vt2: self.curve.voltage().get(at).copied().unwrap_or(f64::NAN),
                    it2: self.curve.current().get(at).copied().unwrap_or(f64::NAN),
                    drift_perc,
                }
            },
        );
        let fit = self.fit_on_region(trigger);
        debug!(
            "analysis for {:?}: trigger={:?} failure={:?} fit={:?}",
            self.device_name, trigger, failure, fit
        );

        let mut plots = Vec::new();
        if !self.base_dir.as_os_str().is_empty() {
            std::fs::create_dir_all(&self.base_dir)?;
            let tlp_png = out_plot(&self.base_dir, &format!("{}_tlp", self.device_name));
            plot::plot_tlp_curve(
                &self.curve,
                trigger.as_ref(),
                failure.as_ref(),
                &format!("{} TLP I-V", self.device_name),
                &tlp_png,
            )?;
            plots.push(tlp_png);
            if !leak_evolution.is_empty() {
                let leak_png = out_plot(&self.base_dir, &format!("{}_leakage", self.device_name));
                plot::plot_leak_evolution(
                    &leak_evolution,
                    &format!("{} leakage evolution", self.device_name),
                    &leak_png,
                )?;
                plots.push(leak_png);
            }
        }

        self.derived = DerivedQuantities {
            trigger,
            failure,
            fit,
            leak_evolution,
            plots,
        };
        Ok(())
    }

    /// First sample pair whose voltage step drops below the threshold.
    fn find_trigger(&self) -> Option<TriggerPoint> {
        let v = self.curve.voltage();
        let c = self.curve.current();
        v.iter()
            .tuple_windows()
            .position(|(a, b)| b - a < self.threshold)
            .map(|i| TriggerPoint {
                index: i,
                vt1: v[i],
                it1: c[i],
            })
    }

    /// Fits V = Ron * I + Vh over the on-state region: everything after the
    /// trigger, or the upper half of the curve when no trigger was found.
    fn fit_on_region(&self, trigger: Option<TriggerPoint>) -> Option<LineFit> {
        let start = trigger
            .map(|t| t.index + 1)
            .unwrap_or_else(|| self.curve.len() / 2);
        if start >= self.curve.len() {
            return None;
        }
        let i = &self.curve.current()[start..];
        let v = &self.curve.voltage()[start..];
        fit_line(i, v).map(|(slope, intercept)| LineFit {
            ron: slope,
            v_holding: intercept,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn curve(&self) -> &TlpCurve {
        &self.curve
    }

    pub fn spot_v(&self) -> f64 {
        self.spot_v
    }

    pub fn fail_perc(&self) -> f64 {
        self.fail_perc
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn derived(&self) -> &DerivedQuantities {
        &self.derived
    }
}

/// Ordinary least squares; `None` when fewer than two points or degenerate x.
pub(crate) fn fit_line(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    if x.len() < 2 {
        return None;
    }
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let sxx = x.iter().map(|xi| (xi - mx) * (xi - mx)).sum::<f64>();
    if approx::abs_diff_eq!(sxx, 0.0) {
        return None;
    }
    let sxy = x.iter().zip(y).map(|(xi, yi)| (xi - mx) * (yi - my)).sum::<f64>();
    let slope = sxy / sxx;
    Some((slope, my - slope * mx))
}
