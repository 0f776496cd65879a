use crate::error::TlpError;

/// One leakage I-V sweep, measured between stress pulses with the voltage
/// axis in sweep order.
#[derive(Debug, Clone, PartialEq)]
pub struct LeakCurve {
    voltage: Vec<f64>,
    current: Vec<f64>,
}

impl LeakCurve {
    pub fn new(voltage: Vec<f64>, current: Vec<f64>) -> Result<Self, TlpError> {
        if voltage.len() != current.len() {
            return Err(TlpError::LeakShapeMismatch {
                current: current.len(),
                voltage: voltage.len(),
            });
        }
        Ok(Self { voltage, current })
    }

    #[inline]
    pub fn voltage(&self) -> &[f64] {
        &self.voltage
    }

    #[inline]
    pub fn current(&self) -> &[f64] {
        &self.current
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.voltage.is_empty()
    }
}

/// Leakage current at the spot voltage for each sweep.
///
/// Linear interpolation between the two bracketing sweep points; clamped to
/// the nearest endpoint when the spot voltage lies outside the swept range.
/// An empty sweep yields NaN, which failure classification ignores.
pub fn extract_at_spot(curves: &[LeakCurve], spot_v: f64) -> Vec<f64> {
    curves
        .iter()
        .map(|curve| interpolate(curve.voltage(), curve.current(), spot_v))
        .collect()
}

fn interpolate(voltage: &[f64], current: &[f64], spot_v: f64) -> f64 {
    if voltage.is_empty() {
        return f64::NAN;
    }
    match voltage.iter().position(|&v| v >= spot_v) {
        Some(0) => current[0],
        None => current[current.len() - 1],
        Some(hi) => {
            let lo = hi - 1;
            let dv = voltage[hi] - voltage[lo];
            if approx::abs_diff_eq!(dv, 0.0) {
                current[lo]
            } else {
                let t = (spot_v - voltage[lo]) / dv;
                current[lo] + t * (current[hi] - current[lo])
            }
        }
    }
}

/// First index whose drift from the pre-stress reference exceeds `fail_perc`
/// percent, together with that drift.
///
/// The first entry is the reference and is never classified. NaN entries
/// (empty sweeps) never fail.
pub fn classify_failure(evolution: &[f64], fail_perc: f64) -> Option<(usize, f64)> {
    let reference = *evolution.first()?;
    if !reference.is_finite() {
        return None;
    }
    // Floor keeps a near-zero reference from turning noise into failures.
    let floor = reference.abs().max(1e-12);
    evolution.iter().enumerate().skip(1).find_map(|(index, leak)| {
        let drift = ((leak - reference).abs() / floor) * 100.0;
        (drift > fail_perc).then_some((index, drift))
    })
}
