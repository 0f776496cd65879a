use crate::error::TlpError;

/// Quasi-static TLP I-V curve: one (current, voltage) point per pulse, in
/// pulse order.
///
/// Immutable after construction. Accessors hand out read views; [`Self::data`]
/// hands out a defensive copy so callers can never mutate the curve through
/// the returned record.
#[derive(Debug, Clone, PartialEq)]
pub struct TlpCurve {
    current: Vec<f64>,
    voltage: Vec<f64>,
}

/// A detached copy of a curve's samples.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveData {
    pub voltage: Vec<f64>,
    pub current: Vec<f64>,
}

impl TlpCurve {
    pub fn new(current: Vec<f64>, voltage: Vec<f64>) -> Result<Self, TlpError> {
        if current.len() != voltage.len() {
            return Err(TlpError::CurveShapeMismatch {
                current: current.len(),
                voltage: voltage.len(),
            });
        }
        Ok(Self { current, voltage })
    }

    /// Number of points on the curve (one per pulse).
    #[inline]
    pub fn len(&self) -> usize {
        self.current.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Current samples of the TLP curve.
    #[inline]
    pub fn current(&self) -> &[f64] {
        &self.current
    }

    /// Voltage samples of the TLP curve.
    #[inline]
    pub fn voltage(&self) -> &[f64] {
        &self.voltage
    }

    /// A copy of the raw curve data.
    pub fn data(&self) -> CurveData {
        CurveData {
            voltage: self.voltage.clone(),
            current: self.current.clone(),
        }
    }
}
