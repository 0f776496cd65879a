use crate::error::TlpError;

/// A set of transient TLP pulses: voltage and current waveforms sampled at a
/// fixed time step, stored row-major with one row per pulse.
#[derive(Debug, Clone, PartialEq)]
pub struct IvTime {
    v_data: Vec<f64>,
    i_data: Vec<f64>,
    pulses_length: usize,
    pulses_nb: usize,
    delta_t: f64,
}

impl IvTime {
    /// Zero-filled pulse set, e.g. as an acquisition placeholder.
    pub fn new(pulses_nb: usize, pulses_length: usize, delta_t: f64) -> Self {
        let n = pulses_nb * pulses_length;
        Self {
            v_data: vec![0.0; n],
            i_data: vec![0.0; n],
            pulses_length,
            pulses_nb,
            delta_t,
        }
    }

    /// Builds a pulse set from flattened sample arrays.
    ///
    /// Both arrays must have the same length, and that length must be a whole
    /// number of pulses of `pulses_length` samples.
    pub fn from_samples(
        voltage: Vec<f64>,
        current: Vec<f64>,
        pulses_length: usize,
        delta_t: f64,
    ) -> Result<Self, TlpError> {
        if voltage.len() != current.len() {
            return Err(TlpError::PulseShapeMismatch {
                expected: voltage.len(),
                got: current.len(),
            });
        }
        if pulses_length == 0 && !voltage.is_empty() {
            return Err(TlpError::PulseShapeMismatch {
                expected: 0,
                got: voltage.len(),
            });
        }
        let pulses_nb = if pulses_length == 0 {
            0
        } else {
            if voltage.len() % pulses_length != 0 {
                let nb = voltage.len() / pulses_length + 1;
                return Err(TlpError::PulseShapeMismatch {
                    expected: nb * pulses_length,
                    got: voltage.len(),
                });
            }
            voltage.len() / pulses_length
        };
        Ok(Self {
            v_data: voltage,
            i_data: current,
            pulses_length,
            pulses_nb,
            delta_t,
        })
    }

    /// Samples per pulse.
    #[inline]
    pub fn pulses_length(&self) -> usize {
        self.pulses_length
    }

    /// Number of pulses in the set.
    #[inline]
    pub fn pulses_nb(&self) -> usize {
        self.pulses_nb
    }

    /// Time step between consecutive samples, in seconds.
    #[inline]
    pub fn delta_t(&self) -> f64 {
        self.delta_t
    }

    /// Voltage waveform of pulse `n`.
    pub fn voltage(&self, n: usize) -> &[f64] {
        let start = n * self.pulses_length;
        &self.v_data[start..start + self.pulses_length]
    }

    /// Current waveform of pulse `n`.
    pub fn current(&self, n: usize) -> &[f64] {
        let start = n * self.pulses_length;
        &self.i_data[start..start + self.pulses_length]
    }

    /// True when the set carries no samples at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pulses_nb == 0 || self.pulses_length == 0
    }
}
