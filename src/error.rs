use thiserror::Error;

/// Construction-time precondition violations.
///
/// Filesystem and rendering errors in the report pipeline propagate as
/// [`anyhow::Error`] instead; this type only covers invalid measurement data
/// handed to a constructor.
#[derive(Debug, Error)]
pub enum TlpError {
    #[error("device_name must not be empty")]
    EmptyDeviceName,

    #[error("TLP curve arrays must have equal length: current has {current} samples, voltage has {voltage}")]
    CurveShapeMismatch { current: usize, voltage: usize },

    #[error("leakage curve arrays must have equal length: current has {current} samples, voltage has {voltage}")]
    LeakShapeMismatch { current: usize, voltage: usize },

    #[error("pulse arrays must hold pulses_nb * pulses_length samples: expected {expected}, got {got}")]
    PulseShapeMismatch { expected: usize, got: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
