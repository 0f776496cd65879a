use std::path::{Path, PathBuf};

pub fn out_report(work_dir: impl AsRef<Path>, name: &str) -> PathBuf {
    PathBuf::from(work_dir.as_ref()).join(format!("{name}_report.html"))
}

pub fn out_plot(work_dir: impl AsRef<Path>, name: &str) -> PathBuf {
    PathBuf::from(work_dir.as_ref()).join(format!("{name}.png"))
}

/// Directory holding report images, next to the measurement source file.
pub fn report_analysis_dir(src_dir: impl AsRef<Path>) -> PathBuf {
    PathBuf::from(src_dir.as_ref()).join("report_analysis")
}
