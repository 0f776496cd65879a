use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::analysis::{LeakCurve, TlpAnalysis};
use crate::config::{AnalysisConfig, ReportStyle};
use crate::curve::TlpCurve;
use crate::error::TlpError;
use crate::paths;
use crate::pulses::IvTime;
use crate::report::TlpReport;
use crate::Result;

/// All measurement data for one TLP run: device identity, transient pulses,
/// TLP curve, leakage, plus the analysis and report this data drives.
///
/// Two-phase lifecycle: [`Self::new`] validates and classifies the raw data
/// without touching the filesystem; [`Self::analyze_and_report`] runs the
/// analysis pipeline and writes the HTML report next to the source file.
#[derive(Debug)]
pub struct RawTlpData {
    device_name: String,
    pulses: IvTime,
    iv_leak: Option<Vec<LeakCurve>>,
    leak_evol: Option<Vec<f64>>,
    tlp_curve: TlpCurve,
    tester_name: Option<String>,
    original_file_name: PathBuf,

    /// Leakage extraction spot voltage, in volts.
    pub spot_v: f64,
    /// Failure threshold on leakage drift, in percent.
    pub fail_perc: f64,
    /// Voltage-step threshold for triggering-point detection.
    pub seuil: f64,

    has_transient_pulses: bool,
    has_report: bool,
    analysis: Option<TlpAnalysis>,
    report: Option<TlpReport>,
    report_path: Option<PathBuf>,
}

impl RawTlpData {
    /// Validates and classifies one measurement file's worth of data.
    ///
    /// `iv_leak` and `leak_evol` are optional in substance: an empty sweep set
    /// and an empty or all-zero evolution are treated as absent. When both are
    /// present, the I-V sweeps drive the leakage analysis.
    pub fn new(
        device_name: impl Into<String>,
        pulses: IvTime,
        iv_leak: Vec<LeakCurve>,
        tlp_curve: TlpCurve,
        leak_evol: Vec<f64>,
        file_path: impl Into<PathBuf>,
        tester_name: Option<String>,
    ) -> std::result::Result<Self, TlpError> {
        let device_name = device_name.into();
        if device_name.is_empty() {
            return Err(TlpError::EmptyDeviceName);
        }

        let has_transient_pulses = !pulses.is_empty();
        let iv_leak = if iv_leak.is_empty() {
            None
        } else {
            Some(iv_leak)
        };
        let leak_evol = if leak_evol.is_empty()
            || leak_evol
                .iter()
                .all(|&x| approx::abs_diff_eq!(x, 0.0))
        {
            None
        } else {
            Some(leak_evol)
        };
        debug!(
            "classified {device_name}: transient_pulses={has_transient_pulses} \
             leakage_ivs={} leakage_evolution={}",
            iv_leak.is_some(),
            leak_evol.is_some()
        );

        Ok(Self {
            device_name,
            pulses,
            iv_leak,
            leak_evol,
            tlp_curve,
            tester_name,
            original_file_name: file_path.into(),
            spot_v: crate::config::DEFAULT_SPOT_V,
            fail_perc: crate::config::DEFAULT_FAIL_PERC,
            seuil: crate::config::DEFAULT_SEUIL,
            has_transient_pulses,
            has_report: false,
            analysis: None,
            report: None,
            report_path: None,
        })
    }

    /// Copies the tunable parameters from a parsed configuration.
    pub fn apply_config(&mut self, config: &AnalysisConfig) {
        self.spot_v = config.spot_v;
        self.fail_perc = config.fail_perc;
        self.seuil = config.seuil;
    }

    /// Runs the analysis and writes `<srcDir>/<deviceStem>_report.html`, with
    /// plots under `<srcDir>/report_analysis/`.
    ///
    /// A failed report body generation is recorded in [`Self::has_report`]
    /// rather than raised; filesystem errors propagate.
    pub fn analyze_and_report(&mut self, style: &ReportStyle) -> Result<()> {
        let src_dir = self
            .original_file_name
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let dev = self
            .original_file_name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.device_name.clone());

        let report_dir = paths::report_analysis_dir(&src_dir);
        fs::create_dir_all(&report_dir)?;

        let mut analysis = TlpAnalysis::new(self.tlp_curve.clone());
        analysis.set_threshold(self.seuil);
        if let Some(iv) = &self.iv_leak {
            analysis.set_leak_analysis(iv.clone());
            analysis.set_spot(self.spot_v);
            analysis.set_fail(self.fail_perc);
        } else if let Some(evol) = &self.leak_evol {
            analysis.set_evol_analysis(evol.clone());
            analysis.set_fail(self.fail_perc);
        }
        analysis.set_device_name(&dev);
        analysis.set_base_dir(&report_dir);
        analysis.update_analysis()?;

        let report_path = paths::out_report(&src_dir, &dev);
        let mut report = TlpReport::new();
        report.set_css_format(style)?;
        self.has_report = match report.create_report(&analysis) {
            Ok(()) => true,
            Err(e) => {
                warn!("report generation for {dev} failed: {e:#}");
                false
            }
        };
        report.save_report(&report_path)?;
        info!("saved TLP report for {dev} to {report_path:?}");

        self.analysis = Some(analysis);
        self.report = Some(report);
        self.report_path = Some(report_path);
        Ok(())
    }

    /// Pushes the current tunables into the analysis and re-runs it; if a
    /// report existed, regenerates and overwrites it at the same path.
    ///
    /// No-op before [`Self::analyze_and_report`] has run.
    pub fn update_analysis(&mut self) -> Result<()> {
        let Some(analysis) = self.analysis.as_mut() else {
            debug!("update_analysis before analyze_and_report: nothing to do");
            return Ok(());
        };
        analysis.set_spot(self.spot_v);
        analysis.set_fail(self.fail_perc);
        analysis.set_threshold(self.seuil);
        analysis.update_analysis()?;

        if self.has_report {
            if let (Some(report), Some(path)) = (self.report.as_mut(), self.report_path.as_ref()) {
                report.clear_report();
                self.has_report = false;
                report.create_report(analysis)?;
                self.has_report = true;
                report.save_report(path)?;
            }
        }
        Ok(())
    }

    /// Re-applies the stylesheet and regenerates the report without touching
    /// the analysis. No-op before the pipeline has run.
    pub fn update_style(&mut self, style: &ReportStyle) -> Result<()> {
        let (Some(analysis), Some(report), Some(path)) = (
            self.analysis.as_ref(),
            self.report.as_mut(),
            self.report_path.as_ref(),
        ) else {
            debug!("update_style before analyze_and_report: nothing to do");
            return Ok(());
        };
        report.clear_report();
        report.set_css_format(style)?;
        self.has_report = false;
        report.create_report(analysis)?;
        self.has_report = true;
        report.save_report(path)?;
        Ok(())
    }

    /// Writes a portable snapshot: the report as a standalone document at
    /// `dest`, with every analysis image copied into `dest`'s directory.
    ///
    /// Does nothing when no report exists.
    pub fn save_analysis(&mut self, dest: impl AsRef<Path>) -> Result<()> {
        if !self.has_report {
            debug!("save_analysis without a report: nothing to do");
            return Ok(());
        }
        let (Some(analysis), Some(report)) = (self.analysis.as_ref(), self.report.as_mut()) else {
            return Ok(());
        };
        report.clear_report();
        report.create_doc(analysis)?;

        let dest = dest.as_ref();
        report.save_report(dest)?;

        let dest_dir = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let report_dir = analysis.base_dir();
        if report_dir.is_dir() {
            for entry in fs::read_dir(report_dir)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) == Some("png") {
                    if let Some(name) = path.file_name() {
                        fs::copy(&path, dest_dir.join(name))?;
                    }
                }
            }
        }
        info!("saved analysis snapshot to {dest:?}");
        Ok(())
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn tester_name(&self) -> Option<&str> {
        self.tester_name.as_deref()
    }

    /// Pulses data.
    pub fn pulses(&self) -> &IvTime {
        &self.pulses
    }

    /// Leakage sweep data, when present.
    pub fn iv_leak(&self) -> Option<&[LeakCurve]> {
        self.iv_leak.as_deref()
    }

    /// Leakage evolution data, when present.
    pub fn leak_evol(&self) -> Option<&[f64]> {
        self.leak_evol.as_deref()
    }

    pub fn tlp_curve(&self) -> &TlpCurve {
        &self.tlp_curve
    }

    pub fn original_file_name(&self) -> &Path {
        &self.original_file_name
    }

    pub fn has_transient_pulses(&self) -> bool {
        self.has_transient_pulses
    }

    pub fn has_leakage_evolution(&self) -> bool {
        self.leak_evol.is_some()
    }

    pub fn has_leakage_ivs(&self) -> bool {
        self.iv_leak.is_some()
    }

    /// True when the last report-generation attempt succeeded.
    pub fn has_report(&self) -> bool {
        self.has_report
    }

    pub fn analysis(&self) -> Option<&TlpAnalysis> {
        self.analysis.as_ref()
    }

    pub fn report(&self) -> Option<&TlpReport> {
        self.report.as_ref()
    }

    pub fn report_path(&self) -> Option<&Path> {
        self.report_path.as_deref()
    }
}

impl fmt::Display for RawTlpData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} pulses", self.pulses.pulses_nb())?;
        write!(f, "Original file: {}", self.original_file_name.display())
    }
}

/// Named wrapper around one measurement run.
#[derive(Debug)]
pub struct Experiment {
    raw_data: RawTlpData,
    exp_name: String,
}

impl Experiment {
    pub fn new(raw_data: RawTlpData) -> Self {
        Self {
            raw_data,
            exp_name: "Unknown".to_string(),
        }
    }

    pub fn raw_data(&self) -> &RawTlpData {
        &self.raw_data
    }

    pub fn raw_data_mut(&mut self) -> &mut RawTlpData {
        &mut self.raw_data
    }

    pub fn exp_name(&self) -> &str {
        &self.exp_name
    }

    pub fn set_exp_name(&mut self, name: impl Into<String>) {
        self.exp_name = name.into();
    }
}

impl fmt::Display for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Experiment")?;
        write!(f, "name: {}", self.exp_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve() -> TlpCurve {
        TlpCurve::new(
            vec![0.0, 0.1, 0.2, 0.3, 0.8, 1.0, 1.2, 1.4],
            vec![0.0, 2.0, 4.0, 5.0, 1.5, 1.7, 1.9, 2.1],
        )
        .unwrap()
    }

    fn pulses() -> IvTime {
        IvTime::new(8, 50, 1e-9)
    }

    fn sweeps(n: usize, scale: f64) -> Vec<LeakCurve> {
        (0..n)
            .map(|k| {
                let leak = 1e-9 * (1.0 + scale * k as f64);
                LeakCurve::new(vec![0.0, 1.0], vec![leak * 0.5, leak * 2.0]).unwrap()
            })
            .collect()
    }

    fn raw(dir: &Path) -> RawTlpData {
        RawTlpData::new(
            "DUT1",
            pulses(),
            sweeps(8, 0.02),
            curve(),
            vec![],
            dir.join("DUT1.csv"),
            Some("oryx TLP".to_string()),
        )
        .unwrap()
    }

    #[test]
    fn empty_device_name_is_rejected() {
        let err = RawTlpData::new(
            "",
            pulses(),
            vec![],
            curve(),
            vec![],
            "/tmp/run/DUT1.csv",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, TlpError::EmptyDeviceName));
    }

    #[test]
    fn pulse_presence_classification() {
        let with = raw(Path::new("/tmp/run"));
        assert!(with.has_transient_pulses());

        let without = RawTlpData::new(
            "DUT1",
            IvTime::new(0, 0, 1e-9),
            vec![],
            curve(),
            vec![],
            "/tmp/run/DUT1.csv",
            None,
        )
        .unwrap();
        assert!(!without.has_transient_pulses());
    }

    #[test]
    fn trivial_leak_evol_is_absent() {
        for evol in [vec![], vec![0.0; 6]] {
            let data = RawTlpData::new(
                "DUT1",
                pulses(),
                vec![],
                curve(),
                evol,
                "/tmp/run/DUT1.csv",
                None,
            )
            .unwrap();
            assert!(!data.has_leakage_evolution());
            assert!(data.leak_evol().is_none());
        }

        let evol = vec![1e-9, 1.1e-9, 2e-9];
        let data = RawTlpData::new(
            "DUT1",
            pulses(),
            vec![],
            curve(),
            evol.clone(),
            "/tmp/run/DUT1.csv",
            None,
        )
        .unwrap();
        assert!(data.has_leakage_evolution());
        assert_eq!(data.leak_evol().unwrap(), evol.as_slice());
    }

    #[test]
    fn empty_iv_leak_is_absent() {
        let none = RawTlpData::new(
            "DUT1",
            pulses(),
            vec![],
            curve(),
            vec![],
            "/tmp/run/DUT1.csv",
            None,
        )
        .unwrap();
        assert!(!none.has_leakage_ivs());
        assert!(none.iv_leak().is_none());

        let some = raw(Path::new("/tmp/run"));
        assert!(some.has_leakage_ivs());
        assert_eq!(some.iv_leak().unwrap().len(), 8);
    }

    #[test]
    fn pipeline_writes_report_and_plots() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = raw(dir.path());
        assert!(!data.has_report());

        data.analyze_and_report(&ReportStyle::default()).unwrap();
        assert!(data.has_report());

        let report_path = dir.path().join("DUT1_report.html");
        assert_eq!(data.report_path().unwrap(), report_path);
        assert!(report_path.exists());
        assert!(dir.path().join("report_analysis").is_dir());
        assert!(dir
            .path()
            .join("report_analysis")
            .join("DUT1_tlp.png")
            .exists());

        let html = fs::read_to_string(&report_path).unwrap();
        assert!(html.contains("DUT1"));
        assert!(html.contains("report_analysis/DUT1_tlp.png"));
    }

    #[test]
    fn iv_sweeps_take_precedence_over_evolution() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = RawTlpData::new(
            "DUT1",
            pulses(),
            sweeps(3, 0.02),
            curve(),
            vec![1e-9; 8],
            dir.path().join("DUT1.csv"),
            None,
        )
        .unwrap();
        data.analyze_and_report(&ReportStyle::default()).unwrap();
        // Three sweeps, eight evolution entries: the sweep count wins.
        assert_eq!(data.analysis().unwrap().derived().leak_evolution.len(), 3);
    }

    #[test]
    fn update_analysis_overwrites_report_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = raw(dir.path());
        data.analyze_and_report(&ReportStyle::default()).unwrap();
        let path = data.report_path().unwrap().to_path_buf();
        let before = fs::read_to_string(&path).unwrap();

        data.spot_v = 1.0;
        data.update_analysis().unwrap();
        assert_eq!(data.report_path().unwrap(), path);
        let after = fs::read_to_string(&path).unwrap();
        assert_ne!(before, after);
        assert!(data.has_report());
    }

    #[test]
    fn update_before_pipeline_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = raw(dir.path());
        data.update_analysis().unwrap();
        data.update_style(&ReportStyle::default()).unwrap();
        assert!(!data.has_report());
        assert!(!dir.path().join("DUT1_report.html").exists());
    }

    #[test]
    fn update_style_changes_presentation_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = raw(dir.path());
        data.analyze_and_report(&ReportStyle::default()).unwrap();
        let path = data.report_path().unwrap().to_path_buf();
        let trigger_before = data.analysis().unwrap().derived().trigger;

        let css = dir.path().join("alt.css");
        fs::write(&css, "body { background: #111; }").unwrap();
        let style = ReportStyle::builder().css(Some(css)).build().unwrap();
        data.update_style(&style).unwrap();

        let html = fs::read_to_string(&path).unwrap();
        assert!(html.contains("background: #111"));
        assert_eq!(data.analysis().unwrap().derived().trigger, trigger_before);
    }

    #[test]
    fn save_analysis_without_report_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = raw(dir.path());
        let dest = dir.path().join("snapshot").join("out.html");
        data.save_analysis(&dest).unwrap();
        assert!(!dest.exists());
    }

    #[test]
    fn save_analysis_produces_portable_snapshot() {
        let src = tempfile::tempdir().unwrap();
        let snap = tempfile::tempdir().unwrap();
        let mut data = raw(src.path());
        data.analyze_and_report(&ReportStyle::default()).unwrap();

        let dest = snap.path().join("DUT1_snapshot.html");
        data.save_analysis(&dest).unwrap();

        let html = fs::read_to_string(&dest).unwrap();
        assert_eq!(html, data.report().unwrap().output());
        // Standalone document: images by bare name, copied alongside.
        assert!(html.contains("src=\"DUT1_tlp.png\""));
        assert!(snap.path().join("DUT1_tlp.png").exists());
        assert!(snap.path().join("DUT1_leakage.png").exists());
    }

    #[test]
    fn apply_config_copies_tunables() {
        let mut data = raw(Path::new("/tmp/run"));
        let config: AnalysisConfig = toml::from_str("spot_v = 2.0\nseuil = -0.8\n").unwrap();
        data.apply_config(&config);
        assert_eq!(data.spot_v, 2.0);
        assert_eq!(data.seuil, -0.8);
        assert_eq!(data.fail_perc, crate::config::DEFAULT_FAIL_PERC);
    }

    #[test]
    fn experiment_wraps_and_renames() {
        let data = raw(Path::new("/tmp/run"));
        let mut exp = Experiment::new(data);
        assert_eq!(exp.exp_name(), "Unknown");
        exp.set_exp_name("HBM corner lot");
        assert_eq!(exp.exp_name(), "HBM corner lot");
        assert_eq!(exp.raw_data().device_name(), "DUT1");
    }

    #[test]
    fn display_mirrors_pulse_count_and_source() {
        let data = raw(Path::new("/tmp/run"));
        let text = data.to_string();
        assert!(text.starts_with("8 pulses"));
        assert!(text.contains("DUT1.csv"));
    }
}
