use std::fs;
use std::path::Path;

use serde::Serialize;
use tera::Context;

use crate::analysis::TlpAnalysis;
use crate::config::ReportStyle;
use crate::{Result, TEMPLATES};

/// Built-in stylesheet, used when the caller supplies none.
pub const DEFAULT_CSS: &str = include_str!("../../styles/report.css");

/// Relative path under which `create_report` expects the analysis images.
const IMAGE_DIR_PREFIX: &str = "report_analysis/";

#[derive(Debug, Clone, Serialize)]
struct TriggerView {
    index: usize,
    vt1: String,
    it1: String,
}

#[derive(Debug, Clone, Serialize)]
struct FailureView {
    index: usize,
    vt2: String,
    it2: String,
    drift_perc: String,
}

#[derive(Debug, Clone, Serialize)]
struct FitView {
    ron: String,
    v_holding: String,
}

#[derive(Debug, Clone, Serialize)]
struct LeakRow {
    index: usize,
    leak: String,
}

#[derive(Debug, Clone, Serialize)]
struct ImageView {
    name: String,
    src: String,
}

#[derive(Debug, Clone, Serialize)]
struct ReportContext {
    title: String,
    device_name: String,
    points: usize,
    spot_v: f64,
    fail_perc: f64,
    threshold: f64,
    trigger: Option<TriggerView>,
    failure: Option<FailureView>,
    fit: Option<FitView>,
    leak_rows: Vec<LeakRow>,
    images: Vec<ImageView>,
    css: String,
}

fn fmt_volt(x: f64) -> String {
    format!("{x:.3}")
}

fn fmt_amp(x: f64) -> String {
    format!("{x:.3e}")
}

/// HTML analysis report.
///
/// Holds the rendered document text and the active stylesheet. The two render
/// entry points differ only in how images are referenced: [`Self::create_report`]
/// links them under `report_analysis/` next to the report file, while
/// [`Self::create_doc`] links them by bare name for the portable snapshot
/// produced by `save_analysis` (which copies the images alongside the
/// document).
#[derive(Debug, Clone)]
pub struct TlpReport {
    css: String,
    title: Option<String>,
    output: String,
}

impl Default for TlpReport {
    fn default() -> Self {
        Self::new()
    }
}

impl TlpReport {
    pub fn new() -> Self {
        Self {
            css: DEFAULT_CSS.to_string(),
            title: None,
            output: String::new(),
        }
    }

    /// Applies the caller-supplied stylesheet and title.
    pub fn set_css_format(&mut self, style: &ReportStyle) -> Result<()> {
        self.css = match &style.css {
            Some(path) => fs::read_to_string(path)?,
            None => DEFAULT_CSS.to_string(),
        };
        self.title = style.title.clone();
        Ok(())
    }

    /// Renders the working-directory report body.
    pub fn create_report(&mut self, analysis: &TlpAnalysis) -> Result<()> {
        self.output = self.render(analysis, IMAGE_DIR_PREFIX)?;
        Ok(())
    }

    /// Renders a standalone document whose images sit next to it.
    pub fn create_doc(&mut self, analysis: &TlpAnalysis) -> Result<()> {
        self.output = self.render(analysis, "")?;
        Ok(())
    }

    pub fn clear_report(&mut self) {
        self.output.clear();
    }

    /// Writes the rendered document, creating parent directories as needed.
    pub fn save_report(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &self.output)?;
        Ok(())
    }

    /// The rendered document text; empty until a render entry point ran.
    pub fn output(&self) -> &str {
        &self.output
    }

    fn render(&self, analysis: &TlpAnalysis, image_prefix: &str) -> Result<String> {
        let derived = analysis.derived();
        let context = ReportContext {
            title: self
                .title
                .clone()
                .unwrap_or_else(|| format!("{} TLP report", analysis.device_name())),
            device_name: analysis.device_name().to_string(),
            points: analysis.curve().len(),
            spot_v: analysis.spot_v(),
            fail_perc: analysis.fail_perc(),
            threshold: analysis.threshold(),
            trigger: derived.trigger.map(|t| TriggerView {
                index: t.index,
                vt1: fmt_volt(t.vt1),
                it1: fmt_amp(t.it1),
            }),
            failure: derived.failure.map(|f| FailureView {
                index: f.index,
                vt2: fmt_volt(f.vt2),
                it2: fmt_amp(f.it2),
                drift_perc: fmt_volt(f.drift_perc),
            }),
            fit: derived.fit.map(|f| FitView {
                ron: fmt_volt(f.ron),
                v_holding: fmt_volt(f.v_holding),
            }),
            leak_rows: derived
                .leak_evolution
                .iter()
                .enumerate()
                .map(|(index, &leak)| LeakRow {
                    index,
                    leak: fmt_amp(leak),
                })
                .collect(),
            images: derived
                .plots
                .iter()
                .filter_map(|p| p.file_name())
                .map(|name| {
                    let name = name.to_string_lossy().into_owned();
                    ImageView {
                        src: format!("{image_prefix}{name}"),
                        name,
                    }
                })
                .collect(),
            css: self.css.clone(),
        };
        Ok(TEMPLATES.render("report.html", &Context::from_serialize(context)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::TlpCurve;
    use crate::tests::test_work_dir;

    fn analysis() -> TlpAnalysis {
        let curve = TlpCurve::new(vec![0.0, 0.2, 0.8, 1.0], vec![0.0, 2.0, 1.2, 1.4]).unwrap();
        let mut analysis = TlpAnalysis::new(curve);
        analysis.set_device_name("DUT_REP");
        analysis.set_evol_analysis(vec![1e-9, 1.05e-9, 8e-9]);
        analysis.update_analysis().unwrap();
        analysis
    }

    #[test]
    fn report_contains_device_name_and_defaults() {
        let mut report = TlpReport::new();
        report.create_report(&analysis()).unwrap();
        let html = report.output();
        assert!(html.contains("DUT_REP"));
        assert!(html.contains("DUT_REP TLP report"));
        assert!(html.contains(DEFAULT_CSS.trim()));
    }

    #[test]
    fn doc_references_images_by_bare_name() {
        let work_dir = test_work_dir("report_doc_images");
        let mut a = analysis();
        a.set_base_dir(&work_dir);
        a.update_analysis().unwrap();

        let mut report = TlpReport::new();
        report.create_report(&a).unwrap();
        assert!(report.output().contains("report_analysis/DUT_REP_tlp.png"));

        report.create_doc(&a).unwrap();
        assert!(report.output().contains("src=\"DUT_REP_tlp.png\""));
        assert!(!report.output().contains("report_analysis/"));
    }

    #[test]
    fn clear_empties_output() {
        let mut report = TlpReport::new();
        report.create_report(&analysis()).unwrap();
        assert!(!report.output().is_empty());
        report.clear_report();
        assert!(report.output().is_empty());
    }

    #[test]
    fn save_report_writes_document() {
        let work_dir = test_work_dir("report_save");
        let mut report = TlpReport::new();
        report.create_report(&analysis()).unwrap();
        let path = work_dir.join("out.html");
        report.save_report(&path).unwrap();
        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert_eq!(on_disk, report.output());
    }

    #[test]
    fn custom_title_and_css() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"body { color: teal; }").unwrap();
        let style = ReportStyle {
            css: Some(file.path().to_path_buf()),
            title: Some("Qualification run 7".to_string()),
        };
        let mut report = TlpReport::new();
        report.set_css_format(&style).unwrap();
        report.create_report(&analysis()).unwrap();
        assert!(report.output().contains("Qualification run 7"));
        assert!(report.output().contains("color: teal"));
    }
}
