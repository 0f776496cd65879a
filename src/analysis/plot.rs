use std::ops::Range;
use std::path::Path;

use plotters::prelude::*;

use crate::analysis::{FailurePoint, TriggerPoint};
use crate::curve::TlpCurve;
use crate::Result;

const PLOT_SIZE: (u32, u32) = (800, 600);

fn padded_range(values: &[f64]) -> Range<f64> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &v in values {
        if v.is_finite() {
            lo = lo.min(v);
            hi = hi.max(v);
        }
    }
    if !lo.is_finite() || !hi.is_finite() {
        return -1.0..1.0;
    }
    let pad = ((hi - lo) * 0.05).max(lo.abs().max(hi.abs()) * 1e-3).max(1e-12);
    (lo - pad)..(hi + pad)
}

/// Renders the TLP I-V curve with the triggering and failure points marked.
pub fn plot_tlp_curve(
    curve: &TlpCurve,
    trigger: Option<&TriggerPoint>,
    failure: Option<&FailurePoint>,
    caption: &str,
    output_path: &Path,
) -> Result<()> {
    let root = BitMapBackend::new(output_path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .x_label_area_size(35)
        .y_label_area_size(50)
        .margin(5)
        .caption(caption, ("sans-serif", 30.0).into_font())
        .build_cartesian_2d(padded_range(curve.voltage()), padded_range(curve.current()))?;

    chart
        .configure_mesh()
        .x_desc("Voltage (V)")
        .y_desc("Current (A)")
        .draw()?;

    chart
        .draw_series(LineSeries::new(
            curve
                .voltage()
                .iter()
                .zip(curve.current())
                .map(|(&v, &i)| (v, i)),
            &BLUE,
        ))?
        .label("TLP curve")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

    if let Some(t) = trigger {
        chart
            .draw_series(std::iter::once(Circle::new((t.vt1, t.it1), 5, RED.filled())))?
            .label("trigger")
            .legend(|(x, y)| Circle::new((x + 10, y), 5, RED.filled()));
    }
    if let Some(f) = failure {
        chart
            .draw_series(std::iter::once(TriangleMarker::new(
                (f.vt2, f.it2),
                7,
                BLACK.filled(),
            )))?
            .label("failure")
            .legend(|(x, y)| TriangleMarker::new((x + 10, y), 7, BLACK.filled()));
    }

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .draw()?;

    root.present()?;
    Ok(())
}

/// Renders the leakage current after each stress level.
pub fn plot_leak_evolution(evolution: &[f64], caption: &str, output_path: &Path) -> Result<()> {
    let root = BitMapBackend::new(output_path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let x_max = evolution.len().saturating_sub(1).max(1) as f64;
    let mut chart = ChartBuilder::on(&root)
        .x_label_area_size(35)
        .y_label_area_size(50)
        .margin(5)
        .caption(caption, ("sans-serif", 30.0).into_font())
        .build_cartesian_2d(0f64..x_max, padded_range(evolution))?;

    chart
        .configure_mesh()
        .x_desc("Pulse index")
        .y_desc("Leakage (A)")
        .draw()?;

    chart.draw_series(LineSeries::new(
        evolution
            .iter()
            .enumerate()
            .filter(|(_, leak)| leak.is_finite())
            .map(|(n, &leak)| (n as f64, leak)),
        &BLUE,
    ))?;
    chart.draw_series(
        evolution
            .iter()
            .enumerate()
            .filter(|(_, leak)| leak.is_finite())
            .map(|(n, &leak)| Circle::new((n as f64, leak), 3, BLUE.filled())),
    )?;

    root.present()?;
    Ok(())
}
