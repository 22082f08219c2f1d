//! PNG report artifact: per-subject accuracy, aggregate confusion matrix and
//! the first few training loss curves, side by side.

use std::io::Cursor;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::*;
use crate::pipeline::error::PipelineError;
use crate::pipeline::validate::ValidationSummary;

const CLASS_NAMES: [&str; 2] = ["Relax", "Focus"];
const MAX_LOSS_CURVES: usize = 5;

#[derive(Clone, Debug)]
pub struct ReportStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub palette: Vec<RGBColor>,
}

impl Default for ReportStyle {
    fn default() -> Self {
        Self {
            width: 1800,
            height: 600,
            background: WHITE,
            palette: vec![BLUE, RED, GREEN, CYAN, MAGENTA],
        }
    }
}

pub fn render_summary_png(
    summary: &ValidationSummary,
    style: ReportStyle,
) -> Result<Vec<u8>, PipelineError> {
    if summary.folds.is_empty() {
        return Err(PipelineError::Plot("summary has no folds".into()));
    }
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let panels = root.split_evenly((1, 3));
        draw_accuracy_panel(&panels[0], summary)?;
        draw_confusion_panel(&panels[1], summary)?;
        draw_loss_panel(&panels[2], summary, &style)?;
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}

fn draw_accuracy_panel(
    area: &DrawingArea<BitMapBackend<'_>, plotters::coord::Shift>,
    summary: &ValidationSummary,
) -> Result<(), PipelineError> {
    let n = summary.folds.len();
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .caption("Accuracy by Subject", ("sans-serif", 20))
        .set_label_area_size(LabelAreaPosition::Left, 45)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(-0.5f64..n as f64 - 0.5, 0f64..1f64)?;
    chart.configure_mesh().light_line_style(&BLACK.mix(0.1)).draw()?;
    chart.draw_series(summary.folds.iter().enumerate().map(|(i, fold)| {
        let color = if fold.accuracy >= 0.7 {
            GREEN
        } else if fold.accuracy >= 0.6 {
            RGBColor(255, 165, 0)
        } else {
            RED
        };
        Rectangle::new(
            [(i as f64 - 0.4, 0.0), (i as f64 + 0.4, fold.accuracy)],
            color.filled(),
        )
    }))?;
    chart
        .draw_series(LineSeries::new(
            [
                (-0.5, summary.mean_accuracy),
                (n as f64 - 0.5, summary.mean_accuracy),
            ],
            RED.stroke_width(2),
        ))?
        .label(format!("Mean: {:.3}", summary.mean_accuracy))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
    chart
        .configure_series_labels()
        .border_style(&BLACK.mix(0.2))
        .draw()?;
    Ok(())
}

fn draw_confusion_panel(
    area: &DrawingArea<BitMapBackend<'_>, plotters::coord::Shift>,
    summary: &ValidationSummary,
) -> Result<(), PipelineError> {
    let total = summary.total_confusion;
    let max_count = total.iter().flatten().copied().max().unwrap_or(1).max(1);
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .caption("Overall Confusion Matrix", ("sans-serif", 20))
        .set_label_area_size(LabelAreaPosition::Left, 55)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(0f64..2f64, 0f64..2f64)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(2)
        .y_labels(2)
        .x_label_formatter(&|v| CLASS_NAMES.get(*v as usize).unwrap_or(&"").to_string())
        .y_label_formatter(&|v| {
            // Actual classes run top to bottom.
            CLASS_NAMES.get(1 - (*v as usize).min(1)).unwrap_or(&"").to_string()
        })
        .draw()?;
    for (row, counts) in total.iter().enumerate() {
        for (col, &count) in counts.iter().enumerate() {
            let intensity = count as f64 / max_count as f64;
            let fill = BLUE.mix(0.15 + 0.85 * intensity);
            let x0 = col as f64;
            let y0 = 1.0 - row as f64;
            chart.draw_series(std::iter::once(Rectangle::new(
                [(x0, y0), (x0 + 1.0, y0 + 1.0)],
                fill.filled(),
            )))?;
            chart.draw_series(std::iter::once(Text::new(
                count.to_string(),
                (x0 + 0.45, y0 + 0.5),
                ("sans-serif", 24).into_font().color(&BLACK),
            )))?;
        }
    }
    Ok(())
}

fn draw_loss_panel(
    area: &DrawingArea<BitMapBackend<'_>, plotters::coord::Shift>,
    summary: &ValidationSummary,
    style: &ReportStyle,
) -> Result<(), PipelineError> {
    let curves: Vec<&[f64]> = summary
        .folds
        .iter()
        .map(|f| f.loss_curve.as_slice())
        .filter(|c| !c.is_empty())
        .take(MAX_LOSS_CURVES)
        .collect();
    let max_len = curves.iter().map(|c| c.len()).max().unwrap_or(1);
    let max_loss = curves
        .iter()
        .flat_map(|c| c.iter().copied())
        .fold(0.0f64, f64::max)
        .max(1e-3);
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .caption("Training Loss Curves", ("sans-serif", 20))
        .set_label_area_size(LabelAreaPosition::Left, 45)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(0f64..max_len as f64, 0f64..max_loss * 1.05)?;
    chart.configure_mesh().light_line_style(&BLACK.mix(0.1)).draw()?;
    for (idx, curve) in curves.iter().enumerate() {
        let color = style.palette[idx % style.palette.len()];
        chart
            .draw_series(LineSeries::new(
                curve.iter().enumerate().map(|(i, &loss)| (i as f64, loss)),
                &color,
            ))?
            .label(summary.folds[idx].subject.clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }
    if !curves.is_empty() {
        chart
            .configure_series_labels()
            .border_style(&BLACK.mix(0.2))
            .draw()?;
    }
    Ok(())
}

fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, PipelineError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| PipelineError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
