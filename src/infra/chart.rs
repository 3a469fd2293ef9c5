// ============================================================
// Layer 6 — Performance Reporter
// ============================================================
// Renders a TrainingHistory as an SVG line chart:
//
//   x: epoch          y: mean training loss (MSE, ratio space)
//   blue line         loss per epoch
//   red circles       epochs that ran with a grown hidden layer
//
// Pure with respect to training state; it only reads the history.

use std::{
    fs,
    path::{Path, PathBuf},
};

use plotters::{coord::Shift, prelude::*};
use thiserror::Error;

use crate::domain::history::TrainingHistory;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("training history is empty, nothing to plot")]
    EmptyHistory,

    #[error("chart rendering failed: {0}")]
    Draw(String),

    #[error("cannot write chart to '{path}'")]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct PerformanceReporter {
    pub title: String,
    pub size:  (u32, u32),
}

impl Default for PerformanceReporter {
    fn default() -> Self {
        Self {
            title: "Compression ratio estimator: training loss".into(),
            size:  (960, 540),
        }
    }
}

impl PerformanceReporter {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Self::default() }
    }

    /// Render into an in-memory SVG document.
    pub fn render_svg(&self, history: &TrainingHistory) -> Result<String, ReportError> {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, self.size).into_drawing_area();
            self.draw(&root, history)?;
            root.present().map_err(|e| ReportError::Draw(e.to_string()))?;
        }
        Ok(svg)
    }

    /// Render to `path`, creating parent directories as needed.
    pub fn render_to_file(&self, history: &TrainingHistory, path: &Path) -> Result<PathBuf, ReportError> {
        let svg = self.render_svg(history)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| ReportError::Io { path: dir.to_path_buf(), source })?;
        }
        fs::write(path, svg).map_err(|source| ReportError::Io { path: path.to_path_buf(), source })?;
        tracing::info!("Training chart written to '{}'", path.display());
        Ok(path.to_path_buf())
    }

    fn draw<DB: DrawingBackend>(
        &self,
        root:    &DrawingArea<DB, Shift>,
        history: &TrainingHistory,
    ) -> Result<(), ReportError> {
        let (Some(first), Some(last)) = (history.epochs().first(), history.last()) else {
            return Err(ReportError::EmptyHistory);
        };
        let err = |e: DrawingAreaErrorKind<DB::ErrorType>| ReportError::Draw(e.to_string());

        let points: Vec<(f64, f64)> = history
            .epochs()
            .iter()
            .filter(|m| m.loss.is_finite())
            .map(|m| (m.epoch as f64, m.loss))
            .collect();
        let y_max = points.iter().map(|p| p.1).fold(0.0f64, f64::max).max(1e-9) * 1.1;
        let x_range = (first.epoch as f64 - 0.5)..(last.epoch as f64 + 0.5);

        root.fill(&WHITE).map_err(err)?;
        let mut chart = ChartBuilder::on(root)
            .margin(10)
            .caption(&self.title, ("sans-serif", 22))
            .set_label_area_size(LabelAreaPosition::Left, 70)
            .set_label_area_size(LabelAreaPosition::Bottom, 45)
            .build_cartesian_2d(x_range, 0.0..y_max)
            .map_err(err)?;

        chart
            .configure_mesh()
            .x_desc("epoch")
            .y_desc("loss (MSE)")
            .y_label_formatter(&|y| format!("{y:.2e}"))
            .draw()
            .map_err(err)?;

        chart
            .draw_series(LineSeries::new(points.iter().copied(), &BLUE))
            .map_err(err)?
            .label("loss")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));

        let growth: Vec<(f64, f64)> = history
            .growth_epochs()
            .into_iter()
            .filter_map(|e| points.iter().find(|p| p.0 == e as f64).copied())
            .collect();
        if !growth.is_empty() {
            chart
                .draw_series(growth.into_iter().map(|p| Circle::new(p, 5, RED.filled())))
                .map_err(err)?
                .label("hidden layer grown")
                .legend(|(x, y)| Circle::new((x + 10, y), 5, RED.filled()));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(err)?;
        Ok(())
    }
}
