use anyhow::{bail, Result};
use itertools_num::linspace;
use ndarray::Array2;
use plotly::common::{ColorScale, ColorScalePalette, DashType, Line, Marker, Mode, Orientation};
use plotly::layout::{Axis, Layout};
use plotly::{Bar, Plot, Scatter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::ClassifierError;
use crate::explain::{mean_abs_importance, FeatureImportance};
use crate::metrics::RocCurve;

/// Overlay the ROC curves of several models with a no-skill diagonal.
///
/// Each entry is `(model name, curve, AUC)`.
pub fn plot_roc_curves(curves: &[(&str, &RocCurve, f64)]) -> Plot {
    let mut plot = Plot::new();

    for (name, roc, auc) in curves {
        plot.add_trace(
            Scatter::new(roc.fpr.clone(), roc.tpr.clone())
                .mode(Mode::Lines)
                .name(&format!("{} (AUC={:.2})", name, auc)),
        );
    }

    let diagonal: Vec<f64> = linspace(0.0, 1.0, 2).collect();
    plot.add_trace(
        Scatter::new(diagonal.clone(), diagonal)
            .mode(Mode::Lines)
            .name("No skill")
            .show_legend(false)
            .line(Line::new().color("black").dash(DashType::Dash)),
    );

    plot.set_layout(
        Layout::new()
            .title("ROC Curves Comparison")
            .x_axis(Axis::new().title("False Positive Rate"))
            .y_axis(Axis::new().title("True Positive Rate")),
    );
    plot
}

/// Beeswarm-style attribution summary.
///
/// One row per feature, most important at the top, showing the attribution of
/// every explained sample; markers are coloured by the (row-normalized)
/// feature value, blue for low and red for high.
pub fn plot_attribution_summary(
    values: &Array2<f64>,
    x: &Array2<f64>,
    feature_names: &[String],
    max_display: usize,
) -> Result<Plot> {
    if values.dim() != x.dim() {
        bail!(ClassifierError::LengthMismatch {
            what: "feature matrix rows",
            expected: values.nrows(),
            actual: x.nrows(),
        });
    }
    let ranked = mean_abs_importance(values, feature_names)?;
    let shown: Vec<&FeatureImportance> = ranked.iter().take(max_display.max(1)).collect();
    let n_shown = shown.len();

    // Fixed seed so the same attributions always render the same plot.
    let mut rng = StdRng::seed_from_u64(0);
    let mut xs = Vec::with_capacity(n_shown * values.nrows());
    let mut ys = Vec::with_capacity(xs.capacity());
    let mut colors = Vec::with_capacity(xs.capacity());

    for (rank, feature) in shown.iter().enumerate() {
        let column = x.column(feature.index);
        let (lo, hi) = column
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let span = hi - lo;
        let position = (n_shown - 1 - rank) as f64;

        for (r, &phi) in values.column(feature.index).iter().enumerate() {
            xs.push(phi);
            ys.push(position + rng.gen_range(-0.3..0.3));
            colors.push(if span > 0.0 { (column[r] - lo) / span } else { 0.5 });
        }
    }

    let tick_values: Vec<f64> = (0..n_shown).map(|i| i as f64).collect();
    let tick_text: Vec<String> = shown.iter().rev().map(|f| f.name.clone()).collect();

    let mut plot = Plot::new();
    plot.add_trace(
        Scatter::new(xs, ys)
            .mode(Mode::Markers)
            .name("Attribution")
            .marker(
                Marker::new()
                    .size(4)
                    .color_array(colors)
                    .color_scale(ColorScale::Palette(ColorScalePalette::Bluered))
                    .show_scale(true),
            ),
    );
    plot.set_layout(
        Layout::new()
            .title("Feature Attribution Summary (fraud class)")
            .height(120 + 28 * n_shown)
            .x_axis(Axis::new().title("Attribution value (impact on fraud probability)"))
            .y_axis(
                Axis::new()
                    .tick_values(tick_values)
                    .tick_text(tick_text)
                    .zero_line(false),
            ),
    );
    Ok(plot)
}

/// Horizontal bar chart of mean |attribution|, most important at the top.
pub fn plot_attribution_importance(importance: &[FeatureImportance], max_display: usize) -> Plot {
    let shown: Vec<&FeatureImportance> = importance.iter().take(max_display.max(1)).collect();
    let names: Vec<String> = shown.iter().rev().map(|f| f.name.clone()).collect();
    let means: Vec<f64> = shown.iter().rev().map(|f| f.mean_abs).collect();

    let mut plot = Plot::new();
    plot.add_trace(
        Bar::new(means, names)
            .orientation(Orientation::Horizontal)
            .name("mean |attribution|"),
    );
    plot.set_layout(
        Layout::new()
            .title("Mean Absolute Attribution")
            .height(120 + 28 * shown.len())
            .x_axis(Axis::new().title("mean(|attribution value|)")),
    );
    plot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roc_plot_has_one_trace_per_model_plus_diagonal() {
        let roc = RocCurve {
            fpr: vec![0.0, 0.0, 1.0],
            tpr: vec![0.0, 1.0, 1.0],
            thresholds: vec![f64::INFINITY, 0.9, 0.1],
        };
        let plot = plot_roc_curves(&[("Random Forest", &roc, 0.987), ("Logistic Regression", &roc, 0.5)]);
        let json = plot.to_json();
        assert!(json.contains("Random Forest (AUC=0.99)"));
        assert!(json.contains("Logistic Regression (AUC=0.50)"));
        assert!(json.contains("ROC Curves Comparison"));
        assert!(json.contains("False Positive Rate"));
    }

    #[test]
    fn summary_limits_features() {
        let values = Array2::from_shape_vec((2, 3), vec![0.1, -2.0, 0.5, -0.1, 1.0, -0.5]).unwrap();
        let x = Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let names: Vec<String> = ["V1", "V2", "V3"].iter().map(|s| s.to_string()).collect();
        let json = plot_attribution_summary(&values, &x, &names, 2).unwrap().to_json();
        assert!(json.contains("V2"));
        assert!(json.contains("V3"));
        assert!(!json.contains("\"V1\""));

        let wrong = Array2::zeros((3, 3));
        assert!(plot_attribution_summary(&values, &wrong, &names, 2).is_err());
    }
}
