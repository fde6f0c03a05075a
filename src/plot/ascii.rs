//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - measured or derived points: one marker character per series
//! - fitted curves: `-` line, drawn first so points overlay it

use crate::domain::{ErrorBucket, GroupFit, PolyFit, RfChannel, SurvFracRecord, freq_key};
use crate::systematics::ComparisonRow;

/// Points drawn with one marker.
#[derive(Debug, Clone)]
pub struct Series {
    pub label: String,
    pub marker: char,
    pub points: Vec<(f64, f64)>,
}

/// A plot: scatter series plus optional curves.
#[derive(Debug, Clone, Default)]
pub struct PlotSpec {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series>,
    pub curves: Vec<Vec<(f64, f64)>>,
}

pub fn render_plot(spec: &PlotSpec, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let all = spec
        .series
        .iter()
        .flat_map(|s| s.points.iter())
        .chain(spec.curves.iter().flatten());
    let Some(((x_min, x_max), (y_min, y_max))) = ranges(all) else {
        return format!("{}: nothing to plot\n", spec.title);
    };
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];
    for curve in &spec.curves {
        draw_curve(&mut grid, curve, x_min, x_max, y_min, y_max);
    }
    for s in &spec.series {
        for &(x, y) in &s.points {
            if x.is_finite() && y.is_finite() {
                grid[map_y(y, y_min, y_max, height)][map_x(x, x_min, x_max, width)] = s.marker;
            }
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{}: {}=[{x_min:.3}, {x_max:.3}] | {}=[{y_min:.4}, {y_max:.4}]\n",
        spec.title, spec.x_label, spec.y_label
    ));
    if spec.series.len() > 1 {
        let legend: Vec<String> = spec.series.iter().map(|s| format!("{} {}", s.marker, s.label)).collect();
        out.push_str(&format!("  {}\n", legend.join("  ")));
    }
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

/// DC On/Off ratio and extracted E² vs detected power of one curve, with their fits.
#[allow(clippy::too_many_arguments)]
pub fn quench_curve_plots(
    records: &[SurvFracRecord],
    extracted: &[(f64, f64)],
    quench_fit: Option<&GroupFit>,
    field_fit: Option<&GroupFit>,
    channel: RfChannel,
    freq_mhz: f64,
    width: usize,
    height: usize,
) -> String {
    let ratio_points: Vec<(f64, f64)> = records
        .iter()
        .filter(|r| r.channel == channel && freq_key(r.freq_mhz) == freq_key(freq_mhz))
        .map(|r| (r.detected_power_mw, r.dc_ratio))
        .collect();

    let ratio = PlotSpec {
        title: format!("Quench curve {channel} {freq_mhz:.3} MHz"),
        x_label: "P [mW]".to_string(),
        y_label: "DC On/Off".to_string(),
        series: vec![Series {
            label: "measured".to_string(),
            marker: 'o',
            points: ratio_points,
        }],
        curves: quench_fit.map(|g| sample_fit(&g.fit, width)).into_iter().collect(),
    };
    let field = PlotSpec {
        title: format!("Extracted field {channel} {freq_mhz:.3} MHz"),
        x_label: "P [mW]".to_string(),
        y_label: "E² [V²/cm²]".to_string(),
        series: vec![Series {
            label: "extracted".to_string(),
            marker: 'o',
            points: extracted.to_vec(),
        }],
        curves: field_fit.map(|g| sample_fit(&g.fit, width)).into_iter().collect(),
    };

    let mut out = render_plot(&ratio, width, height);
    out.push('\n');
    out.push_str(&render_plot(&field, width, height));
    out
}

/// Detected power vs frequency of the three offset variants.
pub fn comparison_plot(rows: &[&ComparisonRow], channel: RfChannel, e_field: f64, width: usize, height: usize) -> String {
    let pick = |f: fn(&ComparisonRow) -> Option<f64>| -> Vec<(f64, f64)> {
        rows.iter().filter_map(|r| Some((r.freq_mhz, f(r)?))).collect()
    };
    let spec = PlotSpec {
        title: format!("Detected power at {e_field} V/cm, channel {channel}"),
        x_label: "f [MHz]".to_string(),
        y_label: "P [mW]".to_string(),
        series: vec![
            Series {
                label: "nominal".to_string(),
                marker: 'N',
                points: pick(|r| Some(r.nominal_mw)),
            },
            Series {
                label: "half".to_string(),
                marker: 'H',
                points: pick(|r| r.half_mw),
            },
            Series {
                label: "plus_half".to_string(),
                marker: 'P',
                points: pick(|r| r.plus_half_mw),
            },
        ],
        curves: Vec::new(),
    };
    render_plot(&spec, width, height)
}

/// Mean fractional power error (%) vs E².
pub fn error_plot(half: &[ErrorBucket], plus_half: &[ErrorBucket], width: usize, height: usize) -> String {
    let points = |b: &[ErrorBucket]| -> Vec<(f64, f64)> {
        b.iter().map(|b| (b.power_proportional, b.mean_fractional_error_pct)).collect()
    };
    let spec = PlotSpec {
        title: "Fractional power error".to_string(),
        x_label: "E² [V²/cm²]".to_string(),
        y_label: "error [%]".to_string(),
        series: vec![
            Series {
                label: "half".to_string(),
                marker: 'H',
                points: points(half),
            },
            Series {
                label: "plus_half".to_string(),
                marker: 'P',
                points: points(plus_half),
            },
        ],
        curves: Vec::new(),
    };
    render_plot(&spec, width, height)
}

fn sample_fit(fit: &PolyFit, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    let lo = if fit.basis.intercept { fit.x_min } else { 0.0 };
    (0..n)
        .map(|i| {
            let x = lo + (fit.x_max - lo) * i as f64 / (n as f64 - 1.0);
            (x, fit.eval(x))
        })
        .collect()
}

fn ranges<'a>(points: impl Iterator<Item = &'a (f64, f64)>) -> Option<((f64, f64), (f64, f64))> {
    let mut x = (f64::INFINITY, f64::NEG_INFINITY);
    let mut y = (f64::INFINITY, f64::NEG_INFINITY);
    for &(px, py) in points.filter(|(a, b)| a.is_finite() && b.is_finite()) {
        x = (x.0.min(px), x.1.max(px));
        y = (y.0.min(py), y.1.max(py));
    }
    if !(x.0.is_finite() && y.0.is_finite()) {
        return None;
    }
    if x.1 <= x.0 {
        x = pad_range(x.0, x.1, 0.5);
    }
    if y.1 <= y.0 {
        y = pad_range(y.0, y.1, 0.5);
    }
    Some((x, y))
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], x_min: f64, x_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(x, y) in curve.iter().filter(|(x, y)| x.is_finite() && y.is_finite()) {
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        if let Some((c0, r0)) = prev {
            draw_line(grid, c0, r0, col, row, '-');
        } else {
            grid[row][col] = '-';
        }
        prev = Some((col, row));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plot_golden_snapshot_small() {
        let spec = PlotSpec {
            title: "t".to_string(),
            x_label: "x".to_string(),
            y_label: "y".to_string(),
            series: vec![Series {
                label: "obs".to_string(),
                marker: 'o',
                points: vec![(1.0, 100.0), (10.0, 110.0)],
            }],
            curves: vec![vec![(1.0, 100.0), (10.0, 100.0)]],
        };

        let txt = render_plot(&spec, 10, 5);
        let expected = concat!(
            "t: x=[1.000, 10.000] | y=[99.5000, 110.5000]\n",
            "         o\n",
            "          \n",
            "          \n",
            "          \n",
            "o---------\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn empty_plot_says_so() {
        let spec = PlotSpec {
            title: "empty".to_string(),
            ..PlotSpec::default()
        };
        assert_eq!(render_plot(&spec, 20, 5), "empty: nothing to plot\n");
    }

    #[test]
    fn legend_lists_markers() {
        let spec = PlotSpec {
            title: "two".to_string(),
            x_label: "x".to_string(),
            y_label: "y".to_string(),
            series: vec![
                Series {
                    label: "half".to_string(),
                    marker: 'H',
                    points: vec![(0.0, 0.0)],
                },
                Series {
                    label: "plus_half".to_string(),
                    marker: 'P',
                    points: vec![(1.0, 1.0)],
                },
            ],
            curves: Vec::new(),
        };
        let txt = render_plot(&spec, 20, 5);
        assert!(txt.lines().nth(1).unwrap().contains("H half  P plus_half"));
    }
}
