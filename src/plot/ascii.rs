//! ASCII plotting for terminal output.
//!
//! Fixed-size grid, deterministic output:
//! - histogram bars: `#`
//! - fitted curve (expected counts per bin): `*`

use crate::fit::BinnedModel;
use crate::histogram::Histogram;

/// Render `histogram` as bars with an optional curve of `(energy, counts)` points.
pub fn render_histogram_plot(
    histogram: &Histogram,
    curve: Option<&[(f64, f64)]>,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(4);
    let height = height.max(4);
    let (x_min, x_max) = (histogram.min, histogram.max);

    let columns: Vec<f64> = (0..width)
        .map(|c| {
            let x = column_center(c, x_min, x_max, width);
            histogram.bin_index(x).map_or(0.0, |i| histogram.contents[i])
        })
        .collect();

    let mut y_max = columns.iter().cloned().fold(0.0, f64::max);
    if let Some(curve) = curve {
        for &(_, y) in curve {
            if y.is_finite() {
                y_max = y_max.max(y);
            }
        }
    }
    if !(y_max > 0.0) {
        y_max = 1.0;
    }

    let mut grid = vec![vec![' '; width]; height];
    for (c, &content) in columns.iter().enumerate() {
        for (r, row) in grid.iter_mut().enumerate() {
            let level = (height - r) as f64 - 0.5;
            if content >= level / height as f64 * y_max {
                row[c] = '#';
            }
        }
    }

    if let Some(curve) = curve {
        draw_curve(&mut grid, curve, x_min, x_max, y_max);
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: {} E=[{x_min:.3}, {x_max:.3}] eV | counts=[0, {y_max}]\n",
        histogram.name
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

/// Model expected counts per bin, sampled at `points` column centres.
pub fn sample_model_curve<M: BinnedModel + ?Sized>(
    histogram: &Histogram,
    model: &M,
    params: &[f64],
    points: usize,
) -> Vec<(f64, f64)> {
    let points = points.max(2);
    let bin_width = histogram.bin_width();
    (0..points)
        .map(|c| {
            let x = column_center(c, histogram.min, histogram.max, points);
            (x, model.value(x, params) * bin_width)
        })
        .collect()
}

fn column_center(c: usize, x_min: f64, x_max: f64, width: usize) -> f64 {
    x_min + (c as f64 + 0.5) * (x_max - x_min) / width as f64
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = (y / y_max).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], x_min: f64, x_max: f64, y_max: f64) {
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(x, y) in curve {
        if !y.is_finite() {
            prev = None;
            continue;
        }
        let cx = map_x(x, x_min, x_max, width);
        let cy = map_y(y, y_max, height);
        match prev {
            Some((x0, y0)) => draw_line(grid, x0, y0, cx, cy, '*'),
            None => grid[cy][cx] = '*',
        }
        prev = Some((cx, cy));
    }
}

/// Integer line drawing (Bresenham).
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
        if y0 >= 0 && (y0 as usize) < grid.len() && x0 >= 0 && (x0 as usize) < grid[0].len() {
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
