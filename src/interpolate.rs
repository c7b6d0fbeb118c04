//! Interior gap filling over irregular timestamps.
//!
//! Every kernel fills only missing values that have a valid observation on
//! both sides. Leading and trailing gaps stay missing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FeatureError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterpolationMethod {
    /// Time-weighted straight line between the bracketing observations.
    Linear,
    Nearest,
    /// Carries the previous observation forward.
    Previous,
    /// Natural cubic spline through every valid observation.
    CubicSpline,
}

impl InterpolationMethod {
    /// Resolves a method name and optional order. `spline` requires an
    /// order of 1 or 3.
    pub fn parse(name: &str, order: Option<u32>) -> Result<Self, FeatureError> {
        let unsupported = || FeatureError::UnsupportedInterpolationOrder {
            method: name.to_string(),
            order,
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "linear" | "time" | "index" | "slinear" => Ok(Self::Linear),
            "nearest" => Ok(Self::Nearest),
            "previous" | "pad" | "ffill" | "zero" => Ok(Self::Previous),
            "cubic" => Ok(Self::CubicSpline),
            "spline" => match order {
                Some(1) => Ok(Self::Linear),
                Some(3) => Ok(Self::CubicSpline),
                _ => Err(unsupported()),
            },
            _ => Err(FeatureError::UnknownInterpolationMethod(name.to_string())),
        }
    }
}

impl fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Linear => "linear",
            Self::Nearest => "nearest",
            Self::Previous => "previous",
            Self::CubicSpline => "cubic_spline",
        };
        f.write_str(name)
    }
}

/// Returns `values` with interior gaps filled. `timestamps` must be strictly
/// increasing and the same length as `values`.
pub fn fill_interior(
    method: InterpolationMethod,
    timestamps: &[i64],
    values: &[Option<f64>],
) -> Vec<Option<f64>> {
    let known: Vec<usize> = values
        .iter()
        .enumerate()
        .filter_map(|(idx, v)| v.map(|_| idx))
        .collect();

    let mut out = values.to_vec();
    if known.len() < 2 || known.len() == values.len() {
        return out;
    }

    let origin = timestamps[known[0]];
    let xs: Vec<f64> = known
        .iter()
        .map(|&idx| seconds_from(origin, timestamps[idx]))
        .collect();
    let ys: Vec<f64> = known.iter().filter_map(|&idx| values[idx]).collect();
    let spline = match method {
        InterpolationMethod::CubicSpline if xs.len() >= 3 => {
            Some(NaturalCubicSpline::fit(&xs, &ys))
        }
        _ => None,
    };

    for (k, segment) in known.windows(2).enumerate() {
        let (left, right) = (segment[0], segment[1]);
        if right == left + 1 {
            continue;
        }
        for idx in left + 1..right {
            let x = seconds_from(origin, timestamps[idx]);
            let filled = match (method, &spline) {
                (InterpolationMethod::CubicSpline, Some(spline)) => spline.eval_in(k, x),
                (InterpolationMethod::Nearest, _) => {
                    if x - xs[k] <= xs[k + 1] - x {
                        ys[k]
                    } else {
                        ys[k + 1]
                    }
                }
                (InterpolationMethod::Previous, _) => ys[k],
                _ => lerp(xs[k], ys[k], xs[k + 1], ys[k + 1], x),
            };
            out[idx] = Some(filled);
        }
    }

    out
}

fn seconds_from(origin: i64, ts: i64) -> f64 {
    (ts - origin) as f64 / 1_000.0
}

fn lerp(x0: f64, y0: f64, x1: f64, y1: f64, x: f64) -> f64 {
    let span = x1 - x0;
    if span.abs() < f64::EPSILON {
        return y0;
    }
    y0 + (y1 - y0) * ((x - x0) / span)
}

/// Interpolating cubic spline with zero second derivative at both ends.
#[derive(Debug, Clone)]
struct NaturalCubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    second: Vec<f64>,
}

impl NaturalCubicSpline {
    fn fit(xs: &[f64], ys: &[f64]) -> Self {
        let n = xs.len();
        let mut second = vec![0.0; n];
        if n >= 3 {
            // Thomas algorithm over the interior knots.
            let m = n - 2;
            let mut diag = vec![0.0; m];
            let mut upper = vec![0.0; m];
            let mut rhs = vec![0.0; m];
            for i in 0..m {
                let h0 = xs[i + 1] - xs[i];
                let h1 = xs[i + 2] - xs[i + 1];
                diag[i] = 2.0 * (h0 + h1);
                upper[i] = h1;
                rhs[i] = 6.0 * ((ys[i + 2] - ys[i + 1]) / h1 - (ys[i + 1] - ys[i]) / h0);
            }
            for i in 1..m {
                let lower = xs[i + 1] - xs[i];
                let w = lower / diag[i - 1];
                diag[i] -= w * upper[i - 1];
                rhs[i] -= w * rhs[i - 1];
            }
            let mut solved = vec![0.0; m];
            solved[m - 1] = rhs[m - 1] / diag[m - 1];
            for i in (0..m.saturating_sub(1)).rev() {
                solved[i] = (rhs[i] - upper[i] * solved[i + 1]) / diag[i];
            }
            second[1..(m + 1)].copy_from_slice(&solved);
        }
        Self {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            second,
        }
    }

    /// Evaluates on the interval `[xs[k], xs[k + 1]]`.
    fn eval_in(&self, k: usize, x: f64) -> f64 {
        let h = self.xs[k + 1] - self.xs[k];
        let a = (self.xs[k + 1] - x) / h;
        let b = (x - self.xs[k]) / h;
        a * self.ys[k]
            + b * self.ys[k + 1]
            + ((a * a * a - a) * self.second[k] + (b * b * b - b) * self.second[k + 1]) * h * h
                / 6.0
    }
}
