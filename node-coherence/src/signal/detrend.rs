//! Per-segment trend removal.

/// Trend removed from each segment before tapering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Detrend {
    /// Leave samples untouched.
    #[default]
    None,
    /// Subtract the segment mean.
    Constant,
    /// Subtract the least-squares line through the segment.
    Linear,
}

impl Detrend {
    /// Remove the trend from `x` in place.
    pub fn apply(self, x: &mut [f64]) {
        match self {
            Detrend::None => {}
            Detrend::Constant => remove_mean(x),
            Detrend::Linear => remove_line(x),
        }
    }
}

/// Return a detrended copy of `x`.
pub fn detrend(x: &[f64], kind: Detrend) -> Vec<f64> {
    let mut out = x.to_vec();
    kind.apply(&mut out);
    out
}

fn remove_mean(x: &mut [f64]) {
    if x.is_empty() {
        return;
    }
    let mean = x.iter().sum::<f64>() / x.len() as f64;
    x.iter_mut().for_each(|v| *v -= mean);
}

fn remove_line(x: &mut [f64]) {
    let n = x.len();
    if n < 2 {
        remove_mean(x);
        return;
    }
    let t_mean = (n - 1) as f64 / 2.0;
    let x_mean = x.iter().sum::<f64>() / n as f64;
    let (sxy, sxx) = x
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sxy, sxx), (t, v)| {
            let dt = t as f64 - t_mean;
            (sxy + dt * (v - x_mean), sxx + dt * dt)
        });
    let slope = sxy / sxx;
    for (t, v) in x.iter_mut().enumerate() {
        *v -= x_mean + slope * (t as f64 - t_mean);
    }
}
