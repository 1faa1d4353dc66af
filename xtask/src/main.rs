use anyhow::{anyhow, bail, Context, Result};
use ndarray::Array4;
use node_coherence::kernel::KernelLifecycle;
use node_coherence::signal::coherence::node_coherence_naive;
use node_coherence::{
    CoherenceResult, Detrend, MultiChannelTimeSeries, NodeCoherence4D, NodeCoherenceConfig,
    NodeCoherenceKernel,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

const DEFAULT_PYTHON_BIN: &str = "python";

const PY_COHERENCE_SCRIPT: &str = r#"
import json
import sys
import time
import numpy as np

env = json.loads(sys.stdin.read())
iters = int(env["iters"])
p = env["payload"]

def _detrend(x, kind):
    if kind == "none":
        return x
    mean = x.mean(axis=-1, keepdims=True)
    if kind == "constant":
        return x - mean
    n = x.shape[-1]
    t = np.arange(n) - (n - 1) / 2.0
    denom = (t * t).sum()
    slope = ((x - mean) * t).sum(axis=-1, keepdims=True) / (denom if denom > 0 else 1.0)
    return x - mean - slope * t

def _compute():
    data = np.asarray(p["data"], dtype=float).reshape(p["shape"])
    nfft = int(p["nfft"])
    nt, ns, nn, nm = data.shape
    nwin = nt // nfft
    x = data[: nwin * nfft].transpose(2, 1, 3, 0).reshape((nn, ns, nm, nwin, nfft))
    x = _detrend(x, p["detrend"]) * np.hamming(nfft)
    spec = np.fft.fft(x, axis=-1)
    cross = (spec[:, None] * spec[None].conj()).mean(axis=4)
    auto = (np.abs(spec) ** 2).mean(axis=3)
    num = cross.imag ** 2 if p["imaginary"] else np.abs(cross) ** 2
    den = auto[:, None] * auto[None]
    coh = np.where(den > 0, num / np.where(den > 0, den, 1.0), 0.0)
    fs = np.fft.fftfreq(nfft, 1e3 / float(p["sample_rate"]))
    if nfft % 2 == 0:
        fs[nfft // 2] = abs(fs[nfft // 2])
    mask = fs > 0
    coh = coh[..., mask].transpose(4, 0, 1, 2, 3)
    return np.concatenate([coh.reshape(-1), fs[mask]])

y = _compute()

t0 = time.perf_counter_ns()
for _ in range(iters):
    _compute()
t1 = time.perf_counter_ns()

print(json.dumps({
    "output": y.tolist(),
    "avg_ns": (t1 - t0) / max(iters, 1),
    "python_version": sys.version.split()[0],
    "numpy_version": np.__version__,
}))
"#;

#[derive(Debug, Serialize, Deserialize, Clone)]
struct PythonEval {
    output: Vec<f64>,
    avg_ns: f64,
    python_version: String,
    numpy_version: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct ContractRow {
    case_id: String,
    pearson_r: f64,
    mae: f64,
    rmse: f64,
    max_abs: f64,
    baseline_max_abs: f64,
    rust_candidate_ns: f64,
    rust_baseline_ns: f64,
    python_ns: f64,
    speedup_vs_baseline: f64,
    speedup_vs_python: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContractBundle {
    generated_epoch_seconds: u64,
    python_executable: String,
    python_version: String,
    numpy_version: String,
    rows: Vec<ContractRow>,
}

struct ContractCase {
    case_id: &'static str,
    shape: [usize; 4],
    sample_rate: f64,
    config: NodeCoherenceConfig,
    seed: u64,
}

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("contracts") => run_contracts(),
        _ => {
            eprintln!("Usage:");
            eprintln!("  cargo run -p xtask -- contracts");
            Ok(())
        }
    }
}

fn contract_cases() -> Vec<ContractCase> {
    vec![
        ContractCase {
            case_id: "coherence_default_nfft",
            shape: [1024, 1, 4, 1],
            sample_rate: 1000.0,
            config: NodeCoherenceConfig::default(),
            seed: 1,
        },
        ContractCase {
            case_id: "coherence_slices_nfft_100",
            shape: [700, 2, 5, 2],
            sample_rate: 250.0,
            config: NodeCoherenceConfig {
                nfft: 100,
                ..NodeCoherenceConfig::default()
            },
            seed: 2,
        },
        ContractCase {
            case_id: "coherence_linear_detrend",
            shape: [2048, 1, 6, 1],
            sample_rate: 2000.0,
            config: NodeCoherenceConfig {
                nfft: 128,
                detrend: Detrend::Linear,
                ..NodeCoherenceConfig::default()
            },
            seed: 3,
        },
        ContractCase {
            case_id: "coherence_imaginary",
            shape: [1024, 1, 4, 2],
            sample_rate: 1000.0,
            config: NodeCoherenceConfig {
                nfft: 64,
                imaginary: true,
                detrend: Detrend::Constant,
            },
            seed: 4,
        },
    ]
}

fn run_contracts() -> Result<()> {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let out_dir = PathBuf::from(format!("target/contracts/{ts}"));
    fs::create_dir_all(&out_dir).context("creating contract output directory")?;

    let python_bin = detect_python_bin();
    let mut rows = Vec::new();
    let mut versions = None;

    for case in contract_cases() {
        let series = synthetic_series(case.shape, case.sample_rate, case.seed)?;
        let kernel = NodeCoherenceKernel::try_new(case.config)
            .map_err(|e| anyhow!("{} kernel config rejected: {e}", case.case_id))?;

        let candidate = flatten_result(
            &kernel
                .run_alloc(&series)
                .map_err(|e| anyhow!("{} candidate execution failed: {e}", case.case_id))?,
        );
        let baseline = flatten_result(
            &node_coherence_naive(&series, case.config)
                .map_err(|e| anyhow!("{} baseline execution failed: {e}", case.case_id))?,
        );
        let py = python_coherence_eval(&python_bin, &series, case.config, 20)?;

        let candidate_ns = benchmark_avg_ns(20, || {
            kernel
                .run_alloc(&series)
                .map(|_| ())
                .map_err(|e| anyhow!("{} candidate benchmark failed: {e}", case.case_id))
        })?;
        let baseline_ns = benchmark_avg_ns(3, || {
            node_coherence_naive(&series, case.config)
                .map(|_| ())
                .map_err(|e| anyhow!("{} baseline benchmark failed: {e}", case.case_id))
        })?;

        ensure_same_length(case.case_id, &candidate, &baseline)?;
        ensure_same_length(case.case_id, &candidate, &py.output)?;
        rows.push(build_row(RowBuildInput {
            case_id: case.case_id,
            rust_candidate: &candidate,
            rust_baseline: &baseline,
            python_reference: &py.output,
            rust_candidate_ns: candidate_ns,
            rust_baseline_ns: baseline_ns,
            python_ns: py.avg_ns,
        }));
        versions.get_or_insert((py.python_version, py.numpy_version));
    }

    let (python_version, numpy_version) =
        versions.unwrap_or_else(|| ("unknown".to_string(), "unknown".to_string()));
    let bundle = ContractBundle {
        generated_epoch_seconds: ts,
        python_executable: python_bin.to_string_lossy().into_owned(),
        python_version,
        numpy_version,
        rows,
    };

    write_summary_csv(&out_dir.join("summary.csv"), &bundle.rows)?;
    fs::write(
        out_dir.join("summary.json"),
        serde_json::to_vec_pretty(&bundle).context("serializing summary bundle")?,
    )
    .context("writing summary.json")?;

    println!("Contract artifacts generated in: {}", out_dir.display());
    println!("  - {}", out_dir.join("summary.csv").display());
    println!("  - {}", out_dir.join("summary.json").display());
    println!("  - cases: {}", bundle.rows.len());

    Ok(())
}

/// Uniform noise plus a tone shared by the first two nodes of every slice.
fn synthetic_series(shape: [usize; 4], sample_rate: f64, seed: u64) -> Result<MultiChannelTimeSeries> {
    let mut rng = StdRng::seed_from_u64(seed);
    let tone_hz = sample_rate / 16.0;
    let data = Array4::from_shape_fn(shape, |(t, _, node, _)| {
        let noise = rng.random_range(-1.0..1.0);
        if node < 2 {
            noise + (2.0 * std::f64::consts::PI * tone_hz * t as f64 / sample_rate).sin()
        } else {
            noise
        }
    });
    MultiChannelTimeSeries::try_new(data, sample_rate)
        .map_err(|e| anyhow!("invalid synthetic series: {e}"))
}

fn flatten_result(result: &CoherenceResult) -> Vec<f64> {
    result
        .coherence
        .iter()
        .chain(result.frequencies.iter())
        .copied()
        .collect()
}

fn detect_python_bin() -> PathBuf {
    PathBuf::from(DEFAULT_PYTHON_BIN)
}

fn python_coherence_eval(
    python_bin: &Path,
    series: &MultiChannelTimeSeries,
    config: NodeCoherenceConfig,
    iters: usize,
) -> Result<PythonEval> {
    let detrend = match config.detrend {
        Detrend::None => "none",
        Detrend::Constant => "constant",
        Detrend::Linear => "linear",
    };
    let data: Vec<f64> = series.data().iter().copied().collect();
    run_python_eval(
        python_bin,
        PY_COHERENCE_SCRIPT,
        json!({
            "iters": iters,
            "payload": {
                "data": data,
                "shape": series.shape(),
                "sample_rate": series.sample_rate(),
                "nfft": config.nfft,
                "imaginary": config.imaginary,
                "detrend": detrend,
            }
        }),
    )
}

fn run_python_eval(
    python_bin: &Path,
    script: &str,
    payload: serde_json::Value,
) -> Result<PythonEval> {
    let mut child = Command::new(python_bin)
        .arg("-c")
        .arg(script)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawning python interpreter at {}", python_bin.display()))?;

    {
        let stdin = child.stdin.as_mut().context("opening python stdin")?;
        let payload_bytes = serde_json::to_vec(&payload).context("serializing python payload")?;
        stdin
            .write_all(&payload_bytes)
            .context("writing payload to python stdin")?;
    }

    let output = child
        .wait_with_output()
        .context("waiting for python process")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("python execution failed: {stderr}");
    }
    let stdout = String::from_utf8(output.stdout).context("parsing python stdout utf8")?;
    let parsed: PythonEval = serde_json::from_str(stdout.trim()).context("parsing python json")?;
    Ok(parsed)
}

fn ensure_same_length(case_id: &str, a: &[f64], b: &[f64]) -> Result<()> {
    if a.len() != b.len() {
        bail!(
            "case {case_id} has mismatched output lengths: left={}, right={}",
            a.len(),
            b.len()
        );
    }
    Ok(())
}

fn benchmark_avg_ns<F>(iters: usize, mut f: F) -> Result<f64>
where
    F: FnMut() -> Result<()>,
{
    let start = Instant::now();
    for _ in 0..iters {
        f()?;
    }
    Ok(start.elapsed().as_nanos() as f64 / iters as f64)
}

struct RowBuildInput<'a> {
    case_id: &'a str,
    rust_candidate: &'a [f64],
    rust_baseline: &'a [f64],
    python_reference: &'a [f64],
    rust_candidate_ns: f64,
    rust_baseline_ns: f64,
    python_ns: f64,
}

fn build_row(args: RowBuildInput<'_>) -> ContractRow {
    ContractRow {
        case_id: args.case_id.to_string(),
        pearson_r: pearson(args.rust_candidate, args.python_reference),
        mae: mean_abs_error(args.rust_candidate, args.python_reference),
        rmse: root_mean_squared_error(args.rust_candidate, args.python_reference),
        max_abs: max_abs_error(args.rust_candidate, args.python_reference),
        baseline_max_abs: max_abs_error(args.rust_candidate, args.rust_baseline),
        rust_candidate_ns: args.rust_candidate_ns,
        rust_baseline_ns: args.rust_baseline_ns,
        python_ns: args.python_ns,
        speedup_vs_baseline: args.rust_baseline_ns / args.rust_candidate_ns,
        speedup_vs_python: args.python_ns / args.rust_candidate_ns,
    }
}

fn mean_abs_error(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .sum::<f64>()
        / a.len() as f64
}

fn root_mean_squared_error(a: &[f64], b: &[f64]) -> f64 {
    (a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f64>()
        / a.len() as f64)
        .sqrt()
}

fn max_abs_error(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let da = *x - mean_a;
        let db = *y - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a == 0.0 || var_b == 0.0 {
        if a == b {
            1.0
        } else {
            0.0
        }
    } else {
        cov / (var_a.sqrt() * var_b.sqrt())
    }
}

fn write_summary_csv(path: &Path, rows: &[ContractRow]) -> Result<()> {
    let mut out = String::new();
    out.push_str("case_id,pearson_r,mae,rmse,max_abs,baseline_max_abs,rust_candidate_ns,rust_baseline_ns,python_ns,speedup_vs_baseline,speedup_vs_python\n");
    for row in rows {
        out.push_str(&format!(
            "{},{:.12},{:.12},{:.12},{:.12},{:.12},{:.3},{:.3},{:.3},{:.6},{:.6}\n",
            row.case_id,
            row.pearson_r,
            row.mae,
            row.rmse,
            row.max_abs,
            row.baseline_max_abs,
            row.rust_candidate_ns,
            row.rust_baseline_ns,
            row.python_ns,
            row.speedup_vs_baseline,
            row.speedup_vs_python,
        ));
    }
    fs::write(path, out).with_context(|| format!("writing {}", path.display()))
}
