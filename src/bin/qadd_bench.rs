use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use qadd::op::cache::{cache_stats, CacheStats};
use qadd::{quantized_elemwise_add, DType, OpReq, QuantizeElemwiseAddParam, Tensor};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "qadd-bench", version, about = "Benchmark the quantized element-wise add kernel")]
struct Args {
    /// JSON file with a BenchConfig; command line flags are ignored when given
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tensor shape, e.g. 64x256
    #[arg(long, default_value = "64x1024")]
    shape: String,

    /// Calls per worker thread
    #[arg(long, default_value_t = 1000)]
    iters: usize,

    /// Worker threads (each owns its plan cache)
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// dtype of A: int8 or uint8
    #[arg(long, default_value = "uint8")]
    a_dtype: String,

    /// dtype of B: int8 or uint8
    #[arg(long, default_value = "int8")]
    b_dtype: String,

    /// Output dtype: int8, uint8 or int32
    #[arg(long, default_value = "int8")]
    out_dtype: String,

    /// Calibrated output min (requires --calib-max)
    #[arg(long, allow_hyphen_values = true)]
    calib_min: Option<f32>,

    /// Calibrated output max (requires --calib-min)
    #[arg(long)]
    calib_max: Option<f32>,

    /// RNG seed for tensor contents
    #[arg(long, default_value_t = 7)]
    seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BenchConfig {
    shape: Vec<usize>,
    iters: usize,
    threads: usize,
    a_dtype: DType,
    b_dtype: DType,
    out_dtype: DType,
    #[serde(default)]
    param: QuantizeElemwiseAddParam,
    #[serde(default = "default_seed")]
    seed: u64,
}

fn default_seed() -> u64 { 7 }

#[derive(Debug, Serialize)]
struct BenchReport {
    config: BenchConfig,
    calls: usize,
    elapsed_s: f64,
    calls_per_s: f64,
    per_thread_cache: Vec<CacheStats>,
}

fn parse_dtype(s: &str) -> Result<DType> {
    match s.to_lowercase().as_str() {
        "int8" | "s8" => Ok(DType::Int8),
        "uint8" | "u8" => Ok(DType::Uint8),
        "int32" | "s32" => Ok(DType::Int32),
        _ => bail!("unsupported dtype {:?}", s),
    }
}

fn parse_shape(s: &str) -> Result<Vec<usize>> {
    s.split('x').map(|d| d.trim().parse::<usize>().with_context(|| format!("bad dimension {:?} in shape {:?}", d, s))).collect()
}

impl BenchConfig {
    fn from_args(args: &Args) -> Result<Self> {
        if let Some(path) = &args.config {
            let text = std::fs::read_to_string(path).with_context(|| format!("read bench config: {}", path.display()))?;
            return serde_json::from_str(&text).with_context(|| format!("parse bench config: {}", path.display()));
        }
        let param = match (args.calib_min, args.calib_max) {
            (Some(min), Some(max)) => QuantizeElemwiseAddParam::calibrated(min, max),
            (None, None) => QuantizeElemwiseAddParam::default(),
            _ => bail!("--calib-min and --calib-max must be given together"),
        };
        Ok(Self {
            shape: parse_shape(&args.shape)?,
            iters: args.iters,
            threads: args.threads.max(1),
            a_dtype: parse_dtype(&args.a_dtype)?,
            b_dtype: parse_dtype(&args.b_dtype)?,
            out_dtype: parse_dtype(&args.out_dtype)?,
            param,
            seed: args.seed,
        })
    }
}

/// Quantize normal samples into `dtype`, returning the tensor and its real range.
fn random_operand(shape: &[usize], dtype: DType, rng: &mut SmallRng) -> Result<(Tensor, f32, f32)> {
    let n: usize = shape.iter().product();
    let normal = Normal::new(0.0f32, 1.0).context("normal distribution")?;
    let vals: Vec<f32> = (0..n).map(|_| normal.sample(rng)).collect();
    let absmax = vals.iter().fold(0f32, |m, v| m.max(v.abs())).max(1e-3);
    match dtype {
        DType::Int8 => {
            let q = vals.iter().map(|v| (v * 127.5 / absmax).round() as i8).collect();
            Ok((Tensor::from_i8(shape, q)?, -absmax, absmax))
        }
        DType::Uint8 => {
            let q = vals.iter().map(|v| (v.abs() * 255.5 / absmax).round() as u8).collect();
            Ok((Tensor::from_u8(shape, q)?, 0.0, absmax))
        }
        other => bail!("operands must be int8 or uint8, got {:?}", other),
    }
}

fn run_worker(cfg: &BenchConfig, worker: usize, pb: &ProgressBar) -> Result<CacheStats> {
    let mut rng = SmallRng::seed_from_u64(cfg.seed ^ worker as u64);
    let (a, a_min, a_max) = random_operand(&cfg.shape, cfg.a_dtype, &mut rng)?;
    let (b, b_min, b_max) = random_operand(&cfg.shape, cfg.b_dtype, &mut rng)?;
    let inputs = vec![a, b, Tensor::scalar(a_min), Tensor::scalar(a_max), Tensor::scalar(b_min), Tensor::scalar(b_max)];
    let outputs = vec![Tensor::zeros(&cfg.shape, cfg.out_dtype), Tensor::scalar(0.0), Tensor::scalar(0.0)];
    for _ in 0..cfg.iters {
        quantized_elemwise_add(&cfg.param, &inputs, &[OpReq::WriteTo], &outputs).context("quantized add")?;
        pb.inc(1);
    }
    Ok(cache_stats())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let cfg = BenchConfig::from_args(&args)?;

    let calls = cfg.iters * cfg.threads;
    let pb = ProgressBar::new(calls as u64);
    pb.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} calls ({per_sec})").context("progress template")?);

    let pool = rayon::ThreadPoolBuilder::new().num_threads(cfg.threads).build().context("thread pool")?;
    let t0 = Instant::now();
    let per_thread_cache = pool.install(|| (0..cfg.threads).into_par_iter().map(|w| run_worker(&cfg, w, &pb)).collect::<Result<Vec<_>>>())?;
    let dt = t0.elapsed().as_secs_f64();
    pb.finish_and_clear();

    let report = BenchReport { config: cfg, calls, elapsed_s: dt, calls_per_s: if dt > 0.0 { calls as f64 / dt } else { 0.0 }, per_thread_cache };
    println!("{}", serde_json::to_string_pretty(&report).context("serialize report")?);
    Ok(())
}
