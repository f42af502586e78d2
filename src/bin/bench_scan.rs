use chain_scan::chainscan::{ChainScan, ChainScanConfig};
use chain_scan::serial::exclusive_scan_serial;
use rand::RngCore;
use rand::SeedableRng;
use std::env;
use std::time::Instant;

#[derive(Clone, Debug)]
struct BenchConfig {
    items: usize,
    block_size: Option<usize>,
    warmup: u64,
    iters: u64,
    seed: u64,
    threads: Option<usize>,
    json: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            items: 1 << 24,
            block_size: None,
            warmup: 3,
            iters: 30,
            seed: 0xA5A5_5EED_7788_1122,
            threads: None,
            json: false,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct RunResult {
    total_ms: f64,
    avg_ms: f64,
    checksum: u64,
}

fn parse_args() -> BenchConfig {
    let mut cfg = BenchConfig::default();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--items" => {
                if let Some(v) = args.next() {
                    cfg.items = v.parse().expect("--items expects usize");
                }
            }
            "--block-size" => {
                if let Some(v) = args.next() {
                    cfg.block_size = Some(v.parse().expect("--block-size expects usize"));
                }
            }
            "--warmup" => {
                if let Some(v) = args.next() {
                    cfg.warmup = v.parse().expect("--warmup expects u64");
                }
            }
            "--iters" => {
                if let Some(v) = args.next() {
                    cfg.iters = v.parse().expect("--iters expects u64");
                }
            }
            "--seed" => {
                if let Some(v) = args.next() {
                    cfg.seed = if let Some(hex) = v.strip_prefix("0x") {
                        u64::from_str_radix(hex, 16).expect("--seed hex parse failed")
                    } else {
                        v.parse().expect("--seed expects u64")
                    };
                }
            }
            "--threads" => {
                if let Some(v) = args.next() {
                    cfg.threads = Some(v.parse().expect("--threads expects usize"));
                }
            }
            "--json" => {
                cfg.json = true;
            }
            other => panic!("unknown arg: {other}"),
        }
    }
    cfg
}

fn random_input(items: usize, seed: u64) -> Vec<u64> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..items).map(|_| rng.next_u64() & 0xFFFF).collect()
}

fn run_serial(cfg: &BenchConfig, input: &[u64]) -> RunResult {
    for _ in 0..cfg.warmup {
        std::hint::black_box(exclusive_scan_serial(input, 0u64, |a, b| {
            a.wrapping_add(b)
        }));
    }

    let mut checksum = 0u64;
    let start = Instant::now();
    for _ in 0..cfg.iters {
        let out = exclusive_scan_serial(input, 0u64, |a, b| a.wrapping_add(b));
        checksum ^= out.last().copied().unwrap_or(0);
    }
    let total_ms = start.elapsed().as_secs_f64() * 1000.0;

    RunResult {
        total_ms,
        avg_ms: total_ms / cfg.iters as f64,
        checksum,
    }
}

fn run_engine(cfg: &BenchConfig, input: &[u64]) -> RunResult {
    let mut config = ChainScanConfig::default();
    if let Some(t) = cfg.threads {
        config = config.thread_count(t);
    }
    if let Some(b) = cfg.block_size {
        config = config.block_size(b);
    }
    let engine = ChainScan::with_config(config);
    let mut output = vec![0u64; input.len()];

    for _ in 0..cfg.warmup {
        engine.exclusive_scan_in(input, &mut output, 0u64, |a, b| a.wrapping_add(b));
    }

    let mut checksum = 0u64;
    let start = Instant::now();
    for _ in 0..cfg.iters {
        engine.exclusive_scan_in(input, &mut output, 0u64, |a, b| a.wrapping_add(b));
        checksum ^= output.last().copied().unwrap_or(0);
    }
    let total_ms = start.elapsed().as_secs_f64() * 1000.0;

    RunResult {
        total_ms,
        avg_ms: total_ms / cfg.iters as f64,
        checksum,
    }
}

fn main() {
    let cfg = parse_args();
    let input = random_input(cfg.items, cfg.seed);

    let serial = run_serial(&cfg, &input);
    let engine = run_engine(&cfg, &input);
    assert_eq!(
        serial.checksum, engine.checksum,
        "engine output diverged from the serial reference"
    );

    if cfg.json {
        println!(
            "{{\"items\":{},\"warmup\":{},\"iters\":{},\"seed\":{},\"threads\":{},\"serial\":{{\"total_ms\":{:.6},\"avg_ms\":{:.6}}},\"chainscan\":{{\"total_ms\":{:.6},\"avg_ms\":{:.6}}},\"speedup\":{:.6}}}",
            cfg.items,
            cfg.warmup,
            cfg.iters,
            cfg.seed,
            cfg.threads.unwrap_or(0),
            serial.total_ms,
            serial.avg_ms,
            engine.total_ms,
            engine.avg_ms,
            serial.avg_ms / engine.avg_ms,
        );
    } else {
        println!(
            "serial:    total_ms={:.6}, avg_ms={:.6}",
            serial.total_ms, serial.avg_ms
        );
        println!(
            "chainscan: total_ms={:.6}, avg_ms={:.6}, speedup={:.3}x",
            engine.total_ms,
            engine.avg_ms,
            serial.avg_ms / engine.avg_ms,
        );
    }
}
