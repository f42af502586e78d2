//! Protocol micro-benchmark: per-block look-back overhead.
//!
//! Shrinking the block size at a fixed item count raises the block count,
//! so the protocol round trips (publish, backward walk, complete) dominate
//! the runtime and the blocks/s figure tracks raw protocol cost.

use chain_scan::chainscan::{ChainScan, ChainScanConfig};
use rand::RngCore;
use rand::SeedableRng;
use std::env;
use std::time::Instant;

const BLOCK_SIZES: [usize; 4] = [1, 64, 4_096, 65_536];

#[derive(Clone, Debug)]
struct BenchConfig {
    items: usize,
    iters: u64,
    seed: u64,
    threads: Option<usize>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            items: 1 << 20,
            iters: 20,
            seed: 0xBEEF_CAFE_0123_4567,
            threads: None,
        }
    }
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
            "--iters" => {
                if let Some(v) = args.next() {
                    cfg.iters = v.parse().expect("--iters expects u64");
                }
            }
            "--seed" => {
                if let Some(v) = args.next() {
                    cfg.seed = v.parse().expect("--seed expects u64");
                }
            }
            "--threads" => {
                if let Some(v) = args.next() {
                    cfg.threads = Some(v.parse().expect("--threads expects usize"));
                }
            }
            other => panic!("unknown arg: {other}"),
        }
    }
    cfg
}

fn main() {
    let cfg = parse_args();
    let mut rng = rand::rngs::StdRng::seed_from_u64(cfg.seed);
    let input: Vec<u32> = (0..cfg.items).map(|_| rng.next_u64() as u32 & 0xFF).collect();
    let mut output = vec![0u32; cfg.items];

    for block_size in BLOCK_SIZES {
        let mut config = ChainScanConfig::default().block_size(block_size);
        if let Some(t) = cfg.threads {
            config = config.thread_count(t);
        }
        let engine = ChainScan::with_config(config);
        let blocks = cfg.items.div_ceil(block_size);

        // One warmup pass to fault in the buffers.
        engine.exclusive_scan_in(&input, &mut output, 0u32, |a, b| a.wrapping_add(b));

        let start = Instant::now();
        for _ in 0..cfg.iters {
            engine.exclusive_scan_in(&input, &mut output, 0u32, |a, b| a.wrapping_add(b));
        }
        let elapsed = start.elapsed();
        std::hint::black_box(output.last().copied());

        let avg_ms = elapsed.as_secs_f64() * 1000.0 / cfg.iters as f64;
        let blocks_per_sec = blocks as f64 * cfg.iters as f64 / elapsed.as_secs_f64();
        println!(
            "block_size={block_size:>6}: blocks={blocks:>8}, avg_ms={avg_ms:.6}, blocks/s={blocks_per_sec:.0}"
        );
    }
}
