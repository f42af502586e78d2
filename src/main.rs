#[cfg(feature = "mimalloc-global")]
#[global_allocator]
static GLOBAL_ALLOCATOR: mimalloc::MiMalloc = mimalloc::MiMalloc;

use chain_scan::chainscan::{ChainScan, ChainScanConfig};
use chain_scan::serial::exclusive_scan_serial;
use rand::RngCore;
use rand::SeedableRng;
use std::time::Instant;

const DEFAULT_ITEMS: usize = 1 << 24;
const TOTAL_ITERATIONS: u64 = 100;
const CHECK_INTERVAL: u64 = 20;
const SEED: u64 = 0x5EED_1234_ABCD_EF01;

struct MainArgs {
    config: ChainScanConfig,
    items: usize,
    pgo_train: bool,
}

fn parse_args() -> MainArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ChainScanConfig::default();
    let mut items = DEFAULT_ITEMS;
    let mut pgo_train = false;
    let next_arg = |i: usize, flag: &str| -> &str {
        args.get(i)
            .map(String::as_str)
            .unwrap_or_else(|| panic!("{flag} requires a value"))
    };
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--threads" => {
                i += 1;
                let n: usize = next_arg(i, "--threads")
                    .parse()
                    .expect("--threads requires a positive integer");
                config = config.thread_count(n);
            }
            "--max-threads" => {
                i += 1;
                let n: usize = next_arg(i, "--max-threads")
                    .parse()
                    .expect("--max-threads requires a positive integer");
                config = config.max_threads(n);
            }
            "--block-size" => {
                i += 1;
                let n: usize = next_arg(i, "--block-size")
                    .parse()
                    .expect("--block-size requires a positive integer");
                config = config.block_size(n);
            }
            "--items" => {
                i += 1;
                items = next_arg(i, "--items")
                    .parse()
                    .expect("--items requires a positive integer");
            }
            "--pgo-train" => {
                pgo_train = true;
            }
            other => panic!(
                "unknown argument: {other}\nusage: chain-scan [--threads N] [--max-threads N] [--block-size N] [--items N] [--pgo-train]"
            ),
        }
        i += 1;
    }
    MainArgs {
        config,
        items,
        pgo_train,
    }
}

fn random_input(items: usize) -> Vec<u64> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(SEED);
    (0..items).map(|_| rng.next_u64() & 0xFFFF).collect()
}

fn run_checked(config: ChainScanConfig, items: usize) {
    let engine = ChainScan::with_config(config);
    let input = random_input(items);
    let mut output = vec![0u64; items];

    let mut serial_total = std::time::Duration::ZERO;
    let mut engine_total = std::time::Duration::ZERO;

    for checkpoint in 1..=(TOTAL_ITERATIONS / CHECK_INTERVAL) {
        let iteration = checkpoint * CHECK_INTERVAL;

        let start = Instant::now();
        let mut expected = Vec::new();
        for _ in 0..CHECK_INTERVAL {
            expected = exclusive_scan_serial(&input, 0u64, |a, b| a.wrapping_add(b));
        }
        serial_total += start.elapsed();

        let start = Instant::now();
        for _ in 0..CHECK_INTERVAL {
            engine.exclusive_scan_in(&input, &mut output, 0u64, |a, b| a.wrapping_add(b));
        }
        engine_total += start.elapsed();

        let match_status = if output == expected { "MATCH" } else { "MISMATCH" };
        let last = output.last().copied().unwrap_or(0);
        println!("Iteration {iteration}: tail prefix = {last} [{match_status}]");
    }

    let serial_ms = serial_total.as_secs_f64() * 1000.0;
    let engine_ms = engine_total.as_secs_f64() * 1000.0;
    let serial_avg_ms = serial_ms / TOTAL_ITERATIONS as f64;
    let engine_avg_ms = engine_ms / TOTAL_ITERATIONS as f64;
    let speedup = serial_ms / engine_ms;
    let throughput = items as f64 * TOTAL_ITERATIONS as f64 / engine_total.as_secs_f64() / 1e9;

    println!("\n--- Summary ({TOTAL_ITERATIONS} scans of {items} items) ---");
    println!("serial:    {serial_ms:.3} ms total, {serial_avg_ms:.6} ms/scan");
    println!("chainscan: {engine_ms:.3} ms total, {engine_avg_ms:.6} ms/scan");
    println!("Speedup (serial / chainscan): {speedup:.2}x, {throughput:.3} G items/s");
}

fn run_pgo_train(config: ChainScanConfig, items: usize) {
    let engine = ChainScan::with_config(config);
    let input = random_input(items);
    let mut output = vec![0u64; items];
    for _ in 0..TOTAL_ITERATIONS {
        engine.exclusive_scan_in(&input, &mut output, 0u64, |a, b| a.wrapping_add(b));
    }
    std::hint::black_box(output.last().copied());
}

fn main() {
    let args = parse_args();
    if args.pgo_train {
        run_pgo_train(args.config, args.items);
    } else {
        run_checked(args.config, args.items);
    }
}
