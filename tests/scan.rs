use chain_scan::chainscan::{ChainScan, ChainScanConfig, DEFAULT_LOOKBACK_WIDTH};
use chain_scan::serial::{exclusive_scan_serial, inclusive_scan_serial};

/// One item per block pushes every element through the protocol.
fn per_item_engine(threads: usize) -> ChainScan {
    ChainScan::with_config(
        ChainScanConfig::default()
            .thread_count(threads)
            .block_size(1),
    )
}

// Affine maps x -> a*x + b over u16, composed left to right. Associative,
// not commutative, and small enough for the combined-word storage.
type Affine16 = (u16, u16);
fn compose16(f: Affine16, g: Affine16) -> Affine16 {
    (
        f.0.wrapping_mul(g.0),
        f.1.wrapping_mul(g.0).wrapping_add(g.1),
    )
}

// 2x2 matrix product over wrapping u64: associative, not commutative, and
// wide enough (32 bytes) for the split storage.
type Mat2 = [[u64; 2]; 2];
const MAT2_IDENTITY: Mat2 = [[1, 0], [0, 1]];
fn mat_mul(a: Mat2, b: Mat2) -> Mat2 {
    let mut out = [[0u64; 2]; 2];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = a[i][0]
                .wrapping_mul(b[0][j])
                .wrapping_add(a[i][1].wrapping_mul(b[1][j]));
        }
    }
    out
}

#[test]
fn additive_example_produces_known_prefixes() {
    let engine = per_item_engine(4);
    let input = [3i32, -1, 4, -1, 5];
    let got = engine.exclusive_scan(&input, 0, |a, b| a + b);
    assert_eq!(got, vec![0, 3, 2, 6, 5]);
}

#[test]
fn empty_input_is_a_no_op() {
    let engine = ChainScan::new();
    let input: [u64; 0] = [];
    assert!(engine.exclusive_scan(&input, 0, |a, b| a + b).is_empty());
    assert!(engine.inclusive_scan(&input, |a, b| a + b).is_empty());
}

#[test]
fn single_element_input() {
    let engine = ChainScan::new();
    assert_eq!(engine.exclusive_scan(&[7u32], 3, |a, b| a + b), vec![3]);
    assert_eq!(engine.inclusive_scan(&[7u32], |a, b| a + b), vec![7]);
}

#[test]
fn block_counts_around_the_lane_group_width() {
    let w = DEFAULT_LOOKBACK_WIDTH;
    let engine = per_item_engine(4);
    for n in [1, 2, w - 1, w, w + 1, 1024] {
        let input: Vec<u64> = (0..n as u64).map(|i| i * 3 + 1).collect();
        let got = engine.exclusive_scan(&input, 0, |a, b| a + b);
        let expected = exclusive_scan_serial(&input, 0, |a, b| a + b);
        assert_eq!(got, expected, "exclusive mismatch at {n} blocks");

        let got = engine.inclusive_scan(&input, |a, b| a + b);
        let expected = inclusive_scan_serial(&input, |a, b| a + b);
        assert_eq!(got, expected, "inclusive mismatch at {n} blocks");
    }
}

#[test]
fn non_commutative_combine_through_combined_storage() {
    // More blocks than the lane-group width forces multi-round walks; any
    // application-order error changes the composed coefficients.
    let engine = per_item_engine(4);
    let maps: Vec<Affine16> = (0..300u16).map(|i| (2 * i + 3, 5 * i + 1)).collect();

    let got = engine.exclusive_scan(&maps, (1, 0), compose16);
    let expected = exclusive_scan_serial(&maps, (1, 0), compose16);
    assert_eq!(got, expected);
}

#[test]
fn non_commutative_combine_through_split_storage() {
    let engine = per_item_engine(4);
    let maps: Vec<Mat2> = (0..300u64)
        .map(|i| [[i + 1, 2 * i + 3], [7 * i + 5, i + 11]])
        .collect();

    let got = engine.exclusive_scan(&maps, MAT2_IDENTITY, mat_mul);
    let expected = exclusive_scan_serial(&maps, MAT2_IDENTITY, mat_mul);
    assert_eq!(got, expected);
}

#[test]
fn narrow_lane_group_multi_round_ordering() {
    // Width 4 with hundreds of blocks exercises deep cross-round merging.
    let engine = ChainScan::with_config(
        ChainScanConfig::default()
            .thread_count(4)
            .block_size(1)
            .lookback_width(4),
    );
    let maps: Vec<Affine16> = (0..500u16).map(|i| (i | 1, i ^ 0x55)).collect();

    let got = engine.exclusive_scan(&maps, (1, 0), compose16);
    let expected = exclusive_scan_serial(&maps, (1, 0), compose16);
    assert_eq!(got, expected);
}

#[test]
fn scan_into_caller_buffer() {
    let engine =
        ChainScan::with_config(ChainScanConfig::default().thread_count(2).block_size(16));
    let input: Vec<u64> = (0..200).collect();
    let mut output = vec![u64::MAX; 200];
    engine.exclusive_scan_in(&input, &mut output, 0, |a, b| a + b);
    assert_eq!(output, exclusive_scan_serial(&input, 0, |a, b| a + b));
}

#[test]
fn engine_is_reusable_across_scans() {
    let engine = per_item_engine(2);
    for round in 0..5u64 {
        let input: Vec<u64> = (0..100).map(|i| i + round).collect();
        let got = engine.exclusive_scan(&input, 0, |a, b| a + b);
        assert_eq!(got, exclusive_scan_serial(&input, 0, |a, b| a + b));
    }
}

#[test]
fn deterministic_across_thread_counts() {
    let input: Vec<Affine16> = (0..400u16).map(|i| (3 * i + 7, i)).collect();

    let run = |threads: usize| {
        let engine = ChainScan::with_config(
            ChainScanConfig::default()
                .thread_count(threads)
                .block_size(3),
        );
        engine.exclusive_scan(&input, (1, 0), compose16)
    };

    let one = run(1);
    let four = run(4);
    assert_eq!(one, four);
    assert_eq!(one, exclusive_scan_serial(&input, (1, 0), compose16));
}
