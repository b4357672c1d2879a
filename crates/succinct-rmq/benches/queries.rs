use divan::{Bencher, black_box};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use succinct_rmq::prelude::*;

fn main() {
    divan::main();
}

const LENGTHS: [usize; 3] = [1_000, 100_000, 10_000_000];

fn setup_rng() -> SmallRng {
    SmallRng::seed_from_u64(42)
}

fn setup_values(len: usize) -> Vec<i64> {
    let mut rng = setup_rng();
    (0..len).map(|_| rng.random_range(-1 << 32..1 << 32)).collect()
}

fn setup_ranges(len: usize) -> Vec<(usize, usize)> {
    let mut rng = setup_rng();
    (0..1_000)
        .map(|_| {
            let a = rng.random_range(0..len);
            let b = rng.random_range(0..len);
            (a.min(b), a.max(b))
        })
        .collect()
}

#[divan::bench(consts = LENGTHS)]
fn build<const N: usize>(b: Bencher) {
    b.with_inputs(|| setup_values(N))
        .bench_local_values(|values| MssIndex::build(values, IndexOptions::default()).unwrap());
}

#[divan::bench(consts = LENGTHS)]
fn argmin_in_memory<const N: usize>(b: Bencher) {
    let index = MssIndex::build(setup_values(N), IndexOptions::default()).unwrap();
    let ranges = setup_ranges(N);
    b.bench_local(|| {
        for &(start, end) in &ranges {
            black_box(index.range_argmin(start, end).unwrap());
        }
    });
}

#[divan::bench(consts = LENGTHS)]
fn argmin_scan<const N: usize>(b: Bencher) {
    let index = MssIndex::build(setup_values(N), IndexOptions::none()).unwrap();
    let ranges = setup_ranges(N);
    b.bench_local(|| {
        for &(start, end) in ranges.iter().take(10) {
            black_box(index.range_argmin(start, end).unwrap());
        }
    });
}

#[divan::bench(consts = LENGTHS)]
fn argmax_persisted<const N: usize>(b: Bencher) {
    let index = MssIndex::build(setup_values(N), IndexOptions::default()).unwrap();
    let reader = IndexReader::<_, i64>::open(index.to_bytes().unwrap()).unwrap();
    let ranges = setup_ranges(N);
    b.bench_local(|| {
        for &(start, end) in &ranges {
            black_box(reader.range_argmax(start, end).unwrap());
        }
    });
}

#[divan::bench(consts = LENGTHS)]
fn sum_persisted<const N: usize>(b: Bencher) {
    let index = MssIndex::build(setup_values(N), IndexOptions::default()).unwrap();
    let reader = IndexReader::<_, i64>::open(index.to_bytes().unwrap()).unwrap();
    let ranges = setup_ranges(N);
    b.bench_local(|| {
        for &(start, end) in &ranges {
            black_box(reader.range_sum(start, end).unwrap());
        }
    });
}
