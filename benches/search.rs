use criterion::{Criterion, criterion_group, criterion_main};
use piscine_rag::index::VectorIndex;
use std::hint::black_box;

const DIMENSION: usize = 1536;
const ROWS: usize = 2000;

// Deterministic pseudo-random rows so runs are comparable
fn synthetic_vector(seed: usize) -> Vec<f32> {
    let mut state = (seed as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
    (0..DIMENSION)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) as f32 / u32::MAX as f32) - 0.25
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let rows: Vec<Vec<f32>> = (0..ROWS).map(synthetic_vector).collect();
    let mut index = VectorIndex::new(DIMENSION);
    index.add(&rows).expect("synthetic rows are valid");
    let query = synthetic_vector(ROWS + 1);

    c.bench_function("search_top3", |b| {
        b.iter(|| index.search(black_box(&query), black_box(3)))
    });

    let bytes = index.to_bytes().expect("index encodes");
    c.bench_function("decode_index", |b| {
        b.iter(|| VectorIndex::from_bytes(black_box(&bytes), DIMENSION))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
