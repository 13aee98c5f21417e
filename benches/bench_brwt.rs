use criterion::black_box;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};

use annodbg::annot::matrix::{BinaryMatrix, Brwt};
use annodbg::annot::Row;

const SEED: u64 = 2022;
const NUM_COLUMNS: usize = 64;
const NUM_ROWS: u64 = 100_000;
const BATCH_SIZES: &[usize] = &[16, 64, 256, 1024];

fn rand_columns<T: Rng>(rng: &mut T, num_rows: u64, num_columns: usize) -> Vec<Vec<Row>> {
    (0..num_columns)
        .map(|c| {
            // columns get uneven densities, like real sample annotations
            let density = 1 + c % 16;
            (0..num_rows)
                .filter(|_| rng.gen_range(0..100) < density)
                .collect()
        })
        .collect()
}

fn get_rows_batched(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(SEED);
    let cols = rand_columns(&mut rng, NUM_ROWS, NUM_COLUMNS);
    let brwt = Brwt::build_default(NUM_ROWS, &cols);

    let mut group = c.benchmark_group("brwt_get_rows");
    for &batch in BATCH_SIZES {
        let rows: Vec<Row> = {
            let mut rows: Vec<Row> = (0..batch).map(|_| rng.gen_range(0..NUM_ROWS)).collect();
            rows.sort_unstable();
            rows.dedup();
            rows
        };
        group.throughput(Throughput::Elements(rows.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &rows, |b, rows| {
            b.iter(|| black_box(brwt.get_rows(rows)))
        });
    }
    group.finish();
}

fn get_rows_single(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(SEED);
    let cols = rand_columns(&mut rng, NUM_ROWS, NUM_COLUMNS);
    let brwt = Brwt::build_default(NUM_ROWS, &cols);

    c.bench_function("brwt_get_row", |b| {
        b.iter(|| {
            let row = rng.gen_range(0..NUM_ROWS);
            black_box(brwt.get_row(row))
        })
    });
}

criterion_group!(benches, get_rows_batched, get_rows_single);
criterion_main!(benches);
