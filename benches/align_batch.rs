use std::path::PathBuf;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use deposit_predict::align::align;
use deposit_predict::batch::BatchTable;
use deposit_predict::context::PredictionContext;

const JOBS: [&str; 4] = ["admin.", "blue-collar", "retired", "artist"];
const MONTHS: [&str; 4] = ["jan", "may", "aug", "nov"];
const OUTCOMES: [&str; 3] = ["unknown", "success", "failure"];

fn make_table(rows: usize) -> BatchTable {
    let headers = ["age", "job", "housing", "month", "duration", "pdays", "poutcome"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let rows = (0..rows)
        .map(|i| {
            vec![
                (18 + i % 70).to_string(),
                JOBS[i % JOBS.len()].to_string(),
                if i % 2 == 0 { "yes" } else { "no" }.to_string(),
                MONTHS[i % MONTHS.len()].to_string(),
                (60 + (i * 37) % 900).to_string(),
                "-1".to_string(),
                OUTCOMES[i % OUTCOMES.len()].to_string(),
            ]
        })
        .collect();
    BatchTable::new(headers, rows).expect("synthetic table is rectangular")
}

fn bench_batch(c: &mut Criterion) {
    let model = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("model/bank_rf.json");
    let ctx = PredictionContext::load(&model).expect("bundled model loads");
    let table = make_table(1_000);
    let records = table.to_records();

    c.bench_function("align n=1000", |bch| {
        bch.iter(|| align(black_box(&records), black_box(ctx.vocabulary())))
    });

    c.bench_function("predict_batch n=1000", |bch| {
        bch.iter(|| ctx.predict_batch(black_box(&table)))
    });
}

criterion_group!(benches, bench_batch);
criterion_main!(benches);
