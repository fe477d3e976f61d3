use criterion::{black_box, criterion_group, criterion_main, Criterion};

use chunktape::{ChunkVector, Config, EmptyLog, NestedLog, UNTRACKED};

const STATEMENTS: usize = 10_000;

pub fn measure_append(c: &mut Criterion) {
    let mut log: ChunkVector<(f64, u32), EmptyLog> = ChunkVector::new(4096, EmptyLog);
    let zero = log.zero_position();

    c.bench_function("append 10k records", |b| {
        b.iter(|| {
            log.reset_to(&zero);
            for i in 0..STATEMENTS as u32 {
                log.reserve_items(1);
                log.push((i as f64, i));
            }
            black_box(log.position());
        })
    });
}

pub fn measure_tape(c: &mut Criterion) {
    let config = Config {
        chunk_size: 4096,
        ..Default::default()
    };
    let mut tape = config.tape(config.reuse_index_handler()).unwrap();

    c.bench_function("record and evaluate 10k statements", |b| {
        b.iter(|| {
            tape.reset();
            tape.set_active();

            let mut x = UNTRACKED;
            tape.register_input(&mut x);
            let mut v = UNTRACKED;
            tape.copy(&mut v, x);
            for _ in 0..STATEMENTS {
                let rhs = v;
                tape.push_statement(&mut v, &[(0.999, rhs), (1.0, x)]);
            }

            tape.set_passive();
            tape.set_gradient(v, 1.0);
            tape.evaluate_full();
            black_box(tape.gradient(x));
        })
    });
}

criterion_group!(append, measure_append);
criterion_group!(tape, measure_tape);
criterion_main!(append, tape);
