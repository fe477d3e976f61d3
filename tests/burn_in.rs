use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

use rand::{thread_rng, Rng};

use chunktape::{
    AtomicGlobalIndexCounter, Config, GlobalIndexHandler, Index, IndexSource, UNTRACKED,
};

mod common;

const STATEMENTS: usize = 1024;

/// Records a random chain of statements and returns every identifier
/// the tape handed out.
fn run(counter: Arc<AtomicGlobalIndexCounter>) -> Vec<Index> {
    let config = Config {
        chunk_size: 64,
        ..Default::default()
    };

    let mut tape = config.tape(GlobalIndexHandler::new(counter)).unwrap();
    let mut rng = thread_rng();
    let mut handed_out = vec![];

    tape.set_active();

    let mut x = UNTRACKED;
    tape.register_input(&mut x);
    handed_out.push(x);

    let mut v = UNTRACKED;
    tape.push_statement(&mut v, &[(1.0, x)]);
    handed_out.push(v);

    for _ in 0..STATEMENTS {
        let rhs = v;
        let factor: f64 = rng.gen_range(0.5..1.0);
        tape.push_statement(&mut v, &[(factor, rhs), (1.0, x)]);
        handed_out.push(v);
    }

    tape.set_passive();
    tape.set_gradient(v, 1.0);
    tape.evaluate_full();
    assert!(tape.gradient(x) >= 1.0);

    handed_out
}

#[test]
fn burn_in() {
    common::setup_logger();

    let concurrency: usize = std::thread::available_parallelism().unwrap().get() * 4;

    let counter = Arc::new(AtomicGlobalIndexCounter::new(16));

    let mut threads = vec![];

    let before = std::time::Instant::now();

    for i in 0..concurrency {
        let counter = counter.clone();
        threads.push(
            std::thread::Builder::new()
                .name(format!("thread-{i}"))
                .spawn(move || run(counter))
                .unwrap(),
        );
    }

    let mut seen = HashSet::new();
    for thread in threads {
        for index in thread.join().unwrap() {
            assert!(seen.insert(index), "identifier {index} handed out to two tapes");
        }
    }

    assert_eq!(seen.len(), concurrency * (STATEMENTS + 2));
    assert!(counter.maximum_global_index() as usize >= seen.len());

    log::info!(
        "recorded {} statements in {:?} with {} threads",
        seen.len(),
        before.elapsed(),
        concurrency
    );
}

#[test]
fn concurrent_range_claims_are_disjoint() {
    common::setup_logger();

    let counter = Arc::new(AtomicGlobalIndexCounter::new(4));

    let threads: Vec<_> = (0..2)
        .map(|i| {
            let counter = counter.clone();
            std::thread::Builder::new()
                .name(format!("claimer-{i}"))
                .spawn(move || (0..3).map(|_| counter.get_range()).collect::<Vec<_>>())
                .unwrap()
        })
        .collect();

    let mut ranges: Vec<Range<Index>> = threads
        .into_iter()
        .flat_map(|thread| thread.join().unwrap())
        .collect();
    ranges.sort_by_key(|range| range.start);

    assert_eq!(ranges.len(), 6);
    for (i, range) in ranges.iter().enumerate() {
        let start = 1 + 4 * i as Index;
        assert_eq!(*range, start..start + 4);
    }

    let total: usize = ranges.iter().map(|range| range.len()).sum();
    assert_eq!(total, 24);
    assert_eq!(counter.maximum_global_index(), 24);
}
