use rand::{thread_rng, Rng};

use chunktape::{Chunk, ChunkVector, EmptyLog, NestedLog, SingleChunkVector};

mod common;

type Flat = ChunkVector<(f64, u32), EmptyLog>;

// operand values grouped by the statement that owns them, the same
// layout a tape uses for its Jacobian and statement logs
type Counts = ChunkVector<(u8,), EmptyLog>;
type Values = ChunkVector<(u64,), Counts>;

fn collect_reverse(log: &Flat) -> Vec<(f64, u32)> {
    let mut seen = vec![];
    log.for_each_reverse(&log.position(), &log.zero_position(), |(value, id)| {
        seen.push((*value, *id))
    });
    seen
}

fn record_group(log: &mut Values, group: &[u64]) {
    log.reserve_items(group.len());
    log.nested_mut().reserve_items(1);
    for value in group {
        log.push((*value,));
    }
    log.nested_mut().push((group.len() as u8,));
}

fn replay_reverse(log: &Values) -> Vec<Vec<u64>> {
    let mut groups = vec![];
    log.evaluate_reverse(&log.position(), &log.zero_position(), (), &mut |frames| {
        let ((_, values), counts) = frames;
        let (values_data,) = values.data;
        let (counts_data,) = counts.data;

        while counts.cursor > counts.end {
            counts.cursor -= 1;
            let count = counts_data[counts.cursor] as usize;
            let first = values.cursor - count;
            groups.push(values_data[first..values.cursor].to_vec());
            values.cursor = first;
        }
    });
    groups
}

fn replay_forward(log: &Values) -> Vec<Vec<u64>> {
    let mut groups = vec![];
    log.evaluate_forward(&log.zero_position(), &log.position(), (), &mut |frames| {
        let ((_, values), counts) = frames;
        let (values_data,) = values.data;
        let (counts_data,) = counts.data;

        while counts.cursor < counts.end {
            let count = counts_data[counts.cursor] as usize;
            counts.cursor += 1;
            let last = values.cursor + count;
            groups.push(values_data[values.cursor..last].to_vec());
            values.cursor = last;
        }
    });
    groups
}

#[test]
fn rollover_with_single_slot_chunks() {
    common::setup_logger();

    let mut log = Flat::new(1, EmptyLog);

    log.reserve_items(1);
    log.push((2.0, 5));
    log.reserve_items(1);
    log.push((3.0, 7));

    assert_eq!(log.chunk_count(), 2);
    let position = log.position();
    assert_eq!((position.chunk, position.data), (1, 1));
    assert_eq!(collect_reverse(&log), vec![(3.0, 7), (2.0, 5)]);

    let mut forward = vec![];
    log.for_each_forward(&log.zero_position(), &log.position(), |(value, id)| {
        forward.push((*value, *id))
    });
    assert_eq!(forward, vec![(2.0, 5), (3.0, 7)]);
}

#[test]
fn reserve_only_rolls_over_when_needed() {
    common::setup_logger();

    let mut log = Flat::new(4, EmptyLog);

    log.reserve_items(3);
    for i in 0..3 {
        log.push((i as f64, i));
    }
    log.reserve_items(1);
    assert_eq!(log.chunk_count(), 1);
    log.push((3.0, 3));

    // a full chunk has room for nothing
    log.reserve_items(1);
    assert_eq!(log.chunk_count(), 2);
    assert_eq!(log.position().chunk, 1);
    assert_eq!(log.chunk(0).used_size(), 4);
}

#[test]
fn reset_to_origin_is_idempotent() {
    common::setup_logger();

    let mut log = Flat::new(2, EmptyLog);
    for i in 0..5 {
        log.reserve_items(1);
        log.push((i as f64, i));
    }

    let zero = log.zero_position();
    log.reset_to(&zero);
    let once = log.position();
    log.reset_to(&zero);

    assert_eq!(log.position(), once);
    assert_eq!(once, zero);
    assert_eq!(log.data_size(), 0);
    // chunks are kept for the next recording
    assert_eq!(log.chunk_count(), 3);
}

#[test]
fn rewind_discards_everything_after_the_checkpoint() {
    common::setup_logger();

    let mut log = Flat::new(3, EmptyLog);
    for i in 0..4 {
        log.reserve_items(1);
        log.push((i as f64, i));
    }

    let checkpoint = log.position();

    for i in 4..9 {
        log.reserve_items(1);
        log.push((i as f64, i));
    }

    log.reset_to(&checkpoint);
    assert_eq!(log.position(), checkpoint);
    assert_eq!(log.data_size(), 4);

    log.reserve_items(1);
    log.push((100.0, 100));

    assert_eq!(
        collect_reverse(&log),
        vec![(100.0, 100), (3.0, 3), (2.0, 2), (1.0, 1), (0.0, 0)]
    );
}

#[test]
fn resize_never_shrinks() {
    common::setup_logger();

    let mut log = Flat::new(4, EmptyLog);
    log.resize(10);
    assert_eq!(log.chunk_count(), 3);

    log.resize(1);
    assert_eq!(log.chunk_count(), 3);

    // pre-allocated chunks are used by rollover without allocating more
    for i in 0..12 {
        log.reserve_items(1);
        log.push((i as f64, i));
    }
    assert_eq!(log.chunk_count(), 3);
    assert_eq!(log.data_size(), 12);
}

#[test]
fn reset_hard_keeps_one_chunk() {
    common::setup_logger();

    let mut log = Flat::new(2, EmptyLog);
    for i in 0..7 {
        log.reserve_items(1);
        log.push((i as f64, i));
    }

    log.reset_hard();

    assert_eq!(log.chunk_count(), 1);
    assert_eq!(log.position(), log.zero_position());
    assert!(collect_reverse(&log).is_empty());
}

#[test]
fn rollover_snapshots_the_nested_position() {
    common::setup_logger();

    let mut log = Values::new(3, Counts::new(2, EmptyLog));

    let groups: Vec<Vec<u64>> = vec![vec![1, 2], vec![3], vec![4, 5, 6], vec![], vec![7]];
    for group in &groups {
        let before = log.chunk_count();
        let nested_before = log.nested().position();
        record_group(&mut log, group);

        if log.chunk_count() > before {
            // the snapshot is taken before the statement is recorded
            assert_eq!(*log.nested_position_at(log.chunk_count() - 1), nested_before);
        }
    }

    let mut visited = 0;
    log.for_each_chunk(|chunk| visited += chunk.used_size());
    assert_eq!(visited, 7);
    assert_eq!(log.nested().data_size(), groups.len());
}

#[test]
fn lock_step_replay_matches_recording() {
    common::setup_logger();

    let mut rng = thread_rng();

    for _ in 0..32 {
        let value_chunk = rng.gen_range(3..8);
        let count_chunk = rng.gen_range(1..5);
        let mut log = Values::new(value_chunk, Counts::new(count_chunk, EmptyLog));

        let mut recorded: Vec<Vec<u64>> = vec![];
        for _ in 0..rng.gen_range(0..64) {
            let len = rng.gen_range(0..=3);
            let group: Vec<u64> = (0..len).map(|_| rng.gen()).collect();
            record_group(&mut log, &group);
            recorded.push(group);
        }

        assert_eq!(replay_forward(&log), recorded);

        let mut reversed = recorded.clone();
        reversed.reverse();
        assert_eq!(replay_reverse(&log), reversed);

        // rewinding both logs together keeps them consistent
        let keep = recorded.len() / 2;
        let mut rewound = Values::new(value_chunk, Counts::new(count_chunk, EmptyLog));
        let mut checkpoint = rewound.position();
        for (i, group) in recorded.iter().enumerate() {
            if i == keep {
                checkpoint = rewound.position();
            }
            record_group(&mut rewound, group);
        }
        if keep == recorded.len() {
            checkpoint = rewound.position();
        }

        rewound.reset_to(&checkpoint);
        assert_eq!(replay_forward(&rewound), recorded[..keep].to_vec());
    }
}

#[test]
fn partial_reverse_range() {
    common::setup_logger();

    let mut log = Values::new(4, Counts::new(2, EmptyLog));
    record_group(&mut log, &[1, 2]);
    let from = log.position();
    record_group(&mut log, &[3]);
    record_group(&mut log, &[4, 5]);
    let to = log.position();
    record_group(&mut log, &[6]);

    let mut groups = vec![];
    log.evaluate_reverse(&to, &from, (), &mut |frames| {
        let ((_, values), counts) = frames;
        let (values_data,) = values.data;
        let (counts_data,) = counts.data;

        while counts.cursor > counts.end {
            counts.cursor -= 1;
            let count = counts_data[counts.cursor] as usize;
            assert!(values.remaining() >= count);
            let first = values.cursor - count;
            groups.push(values_data[first..values.cursor].to_vec());
            values.cursor = first;
        }

        assert!(counts.is_exhausted());
        assert!(values.is_exhausted());
        assert_eq!(values.remaining(), 0);
    });

    assert_eq!(groups, vec![vec![4, 5], vec![3]]);
}

#[test]
fn single_chunk_vector_grows_in_place() {
    common::setup_logger();

    let mut log: SingleChunkVector<(u32, u8), EmptyLog> = SingleChunkVector::new(1, EmptyLog);

    for i in 0..10_u32 {
        log.reserve_items(1);
        log.push((i, i as u8 * 2));
    }
    assert!(log.chunk().size() >= 10);
    assert_eq!(log.data_size(), 10);

    let mut seen = vec![];
    log.for_each_forward(&log.zero_position(), &log.position(), |(a, b)| seen.push((*a, *b)));
    assert_eq!(seen, (0..10).map(|i| (i, i as u8 * 2)).collect::<Vec<_>>());

    let checkpoint = log.position();
    log.reserve_items(5);
    for i in 10..15_u32 {
        log.push((i, 0));
    }
    log.reset_to(&checkpoint);
    assert_eq!(log.data_size(), 10);

    log.reset_hard();
    assert_eq!(log.chunk().size(), 1);
    assert_eq!(log.data_size(), 0);
}

#[test]
fn single_chunk_vector_under_a_chunk_vector() {
    common::setup_logger();

    let mut log: ChunkVector<(u64,), SingleChunkVector<(u8,), EmptyLog>> =
        ChunkVector::new(2, SingleChunkVector::new(1, EmptyLog));

    let groups: Vec<Vec<u64>> = vec![vec![9], vec![8, 7], vec![6]];
    for group in &groups {
        log.reserve_items(group.len());
        log.nested_mut().reserve_items(1);
        for value in group {
            log.push((*value,));
        }
        log.nested_mut().push((group.len() as u8,));
    }

    let mut replayed = vec![];
    log.evaluate_forward(&log.zero_position(), &log.position(), (), &mut |frames| {
        let ((_, values), counts) = frames;
        let (values_data,) = values.data;
        let (counts_data,) = counts.data;

        while counts.cursor < counts.end {
            let last = values.cursor + counts_data[counts.cursor] as usize;
            counts.cursor += 1;
            replayed.push(values_data[values.cursor..last].to_vec());
            values.cursor = last;
        }
    });

    assert_eq!(replayed, groups);
}

#[test]
fn re_appending_after_rewind_reproduces_the_log() {
    common::setup_logger();

    let records: Vec<(f64, u32)> = (0..11).map(|i| (i as f64 * 1.5, i)).collect();

    let mut straight = Flat::new(3, EmptyLog);
    for record in &records {
        straight.reserve_items(1);
        straight.push(*record);
    }

    let mut rewound = Flat::new(3, EmptyLog);
    let mut checkpoint = rewound.position();
    for (i, record) in records.iter().enumerate() {
        if i == 4 {
            checkpoint = rewound.position();
        }
        rewound.reserve_items(1);
        rewound.push(*record);
    }

    rewound.reset_to(&checkpoint);
    rewound.reset_to(&checkpoint);
    for record in &records[4..] {
        rewound.reserve_items(1);
        rewound.push(*record);
    }

    assert_eq!(rewound.position(), straight.position());
    assert_eq!(rewound.chunk_count(), straight.chunk_count());
    assert_eq!(collect_reverse(&rewound), collect_reverse(&straight));
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "stopped at record")]
fn evaluator_leaving_records_behind_is_caught() {
    let mut log = Values::new(4, Counts::new(4, EmptyLog));
    record_group(&mut log, &[1, 2]);
    record_group(&mut log, &[3, 4]);

    log.evaluate_reverse(&log.position(), &log.zero_position(), (), &mut |frames| {
        let ((_, values), counts) = frames;
        let (counts_data,) = counts.data;

        while counts.cursor > counts.end {
            counts.cursor -= 1;
            // consumes one value too few per statement
            values.cursor -= counts_data[counts.cursor] as usize - 1;
        }
    });
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "push into a full chunk")]
fn push_into_full_chunk() {
    let mut chunk: Chunk<(u32,)> = Chunk::new(1);
    chunk.push((1,));
    chunk.push((2,));
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "can not reserve 3 items")]
fn reserve_beyond_chunk_size() {
    let mut log = Flat::new(2, EmptyLog);
    log.reserve_items(3);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "reverse traversal from")]
fn inverted_reverse_traversal() {
    let mut log = Flat::new(2, EmptyLog);
    log.reserve_items(1);
    log.push((1.0, 1));

    log.for_each_reverse(&log.zero_position(), &log.position(), |_| {});
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "reverse evaluation from")]
fn inverted_reverse_evaluation() {
    let mut log = Values::new(2, Counts::new(2, EmptyLog));
    record_group(&mut log, &[1]);

    log.evaluate_reverse(&log.zero_position(), &log.position(), (), &mut |_| {});
}
