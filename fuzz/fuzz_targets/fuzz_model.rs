#![no_main]
#[macro_use]
extern crate libfuzzer_sys;
extern crate arbitrary;
extern crate chunktape;

use arbitrary::Arbitrary;

use chunktape::{ChunkPosition, ChunkVector, EmptyLog, NestedLog};

const CHUNK_MAX_SZ: usize = 8;
const CHECKPOINTS: usize = 4;

#[derive(Debug)]
struct ChunkSize(usize);

impl<'a> Arbitrary<'a> for ChunkSize {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(ChunkSize(u.int_in_range(1..=CHUNK_MAX_SZ).unwrap_or(1)))
    }
}

#[derive(Debug, Arbitrary)]
enum Op {
    Push(u64),
    Checkpoint(u8),
    Rewind(u8),
    Resize(u8),
    ResetHard,
}

fuzz_target!(|args: (ChunkSize, Vec<Op>)| {
    let (chunk_size, ops) = args;

    let mut log: ChunkVector<(u64,), EmptyLog> = ChunkVector::new(chunk_size.0, EmptyLog);
    let mut model: Vec<u64> = vec![];

    // checkpoints with the model length they correspond to
    let mut checkpoints: Vec<Option<(ChunkPosition<()>, usize)>> = vec![None; CHECKPOINTS];

    for op in ops {
        match op {
            Op::Push(value) => {
                log.reserve_items(1);
                log.push((value,));
                model.push(value);
            }
            Op::Checkpoint(slot) => {
                checkpoints[slot as usize % CHECKPOINTS] = Some((log.position(), model.len()));
            }
            Op::Rewind(slot) => {
                if let Some((position, len)) = checkpoints[slot as usize % CHECKPOINTS] {
                    log.reset_to(&position);
                    model.truncate(len);
                    // checkpoints past the head are no longer valid targets
                    for checkpoint in &mut checkpoints {
                        if matches!(checkpoint, Some((_, l)) if *l > len) {
                            *checkpoint = None;
                        }
                    }
                }
            }
            Op::Resize(items) => {
                log.resize(items as usize);
            }
            Op::ResetHard => {
                log.reset_hard();
                model.clear();
                checkpoints = vec![None; CHECKPOINTS];
            }
        }

        assert_eq!(log.data_size(), model.len());

        let mut reversed = vec![];
        log.for_each_reverse(&log.position(), &log.zero_position(), |(value,)| {
            reversed.push(*value)
        });
        reversed.reverse();
        assert_eq!(reversed, model);
    }
});
