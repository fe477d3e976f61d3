use std::path::{Path, PathBuf};

use chunktape::{Chunk, ChunkFile, ChunkVector, EmptyLog, Error, Mode, NestedLog};

mod common;

const TEST_DIR: &str = "testing_data_directories";

fn test_path(name: &str) -> PathBuf {
    let dir = Path::new(TEST_DIR).join("persistence");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn filled_chunk(size: usize, records: usize) -> Chunk<(f64, u32)> {
    let mut chunk = Chunk::new(size);
    for i in 0..records {
        chunk.push((i as f64 * 0.5, i as u32 + 10));
    }
    chunk
}

#[test]
fn chunk_round_trip() {
    common::setup_logger();

    let path = test_path("chunk_round_trip");
    let chunk = filled_chunk(8, 5);

    let mut file = ChunkFile::create(&path).unwrap();
    assert_eq!(file.mode(), Mode::Write);
    chunk.write_data(&mut file).unwrap();
    file.sync_all().unwrap();
    drop(file);

    // full capacity of both columns is written
    let length = std::fs::metadata(&path).unwrap().len();
    assert_eq!(length, 8 * (8 + 4));

    let mut restored: Chunk<(f64, u32)> = Chunk::new(8);
    let mut file = ChunkFile::open(&path).unwrap();
    restored.read_data(&mut file).unwrap();

    // the number of used records is not part of the dump
    assert_eq!(restored.used_size(), 0);
    restored.set_used_size(chunk.used_size());
    assert_eq!(restored.slices(), chunk.slices());

    std::fs::remove_file(path).unwrap();
}

#[test]
fn whole_vector_dump() {
    common::setup_logger();

    let path = test_path("whole_vector_dump");

    let mut log: ChunkVector<(u64, u8), EmptyLog> = ChunkVector::new(4, EmptyLog);
    for i in 0..10_u64 {
        log.reserve_items(1);
        log.push((i * i, i as u8));
    }

    let mut file = ChunkFile::create(&path).unwrap();
    let mut used = vec![];
    let mut failure = None;
    log.for_each_chunk(|chunk| {
        used.push(chunk.used_size());
        if let Err(e) = chunk.write_data(&mut file) {
            failure = Some(e);
        }
    });
    assert!(failure.is_none());
    file.sync_all().unwrap();
    drop(file);

    assert_eq!(used, vec![4, 4, 2]);

    let mut file = ChunkFile::open(&path).unwrap();
    let mut values = vec![];
    for used_size in used {
        let mut chunk: Chunk<(u64, u8)> = Chunk::new(log.chunk_size());
        chunk.read_data(&mut file).unwrap();
        chunk.set_used_size(used_size);
        let (squares, ids) = chunk.slices();
        values.extend(squares.iter().copied().zip(ids.iter().copied()));
    }

    let mut expected = vec![];
    log.for_each_forward(&log.zero_position(), &log.position(), |(square, id)| {
        expected.push((*square, *id))
    });
    assert_eq!(values, expected);

    std::fs::remove_file(path).unwrap();
}

#[test]
fn wrong_mode_is_rejected() {
    common::setup_logger();

    let path = test_path("wrong_mode_is_rejected");
    let chunk = filled_chunk(2, 2);

    let mut file = ChunkFile::create(&path).unwrap();
    let mut target: Chunk<(f64, u32)> = Chunk::new(2);
    match target.read_data(&mut file) {
        Err(Error::Mode { expected, actual }) => {
            assert_eq!(expected, Mode::Read);
            assert_eq!(actual, Mode::Write);
        }
        other => panic!("expected a mode error, got {other:?}"),
    }
    chunk.write_data(&mut file).unwrap();
    drop(file);

    let mut file = ChunkFile::open(&path).unwrap();
    assert!(matches!(
        chunk.write_data(&mut file),
        Err(Error::Mode {
            expected: Mode::Write,
            actual: Mode::Read
        })
    ));

    std::fs::remove_file(path).unwrap();
}

#[test]
fn short_read_leaves_chunk_untouched() {
    common::setup_logger();

    let path = test_path("short_read_leaves_chunk_untouched");

    let mut file = ChunkFile::create(&path).unwrap();
    filled_chunk(2, 2).write_data(&mut file).unwrap();
    drop(file);

    let mut target = filled_chunk(4, 3);
    let before: (Vec<f64>, Vec<u32>) = {
        let (values, ids) = target.slices();
        (values.to_vec(), ids.to_vec())
    };

    let mut file = ChunkFile::open(&path).unwrap();
    match target.read_data(&mut file) {
        Err(Error::ShortRead { .. }) => {}
        other => panic!("expected a short read, got {other:?}"),
    }

    assert_eq!(target.used_size(), 3);
    assert_eq!(target.slices(), (&before.0[..], &before.1[..]));

    std::fs::remove_file(path).unwrap();
}

#[test]
fn missing_file_is_an_open_error() {
    common::setup_logger();

    let path = test_path("missing_file_is_an_open_error");

    match ChunkFile::open(&path) {
        Err(Error::Open { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected an open error, got {other:?}"),
    }
}
