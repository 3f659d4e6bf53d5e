//! End-to-end tests of streams over every backend kind.

use pdfstm_core::backend::FsFile;
use pdfstm_core::filter::{DecodeParms, FlateParams, ParmValue};
use pdfstm_core::{
    transform, Backend, Direction, ErrorKind, FileBackend, FilterKind, FilterSpec, IoFile,
    MemoryBackend, Stream, StreamConfig, StreamMode,
};
use pretty_assertions::assert_eq;
use std::io::{Cursor, Read, Write};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn sample(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8 ^ (i / 97) as u8).collect()
}

fn flate_a85(direction: Direction) -> Vec<FilterSpec> {
    let flate = FilterSpec::Flate {
        direction,
        params: FlateParams { level: 9 },
    };
    let a85 = FilterSpec::Ascii85(direction);
    match direction {
        Direction::Encode => vec![flate, a85],
        Direction::Decode => vec![a85, flate],
    }
}

/// In-memory filesystem file whose bytes outlive the backend
#[derive(Clone, Default)]
struct SharedFile {
    data: Arc<Mutex<Vec<u8>>>,
    pos: usize,
}

impl FsFile for SharedFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let data = self.data.lock().unwrap();
        let n = buf.len().min(data.len().saturating_sub(self.pos));
        buf[..n].copy_from_slice(&data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut data = self.data.lock().unwrap();
        let end = self.pos + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[self.pos..end].copy_from_slice(buf);
        self.pos = end;
        Ok(buf.len())
    }

    fn seek(&mut self, pos: u64) -> std::io::Result<u64> {
        self.pos = pos as usize;
        Ok(pos)
    }

    fn tell(&mut self) -> std::io::Result<u64> {
        Ok(self.pos as u64)
    }
}

#[test]
fn test_file_backend_write_then_read() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("content.a85");
    let data = sample(20_000);

    let backend = FileBackend::create(&path).unwrap();
    let mut stream = Stream::open(backend.into(), StreamMode::Write, flate_a85(Direction::Encode)).unwrap();
    stream.write_all(&data).unwrap();
    stream.close().unwrap();

    let on_disk = std::fs::read(&path).unwrap();
    assert!(on_disk.ends_with(b"~>"));
    assert!(on_disk.len() < data.len());

    let backend = FileBackend::open(&path).unwrap();
    let mut stream = Stream::open(backend.into(), StreamMode::Read, flate_a85(Direction::Decode)).unwrap();
    let mut decoded = Vec::new();
    stream.read_to_end(&mut decoded).unwrap();
    assert_eq!(stream.tell(), data.len() as u64);
    stream.close().unwrap();
    assert_eq!(decoded, data);
}

#[test]
fn test_drop_finishes_write_stream() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dropped.hex");

    {
        let backend = FileBackend::create(&path).unwrap();
        let mut stream = Stream::open(
            backend.into(),
            StreamMode::Write,
            [FilterSpec::AsciiHex(Direction::Encode)],
        )
        .unwrap();
        stream.write_all(b"\x01\xab").unwrap();
    }

    assert_eq!(std::fs::read(&path).unwrap(), b"01AB>");
}

#[test]
fn test_abstract_backend_roundtrip() {
    let file = SharedFile::default();
    let contents = Arc::clone(&file.data);
    let data = sample(5_000);

    let backend = Backend::abstract_file(file).unwrap();
    let mut stream = Stream::open(backend, StreamMode::Write, flate_a85(Direction::Encode)).unwrap();
    stream.write_all(&data).unwrap();
    stream.close().unwrap();

    let encoded = contents.lock().unwrap().clone();
    assert_eq!(
        encoded,
        flate_a85(Direction::Encode)
            .iter()
            .try_fold(data.clone(), |acc, spec| transform(spec, &acc))
            .unwrap()
    );

    let backend = Backend::abstract_file(IoFile::new(Cursor::new(encoded))).unwrap();
    let mut stream = Stream::open(backend, StreamMode::Read, flate_a85(Direction::Decode)).unwrap();
    let mut decoded = Vec::new();
    stream.read_to_end(&mut decoded).unwrap();
    assert_eq!(decoded, data);
}

#[test]
fn test_fixed_memory_truncation_fails_stream() {
    let backend = MemoryBackend::fixed(16);
    let mut stream = Stream::open_with_config(
        backend.into(),
        StreamMode::Write,
        [FilterSpec::AsciiHex(Direction::Encode)],
        StreamConfig::new().cache_size(8).buffer_size(8),
    )
    .unwrap();

    let outcome = match stream.write(&sample(64)) {
        Err(e) => Err(e),
        Ok(_) => stream.finish().map(|_| ()),
    };
    let err = outcome.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadPerms);
    assert_eq!(err.domain(), "backend");
}

#[test]
fn test_fixed_memory_exact_fit() {
    let backend = MemoryBackend::fixed(5);
    let mut stream = Stream::open(
        backend.into(),
        StreamMode::Write,
        [FilterSpec::AsciiHex(Direction::Encode)],
    )
    .unwrap();
    stream.write_all(b"hi").unwrap();
    let backend = stream.finish().unwrap();
    assert_eq!(backend.into_memory().unwrap().into_vec(), b"6869>");
}

#[test]
fn test_seek_replays_decoded_data() {
    let data = sample(3_000);
    let encoded = flate_a85(Direction::Encode)
        .iter()
        .try_fold(data.clone(), |acc, spec| transform(spec, &acc))
        .unwrap();

    let mut stream = Stream::open_with_config(
        MemoryBackend::from_vec(encoded).into(),
        StreamMode::Read,
        flate_a85(Direction::Decode),
        StreamConfig::new().cache_size(64).buffer_size(32),
    )
    .unwrap();

    let mut head = vec![0; 100];
    stream.read_exact(&mut head).unwrap();
    assert_eq!(head, &data[..100]);

    assert_eq!(stream.seek(2_500).unwrap(), 2_500);
    let mut tail = Vec::new();
    stream.read_to_end(&mut tail).unwrap();
    assert_eq!(tail, &data[2_500..]);

    // Backwards works too, and seeking past the end stops at the end
    assert_eq!(stream.seek(10).unwrap(), 10);
    let mut byte = [0u8; 1];
    stream.read_exact(&mut byte).unwrap();
    assert_eq!(byte[0], data[10]);
    assert_eq!(stream.seek(1_000_000).unwrap(), data.len() as u64);
}

#[test]
fn test_predictor_chain_from_parms() {
    let parms = DecodeParms::new()
        .set("Predictor", ParmValue::Int(2))
        .set("Colors", ParmValue::Int(3))
        .set("Columns", ParmValue::Int(4));
    let pixels = sample(4 * 3 * 10);

    let mut stream = Stream::open(
        MemoryBackend::growable().into(),
        StreamMode::Write,
        FilterKind::Lzw.specs(Direction::Encode, &parms).unwrap(),
    )
    .unwrap();
    stream.write_all(&pixels).unwrap();
    let encoded = stream.finish().unwrap().into_memory().unwrap().into_vec();

    let mut stream = Stream::open(
        MemoryBackend::from_vec(encoded).into(),
        StreamMode::Read,
        FilterKind::Lzw.specs(Direction::Decode, &parms).unwrap(),
    )
    .unwrap();
    let mut decoded = Vec::new();
    stream.read_to_end(&mut decoded).unwrap();
    assert_eq!(decoded, pixels);
}

#[test]
fn test_corrupt_input_fails_read_stream() {
    let mut stream = Stream::open(
        MemoryBackend::from_vec(b"41 4z2>".to_vec()).into(),
        StreamMode::Read,
        [FilterSpec::AsciiHex(Direction::Decode)],
    )
    .unwrap();

    let mut buf = [0u8; 16];
    let err = stream.read(&mut buf).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadData);
    assert!(stream.is_failed());
    assert!(matches!(stream.read(&mut buf), Err(pdfstm_core::Error::StreamFailed)));
}
