use compkit::buffer::{
    compress_streaming, compress_to_vec, decompress_streaming, decompress_to_vec,
    drive_decompress_chunk, drive_feed, drive_finish, drive_finish_decompress, GrowthPolicy,
};
use compkit::{Codec, Decompressor, Error, Registry, StreamState};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const STREAMING: [&str; 4] = ["brotli", "lzma", "uncompressed", "zstd"];

fn unpack(codec: &dyn Codec, compressed: &[u8], chunk_len: usize, scratch_len: usize) -> Vec<u8> {
    decompress_streaming(codec, compressed, chunk_len, scratch_len).unwrap()
}

fn decode_into(
    decompressor: &mut Decompressor,
    input: &[u8],
    scratch: &mut [u8],
    out: &mut Vec<u8>,
) {
    drive_decompress_chunk(decompressor, input, scratch, out).unwrap();
}

fn payload(len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(len as u64);
    let mut data = Vec::with_capacity(len);
    while data.len() < len {
        if rng.gen_bool(0.5) {
            data.extend_from_slice(b"streaming sessions keep partial progress; ");
        } else {
            let noise: [u8; 16] = rng.gen();
            data.extend_from_slice(&noise);
        }
    }
    data.truncate(len);
    data
}

#[test]
fn test_chunking_does_not_change_the_result() {
    let registry = Registry::new();
    let input = payload(4096);
    for name in STREAMING {
        let codec = registry.get(name, None).unwrap();
        assert!(codec.supports_streaming());

        let whole = compress_streaming(codec.as_ref(), &input, input.len(), 1 << 16).unwrap();
        let bytewise = compress_streaming(codec.as_ref(), &input, 1, 7).unwrap();

        for compressed in [&whole, &bytewise] {
            let len = compressed.len();
            assert_eq!(unpack(codec.as_ref(), compressed, len, 1 << 16), input, "{}", name);
            assert_eq!(unpack(codec.as_ref(), compressed, 1, 5), input, "{}", name);
        }
    }
}

#[test]
fn test_streams_and_one_shot_interoperate() {
    let registry = Registry::new();
    let policy = GrowthPolicy::default();
    let input = payload(20_000);
    for name in STREAMING {
        let codec = registry.get(name, None).unwrap();

        let streamed = compress_streaming(codec.as_ref(), &input, 1000, 512).unwrap();
        let restored = decompress_to_vec(codec.as_ref(), &streamed, &policy).unwrap();
        assert_eq!(restored, input, "{}", name);

        let one_shot = compress_to_vec(codec.as_ref(), &input).unwrap();
        assert_eq!(unpack(codec.as_ref(), &one_shot, 333, 100), input, "{}", name);
    }
}

#[test]
fn test_empty_stream() {
    let registry = Registry::new();
    for name in STREAMING {
        let codec = registry.get(name, None).unwrap();
        let compressed = compress_streaming(codec.as_ref(), &[], 16, 64).unwrap();
        assert!(unpack(codec.as_ref(), &compressed, 16, 64).is_empty(), "{}", name);
    }
}

#[test]
fn test_byte_accounting() {
    let registry = Registry::new();
    let input = payload(10_000);
    for name in STREAMING {
        let codec = registry.get(name, None).unwrap();
        let mut compressor = codec.open_compressor().unwrap();
        assert_eq!(compressor.codec(), name);
        let mut scratch = vec![0u8; 64];
        let mut compressed = Vec::new();
        for chunk in input.chunks(999) {
            drive_feed(&mut compressor, chunk, &mut scratch, &mut compressed).unwrap();
        }
        drive_finish(&mut compressor, &mut scratch, &mut compressed).unwrap();
        assert_eq!(compressor.total_in(), input.len() as u64, "{}", name);
        assert_eq!(compressor.total_out(), compressed.len() as u64, "{}", name);
        assert_eq!(compressor.state(), StreamState::Finished);

        let mut decompressor = codec.open_decompressor().unwrap();
        let mut restored = Vec::new();
        decode_into(&mut decompressor, &compressed, &mut scratch, &mut restored);
        drive_finish_decompress(&mut decompressor, &mut scratch, &mut restored).unwrap();
        assert!(decompressor.is_finished());
        assert_eq!(decompressor.total_in(), compressed.len() as u64, "{}", name);
        assert_eq!(decompressor.total_out(), input.len() as u64, "{}", name);
        assert_eq!(restored, input);
    }
}

#[test]
fn test_use_after_finish() {
    let registry = Registry::new();
    for name in STREAMING {
        let codec = registry.get(name, None).unwrap();
        let mut compressor = codec.open_compressor().unwrap();
        let mut scratch = vec![0u8; 1024];
        let mut compressed = Vec::new();
        drive_feed(&mut compressor, b"finished", &mut scratch, &mut compressed).unwrap();
        drive_finish(&mut compressor, &mut scratch, &mut compressed).unwrap();

        assert!(matches!(
            compressor.feed(b"more", &mut scratch),
            Err(Error::StreamAlreadyFinished { .. })
        ));
        assert!(matches!(
            compressor.finish(&mut scratch),
            Err(Error::StreamAlreadyFinished { .. })
        ));

        let mut decompressor = codec.open_decompressor().unwrap();
        let mut restored = Vec::new();
        decode_into(&mut decompressor, &compressed, &mut scratch, &mut restored);
        drive_finish_decompress(&mut decompressor, &mut scratch, &mut restored).unwrap();
        assert_eq!(restored, b"finished");
        assert!(matches!(
            decompressor.decompress_chunk(&compressed, &mut scratch),
            Err(Error::StreamAlreadyFinished { .. })
        ));
    }
}

#[test]
fn test_truncated_stream() {
    let registry = Registry::new();
    let input = payload(8192);
    for name in ["brotli", "lzma", "zstd"] {
        let codec = registry.get(name, None).unwrap();
        let compressed = compress_streaming(codec.as_ref(), &input, 1024, 1024).unwrap();

        let mut decompressor = codec.open_decompressor().unwrap();
        let mut scratch = vec![0u8; 1024];
        let mut restored = Vec::new();
        let half = &compressed[..compressed.len() / 2];
        decode_into(&mut decompressor, half, &mut scratch, &mut restored);
        assert!(!decompressor.is_finished());
        match drive_finish_decompress(&mut decompressor, &mut scratch, &mut restored) {
            Err(Error::TruncatedStream { codec }) => assert_eq!(codec, name),
            other => panic!("{}: unexpected result {:?}", name, other),
        }
        assert_eq!(decompressor.state(), StreamState::Finished);
    }
}

#[test]
fn test_trailing_data_is_corrupt() {
    let registry = Registry::new();
    for name in ["brotli", "lzma", "zstd"] {
        let codec = registry.get(name, None).unwrap();
        let mut compressed = compress_streaming(codec.as_ref(), b"payload", 64, 64).unwrap();
        compressed.extend_from_slice(b"this is not part of any stream");
        let len = compressed.len();
        let err = decompress_streaming(codec.as_ref(), &compressed, len, 64).unwrap_err();
        assert!(matches!(err, Error::CorruptData { .. }), "{}: {}", name, err);
    }
}

#[test]
fn test_flush_makes_input_decodable() {
    let registry = Registry::new();
    for name in ["brotli", "zstd"] {
        let codec = registry.get(name, None).unwrap();
        let mut compressor = codec.open_compressor().unwrap();
        let mut scratch = vec![0u8; 8];
        let mut compressed = Vec::new();

        drive_feed(&mut compressor, b"first half, ", &mut scratch, &mut compressed).unwrap();
        loop {
            let flushed = compressor.flush(&mut scratch).unwrap();
            compressed.extend_from_slice(&scratch[..flushed.produced]);
            if flushed.complete {
                break;
            }
        }
        assert_eq!(compressor.state(), StreamState::Ready);

        let mut decompressor = codec.open_decompressor().unwrap();
        let mut restored = Vec::new();
        decode_into(&mut decompressor, &compressed, &mut scratch, &mut restored);
        assert_eq!(restored, b"first half, ", "{}", name);

        let flushed_len = compressed.len();
        drive_feed(&mut compressor, b"second half", &mut scratch, &mut compressed).unwrap();
        drive_finish(&mut compressor, &mut scratch, &mut compressed).unwrap();
        let rest = &compressed[flushed_len..];
        decode_into(&mut decompressor, rest, &mut scratch, &mut restored);
        drive_finish_decompress(&mut decompressor, &mut scratch, &mut restored).unwrap();
        assert_eq!(restored, b"first half, second half", "{}", name);
    }
}

#[test]
fn test_level_does_not_affect_decoding() {
    let registry = Registry::new();
    let input = payload(5000);
    for (name, low, high) in [("brotli", 0, 11), ("zstd", 1, 19), ("lzma", 0, 9)] {
        let fast = registry.get(name, Some(low)).unwrap();
        let strong = registry.get(name, Some(high)).unwrap();
        let compressed = compress_streaming(fast.as_ref(), &input, 512, 512).unwrap();
        assert_eq!(decompress_streaming(strong.as_ref(), &compressed, 512, 512).unwrap(), input);
        let compressed = compress_streaming(strong.as_ref(), &input, 512, 512).unwrap();
        assert_eq!(decompress_streaming(fast.as_ref(), &compressed, 512, 512).unwrap(), input);
    }
}

#[test]
fn test_streaming_unsupported() {
    let registry = Registry::new();
    for name in ["snappy", "lz4"] {
        let codec = registry.get(name, None).unwrap();
        assert!(!codec.supports_streaming());
        assert!(matches!(
            codec.open_compressor(),
            Err(Error::StreamingUnsupported(n)) if n == name
        ));
        assert!(matches!(
            codec.open_decompressor(),
            Err(Error::StreamingUnsupported(n)) if n == name
        ));
    }
}
