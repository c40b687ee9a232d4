use compkit::buffer::{compress_to_vec, decompress_to_vec, GrowthPolicy};
use compkit::{Error, Registry};

#[test]
fn test_short_compression_buffer() {
    let registry = Registry::new();
    let input = b"one byte short is still too short. ".repeat(30);
    for name in registry.names() {
        let codec = registry.get(&name, None).unwrap();
        let expected = compress_to_vec(codec.as_ref(), &input).unwrap();

        let mut dest = vec![0u8; expected.len() - 1];
        match codec.compress(&input, &mut dest).unwrap_err() {
            Error::BufferTooSmall { required, .. } => {
                if ["lz4", "snappy", "zstd"].contains(&name.as_str()) {
                    assert_eq!(required, Some(expected.len()), "{}", name);
                }
            }
            other => panic!("{}: unexpected error {}", name, other),
        }

        let mut dest = vec![0u8; codec.max_compressed_len(input.len())];
        let len = codec.compress(&input, &mut dest).unwrap();
        assert_eq!(&dest[..len], &expected[..], "{}", name);
    }
}

#[test]
fn test_exact_compression_buffer() {
    let registry = Registry::new();
    let input = b"an exact fit is enough, whatever the worst-case bound says. ".repeat(20);
    for name in registry.names() {
        let codec = registry.get(&name, None).unwrap();
        let expected = compress_to_vec(codec.as_ref(), &input).unwrap();
        let mut dest = vec![0u8; expected.len()];
        let len = codec.compress(&input, &mut dest).unwrap();
        assert_eq!(len, expected.len(), "{}", name);
        assert_eq!(dest, expected, "{}", name);
    }
}

#[test]
fn test_short_decompression_buffer() {
    let registry = Registry::new();
    let input = b"decompressing into a buffer that is one byte short. ".repeat(30);
    for name in registry.names() {
        let codec = registry.get(&name, None).unwrap();
        let compressed = compress_to_vec(codec.as_ref(), &input).unwrap();

        let mut dest = vec![0u8; input.len() - 1];
        let err = codec.decompress(&compressed, &mut dest).unwrap_err();
        match err {
            Error::BufferTooSmall { provided, required } => {
                assert_eq!(provided, input.len() - 1, "{}", name);
                if let Some(required) = required {
                    assert!(required >= input.len(), "{}", name);
                }
            }
            other => panic!("{}: unexpected error {}", name, other),
        }

        let mut dest = vec![0u8; input.len()];
        assert_eq!(codec.decompress(&compressed, &mut dest).unwrap(), input.len(), "{}", name);
    }
}

#[test]
fn test_snappy_length_header_mismatch() {
    let codec = compkit::get("snappy", None).unwrap();
    let input = vec![b'z'; 100];
    let mut compressed = compress_to_vec(codec.as_ref(), &input).unwrap();
    // Lengths below 128 are stored as a single varint byte.
    assert_eq!(compressed[0], 100);
    compressed[0] ^= 0x01;

    let mut dest = vec![0u8; 4096];
    let err = codec.decompress(&compressed, &mut dest).unwrap_err();
    assert!(matches!(err, Error::CorruptData { codec: "snappy", .. }), "{}", err);
}

#[test]
fn test_damaged_xz_magic() {
    let codec = compkit::get("lzma", None).unwrap();
    let mut compressed = compress_to_vec(codec.as_ref(), b"xz container").unwrap();
    compressed[1] ^= 0x01;
    let err = decompress_to_vec(codec.as_ref(), &compressed, &GrowthPolicy::default()).unwrap_err();
    assert!(matches!(err, Error::CorruptData { codec: "lzma", .. }), "{}", err);
}

#[test]
fn test_garbage_input() {
    let registry = Registry::new();
    let cases: [(&str, &[u8]); 3] = [
        // Valid size prefix, then a token whose literal length runs past the input.
        ("lz4", b"\x10\x00\x00\x00\xff"),
        ("lzma", b"definitely not compressed"),
        ("zstd", b"definitely not compressed"),
    ];
    for (name, garbage) in cases {
        let codec = registry.get(name, None).unwrap();
        let mut dest = vec![0u8; 1 << 16];
        let err = codec.decompress(garbage, &mut dest).unwrap_err();
        assert!(err.is_data_fault(), "{}: {}", name, err);
    }
}

#[test]
fn test_growth_limit() {
    let codec = compkit::get("brotli", None).unwrap();
    let input = vec![7u8; 50_000];
    let compressed = compress_to_vec(codec.as_ref(), &input).unwrap();
    let policy = GrowthPolicy {
        initial: 1024,
        factor: 4,
        limit: 40_000,
    };
    let err = decompress_to_vec(codec.as_ref(), &compressed, &policy).unwrap_err();
    assert!(err.is_buffer_too_small(), "{}", err);

    let policy = GrowthPolicy { limit: 70_000, ..policy };
    let restored = decompress_to_vec(codec.as_ref(), &compressed, &policy).unwrap();
    assert_eq!(restored, input);
}

#[test]
fn test_missing_xz_footer() {
    let codec = compkit::get("lzma", None).unwrap();
    let input = b"the footer is gone but every byte of data is here. ".repeat(20);
    let compressed = compress_to_vec(codec.as_ref(), &input).unwrap();
    let truncated = &compressed[..compressed.len() - 8];

    let mut dest = vec![0u8; input.len()];
    let err = codec.decompress(truncated, &mut dest).unwrap_err();
    assert!(matches!(err, Error::CorruptData { codec: "lzma", .. }), "{}", err);

    let mut dest = vec![0u8; input.len() - 1];
    assert!(codec.decompress(&compressed, &mut dest).unwrap_err().is_buffer_too_small());
}

#[test]
fn test_concatenated_zstd_frames() {
    let codec = compkit::get("zstd", None).unwrap();
    let mut compressed = compress_to_vec(codec.as_ref(), b"one frame").unwrap();
    compressed.extend_from_within(..);
    let err = decompress_to_vec(codec.as_ref(), &compressed, &GrowthPolicy::default()).unwrap_err();
    assert!(matches!(err, Error::CorruptData { codec: "zstd", .. }), "{}", err);
}
