mod discard;

use crate::discard::Discard;
use anyhow::bail;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use clap::{Args, Parser, Subcommand, ValueEnum};
use compkit::buffer::{self, DEFAULT_SCRATCH_LEN};
use compkit::{registry, Codec, Levels};
use human_bytes::human_bytes;
use serde::Serialize;
use std::ffi::OsStr;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Error, Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::process::exit;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser)]
struct Config {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress a file
    Compress(CompressionCfg),
    /// Decompress a file
    Decompress(DecompressionCfg),
    /// Benchmark compression+decompression of a single file
    Benchmark(CompressionCfg),
    /// Run multiple benchmarks
    BenchmarkMany(BenchmarkManyCfg),
    /// List available codecs
    List,
}

#[derive(Args, Clone)]
struct InputCfg {
    /// Input file path
    #[arg()]
    path: PathBuf,
}

#[derive(Args)]
struct CompressionCfg {
    #[clap(flatten)]
    input: InputCfg,

    /// Compression algorithm
    #[arg(long, short = 'a', default_value = "zstd")]
    algorithm: Algorithm,

    /// Compression level. Uses the codec default if not given.
    #[arg(long, short = 'c', allow_hyphen_values = true)]
    compression: Option<i32>,

    /// Size of a file chunk in bytes. Each chunk is compressed independently,
    /// unless --streaming is set.
    #[arg(long, short = 'b', default_value = "16384")]
    chunk_size: usize,

    /// Write a single compressed stream instead of independent chunks
    #[arg(long, short = 's')]
    streaming: bool,
}

#[derive(Args)]
struct DecompressionCfg {
    #[clap(flatten)]
    input: InputCfg,

    /// Compression algorithm. If not given, determined automatically from the file extension.
    #[clap(long, short = 'a')]
    algorithm: Option<Algorithm>,

    /// Read a single compressed stream instead of independent chunks
    #[arg(long, short = 's')]
    streaming: bool,
}

#[derive(Args)]
struct BenchmarkManyCfg {
    #[clap(flatten)]
    input: InputCfg,

    /// List of algorithms to benchmark
    #[arg(
        long,
        short = 'a',
        value_delimiter = ',',
        default_value = "lz4,snappy,zstd,brotli,lzma",
        num_args = 1..
    )]
    algorithms: Vec<Algorithm>,

    /// Size of a file chunk in bytes. Each chunk is compressed independently,
    /// unless --streaming is set.
    #[arg(long, short = 'b', default_value = "16384")]
    chunk_size: usize,

    /// Benchmark streaming sessions; algorithms without streaming are skipped
    #[arg(long, short = 's')]
    streaming: bool,

    /// Save benchmark results to a CSV file
    #[arg(long, short)]
    report: Option<PathBuf>,
}

#[derive(ValueEnum, Copy, Clone, Serialize)]
enum Algorithm {
    Uncompressed,
    Lz4,
    Zstd,
    Brotli,
    Snappy,
    Lzma,
}

impl Algorithm {
    /// Registry key of the codec.
    fn name(&self) -> &'static str {
        match self {
            Algorithm::Uncompressed => compkit::codec::uncompressed::NAME,
            Algorithm::Lz4 => compkit::codec::lz4::NAME,
            Algorithm::Zstd => compkit::codec::zstd::NAME,
            Algorithm::Brotli => compkit::codec::brotli::NAME,
            Algorithm::Snappy => compkit::codec::snappy::NAME,
            Algorithm::Lzma => compkit::codec::lzma::NAME,
        }
    }

    fn extension(&self) -> &str {
        match self {
            Algorithm::Uncompressed => "bak",
            Algorithm::Zstd => "zstd",
            Algorithm::Lz4 => "lz4",
            Algorithm::Brotli => "br",
            Algorithm::Snappy => "sz",
            Algorithm::Lzma => "xz",
        }
    }

    fn from_file_name(path: &Path) -> Option<Algorithm> {
        match path.extension().and_then(OsStr::to_str) {
            Some("bak") => Some(Self::Uncompressed),
            Some("zstd") => Some(Self::Zstd),
            Some("lz4") => Some(Self::Lz4),
            Some("br") => Some(Self::Brotli),
            Some("sz") => Some(Self::Snappy),
            Some("xz") => Some(Self::Lzma),
            _ => None,
        }
    }

    fn get_compression_levels(&self) -> Vec<Option<i32>> {
        let levels: Vec<i32> = match self {
            Algorithm::Uncompressed | Algorithm::Snappy => return vec![None],
            Algorithm::Zstd => Vec::from_iter((-7..=-1).chain(1..=12)),
            Algorithm::Lz4 => Vec::from_iter((-9..=-1).chain(1..=9)),
            Algorithm::Brotli => Vec::from_iter(1..=8),
            Algorithm::Lzma => Vec::from_iter(0..=6),
        };
        levels.into_iter().map(Some).collect()
    }

    fn codec(&self, level: Option<i32>) -> compkit::Result<Arc<dyn Codec>> {
        compkit::get(self.name(), level)
    }
}

struct Measurement {
    input_len: u64,
    output_len: u64,
    elapsed: Duration,
}

impl Measurement {
    fn compression_ratio(&self) -> f64 {
        self.output_len as f64 / self.input_len as f64
    }

    fn input_throughtput(&self) -> f64 {
        self.input_len as f64 / self.elapsed.as_secs_f64()
    }

    fn output_throughtput(&self) -> f64 {
        self.output_len as f64 / self.elapsed.as_secs_f64()
    }

    fn format_compression(&self) -> String {
        format!(
            "{} => {} ({:.1} %)",
            self.input_len,
            self.output_len,
            self.compression_ratio() * 100.0
        )
    }
}

#[derive(Serialize)]
struct BenchmarkResult {
    algorithm: Algorithm,
    level: Option<i32>,
    streaming: bool,
    uncompressed_len: u64,
    compressed_len: u64,
    ratio: f64,
    inv_ratio: f64,
    compression_speed_mpbs: f64,
    decompression_speed_mpbs: f64,
}

impl BenchmarkResult {
    fn new(
        cfg: CompressionCfg,
        level: Option<i32>,
        compression: Measurement,
        decompression: Measurement,
    ) -> Self {
        Self {
            algorithm: cfg.algorithm,
            level,
            streaming: cfg.streaming,
            uncompressed_len: compression.input_len,
            compressed_len: compression.output_len,
            ratio: (compression.compression_ratio() * 1000.0).round() / 1000.0,
            inv_ratio: (1.0 / compression.compression_ratio() * 1000.0).round() / 1000.0,
            compression_speed_mpbs: (compression.input_throughtput() / 100_000.0).round() / 10.0,
            decompression_speed_mpbs: (decompression.output_throughtput() / 100_000.0).round()
                / 10.0,
        }
    }
}

impl Display for BenchmarkResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let level = self.level.map(|l| l.to_string()).unwrap_or_else(|| "-".to_owned());
        write!(
            f,
            "{:12} lev. {:>3}:    {:8} => {:8} ({:5.1}%, {:4.2}x),    \
             compr.: {:6.1} MB/s, decompr.: {:6.1} MB/s",
            self.algorithm.name(),
            level,
            human_bytes(self.uncompressed_len as f64),
            human_bytes(self.compressed_len as f64),
            self.ratio * 100.0,
            1.0 / self.ratio,
            self.compression_speed_mpbs,
            self.decompression_speed_mpbs
        )
    }
}

fn main() {
    env_logger::init();
    let cmd = Config::parse();
    if let Err(e) = run(cmd) {
        eprintln!("error: {}", e);
        exit(1);
    }
}

fn run(cmd: Config) -> anyhow::Result<()> {
    match cmd.command {
        Command::Decompress(cfg) => run_decompress_cmd(cfg),
        Command::Compress(cfg) => run_compress_cmd(cfg),
        Command::Benchmark(cfg) => run_benchmark_cmd(cfg).map(|_| ()),
        Command::BenchmarkMany(cfg) => run_benchmark_many_cmd(cfg),
        Command::List => run_list_cmd(),
    }
}

fn run_decompress_cmd(cfg: DecompressionCfg) -> anyhow::Result<()> {
    let Some(algorithm) = cfg
        .algorithm
        .or_else(|| Algorithm::from_file_name(&cfg.input.path))
    else {
        bail!(
            "Cannot determine compression algorithm from the extension. \
             Please use -a/--algorithm option."
        );
    };

    let codec = algorithm.codec(None)?;
    let input = open_input(&cfg.input)?;
    let output = open_output(&cfg.input.path, algorithm, false)?;
    let result = if cfg.streaming {
        decompress_stream(input, output, codec.as_ref())?
    } else {
        decompress(input, output, codec.as_ref())?
    };
    eprintln!(
        "{}, {:.1} MB/s",
        result.format_compression(),
        result.output_throughtput() / 1_000_000.0
    );
    Ok(())
}

fn run_compress_cmd(cfg: CompressionCfg) -> anyhow::Result<()> {
    let codec = cfg.algorithm.codec(cfg.compression)?;
    let input = open_input(&cfg.input)?;
    let output = open_output(&cfg.input.path, cfg.algorithm, true)?;
    let result = if cfg.streaming {
        compress_stream(input, output, cfg.chunk_size, codec.as_ref())?
    } else {
        compress(input, output, cfg.chunk_size, codec.as_ref())?
    };
    eprintln!(
        "{}, {:.1} MB/s",
        result.format_compression(),
        result.input_throughtput() / 1_000_000.0
    );
    Ok(())
}

fn run_benchmark_cmd(cfg: CompressionCfg) -> anyhow::Result<BenchmarkResult> {
    let codec = cfg.algorithm.codec(cfg.compression)?;

    let mut input = open_input(&cfg.input)?;
    let mut buffered_input = Vec::new();
    input.read_to_end(&mut buffered_input)?;
    let input_len = buffered_input.len();
    let mut input = Cursor::new(buffered_input);

    let mut output = Cursor::new(Vec::<u8>::with_capacity(input_len));

    let (c_perf, d_perf) = if cfg.streaming {
        let c_perf = compress_stream(&mut input, &mut output, cfg.chunk_size, codec.as_ref())?;
        output.rewind()?;
        let d_perf = decompress_stream(output, Discard::default(), codec.as_ref())?;
        (c_perf, d_perf)
    } else {
        let c_perf = compress(&mut input, &mut output, cfg.chunk_size, codec.as_ref())?;
        output.rewind()?;
        let d_perf = decompress(output, Discard::default(), codec.as_ref())?;
        (c_perf, d_perf)
    };
    let result = BenchmarkResult::new(cfg, codec.level(), c_perf, d_perf);
    println!("{}", result);
    Ok(result)
}

fn run_benchmark_many_cmd(cfg: BenchmarkManyCfg) -> anyhow::Result<()> {
    let mut results = Vec::new();

    for algorithm in cfg.algorithms {
        if cfg.streaming && !algorithm.codec(None)?.supports_streaming() {
            log::warn!("skipping {}: streaming not supported", algorithm.name());
            continue;
        }
        for level in algorithm.get_compression_levels() {
            let run_cfg = CompressionCfg {
                input: cfg.input.clone(),
                algorithm,
                compression: level,
                chunk_size: cfg.chunk_size,
                streaming: cfg.streaming,
            };
            results.push(run_benchmark_cmd(run_cfg)?);
        }
    }

    if let Some(path) = cfg.report {
        let mut writer = csv::Writer::from_path(path)?;
        for result in results {
            writer.serialize(&result)?;
        }
        writer.flush()?;
    }

    Ok(())
}

fn run_list_cmd() -> anyhow::Result<()> {
    let registry = registry::global();
    for name in registry.names() {
        let levels = match registry.levels(&name)? {
            Levels::Fixed => "-".to_owned(),
            Levels::Range { min, max, default } => {
                format!("{}..={} (default {})", min, max, default)
            }
        };
        let streaming = if registry.get(&name, None)?.supports_streaming() {
            "streaming"
        } else {
            "one-shot only"
        };
        println!("{:12} levels: {:28} {}", name, levels, streaming);
    }
    Ok(())
}

fn open_input(config: &InputCfg) -> Result<File, Error> {
    File::open(&config.path).map_err(|e| {
        Error::new(
            e.kind(),
            format!("Could not open file {}: {}", config.path.display(), e),
        )
    })
}

fn open_output(input_path: &Path, algorithm: Algorithm, compress: bool) -> Result<File, Error> {
    let output_path = if compress {
        let new_extension = match input_path.extension() {
            None => algorithm.extension().to_owned(),
            Some(ext) => format!("{}.{}", ext.to_string_lossy(), algorithm.extension()),
        };
        input_path.with_extension(new_extension)
    } else if Algorithm::from_file_name(input_path).is_some() {
        input_path.with_extension("")
    } else {
        input_path.with_extension("out")
    };
    let output = File::create(&output_path).map_err(|e| {
        Error::new(
            e.kind(),
            format!("Could not create file {}: {}", output_path.display(), e),
        )
    })?;
    Ok(output)
}

/// Compresses each chunk independently, prefixing it with the uncompressed
/// and compressed lengths.
fn compress<R: Read + Seek, W: Write + Seek>(
    input: R,
    output: W,
    chunk_size: usize,
    codec: &dyn Codec,
) -> anyhow::Result<Measurement> {
    let input = BufReader::with_capacity(chunk_size, input);
    let mut tmp_buf = vec![0; codec.max_compressed_len(chunk_size)];

    measure(input, output, |input, output| {
        while !input.fill_buf()?.is_empty() {
            let input_chunk = input.buffer();
            let uncompressed_len = input_chunk.len();
            let compressed_len = codec.compress(input_chunk, &mut tmp_buf)?;
            output.write_u32::<LittleEndian>(uncompressed_len.try_into()?)?;
            output.write_u32::<LittleEndian>(compressed_len.try_into()?)?;
            output.write_all(&tmp_buf[0..compressed_len])?;
            input.consume(uncompressed_len);
        }
        output.flush()?;
        Ok(())
    })
}

fn decompress<R: Read + Seek, W: Write + Seek>(
    input: R,
    output: W,
    codec: &dyn Codec,
) -> anyhow::Result<Measurement> {
    let input = BufReader::with_capacity(256 * 1024 * 1024, input);
    let mut src = Vec::new();
    let mut dest = Vec::new();

    measure(input, output, |input, output| {
        while !input.fill_buf()?.is_empty() {
            let uncompressed_len = input.read_u32::<LittleEndian>()?.try_into()?;
            let frame_len = input.read_u32::<LittleEndian>()?.try_into()?;
            dest.resize(uncompressed_len, 0);
            let count = if input.buffer().len() >= frame_len {
                let count = codec.decompress(&input.buffer()[0..frame_len], &mut dest)?;
                input.consume(frame_len);
                count
            } else {
                src.resize(frame_len, 0);
                input.read_exact(&mut src)?;
                codec.decompress(&src, &mut dest)?
            };
            if count != uncompressed_len {
                bail!(
                    "chunk decompressed to {} bytes, expected {}",
                    count,
                    uncompressed_len
                );
            }
            output.write_all(&dest)?;
        }
        output.flush()?;
        Ok(())
    })
}

/// Compresses the whole input as one stream, feeding it `chunk_size` bytes at a time.
fn compress_stream<R: Read + Seek, W: Write + Seek>(
    input: R,
    output: W,
    chunk_size: usize,
    codec: &dyn Codec,
) -> anyhow::Result<Measurement> {
    let mut compressor = codec.open_compressor()?;
    let mut chunk = vec![0; chunk_size.max(1)];
    let mut scratch = vec![0; DEFAULT_SCRATCH_LEN];
    let mut out = Vec::new();

    measure(input, output, |input, output| {
        loop {
            let len = input.read(&mut chunk)?;
            if len == 0 {
                break;
            }
            buffer::drive_feed(&mut compressor, &chunk[..len], &mut scratch, &mut out)?;
            output.write_all(&out)?;
            out.clear();
        }
        buffer::drive_finish(&mut compressor, &mut scratch, &mut out)?;
        output.write_all(&out)?;
        output.flush()?;
        Ok(())
    })
}

fn decompress_stream<R: Read + Seek, W: Write + Seek>(
    input: R,
    output: W,
    codec: &dyn Codec,
) -> anyhow::Result<Measurement> {
    let mut decompressor = codec.open_decompressor()?;
    let mut chunk = vec![0; 1024 * 1024];
    let mut scratch = vec![0; DEFAULT_SCRATCH_LEN];
    let mut out = Vec::new();

    measure(input, output, |input, output| {
        loop {
            let len = input.read(&mut chunk)?;
            if len == 0 {
                break;
            }
            let chunk = &chunk[..len];
            buffer::drive_decompress_chunk(&mut decompressor, chunk, &mut scratch, &mut out)?;
            output.write_all(&out)?;
            out.clear();
        }
        buffer::drive_finish_decompress(&mut decompressor, &mut scratch, &mut out)?;
        output.write_all(&out)?;
        output.flush()?;
        Ok(())
    })
}

/// Measure performance of compression or decompression
fn measure<I: Seek, O: Seek, T>(
    mut input: I,
    mut output: O,
    mut process: impl FnMut(&mut I, &mut O) -> anyhow::Result<T>,
) -> anyhow::Result<Measurement> {
    let start_time = Instant::now();
    process(&mut input, &mut output)?;
    let end_time = Instant::now();
    let input_pos = input.stream_position()?;
    let output_pos = output.stream_position()?;

    Ok(Measurement {
        input_len: input_pos,
        output_len: output_pos,
        elapsed: end_time - start_time,
    })
}
