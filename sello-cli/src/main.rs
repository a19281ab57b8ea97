use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use sello_core::{FingerprintConfig, FingerprintStore, MemoryFingerprintStore, WatermarkConfig};

#[derive(Parser)]
#[command(name = "sello", about = "Audio content security tool", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Embed an ownership watermark into a WAV file
    Embed {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Text payload to hide
        #[arg(short, long)]
        payload: String,

        /// Key passphrase
        #[arg(short, long)]
        key: String,

        /// Embedding strength (0, 1]
        #[arg(short, long, default_value = "0.1")]
        strength: f32,

        /// Frames per spread-spectrum chip bit
        #[arg(long, default_value = "16384")]
        spread_factor: u32,
    },
    /// Extract an ownership watermark from a WAV file
    Extract {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Key passphrase
        #[arg(short, long)]
        key: String,

        /// Embedding strength used at embed time
        #[arg(short, long, default_value = "0.1")]
        strength: f32,

        /// Frames per spread-spectrum chip bit
        #[arg(long, default_value = "16384")]
        spread_factor: u32,
    },
    /// Seal a WAV file with a fragile integrity chain
    Seal {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Samples per integrity block
        #[arg(long, default_value = "4096")]
        block_size: usize,
    },
    /// Verify a sealed WAV file and report tampered blocks
    Verify {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Samples per integrity block
        #[arg(long, default_value = "4096")]
        block_size: usize,
    },
    /// Encrypt WAV samples with AES-256-CTR
    Encrypt {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// 256-bit key as 64 hex chars
        #[arg(short, long)]
        key: String,

        /// 96- or 128-bit IV as 24 or 32 hex chars
        #[arg(long)]
        iv: String,
    },
    /// Decrypt WAV samples with AES-256-CTR
    Decrypt {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// 256-bit key as 64 hex chars
        #[arg(short, long)]
        key: String,

        /// 96- or 128-bit IV as 24 or 32 hex chars
        #[arg(long)]
        iv: String,
    },
    /// Fingerprint a WAV file and print landmark statistics
    Fingerprint {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Identify a clip against a directory of indexed WAV files
    Identify {
        /// Query WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Directory of reference WAV files to index
        #[arg(short = 'd', long)]
        index_dir: PathBuf,
    },
    /// Search for robust, minimally audible embedding parameters
    Tune {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Text payload the parameters must carry
        #[arg(short, long)]
        payload: String,

        /// Key passphrase
        #[arg(short, long)]
        key: String,
    },
}

/// Read a WAV file as interleaved f32 samples, preserving channels.
fn read_wav(path: &Path) -> Result<(Vec<f32>, hound::WavSpec), Box<dyn std::error::Error>> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()?,
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            let max = (1i32 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .collect::<Result<Vec<i32>, _>>()?
                .into_iter()
                .map(|s| s as f32 / max)
                .collect()
        }
    };
    Ok((samples, spec))
}

/// Write interleaved samples as a 32-bit float WAV.
fn write_wav(
    path: &Path,
    samples: &[f32],
    channels: u16,
    sample_rate: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

fn parse_hex(s: &str, what: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err(format!("{what} must have an even number of hex chars"));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .map_err(|_| format!("{what} contains non-hex characters"))
        })
        .collect()
}

fn ownership_config(key: &str, strength: f32, spread_factor: u32) -> WatermarkConfig {
    WatermarkConfig {
        key: key.to_string(),
        strength,
        spread_factor,
        ..WatermarkConfig::default()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Embed {
            input,
            output,
            payload,
            key,
            strength,
            spread_factor,
        } => {
            let (mut samples, spec) = read_wav(&input)?;
            let config = ownership_config(&key, strength, spread_factor);

            let capacity = samples.len() / spec.channels as usize;
            let needed = config.frames_for_payload(&payload);
            if needed > capacity {
                let needed_seconds = needed as f32 / spec.sample_rate as f32;
                return Err(format!(
                    "audio too short for payload: need {needed} frames (~{needed_seconds:.1}s at {}Hz), have {capacity}",
                    spec.sample_rate
                )
                .into());
            }

            eprintln!(
                "Embedding {} bytes into {} ({} samples, {}Hz)...",
                payload.len(),
                input.display(),
                samples.len(),
                spec.sample_rate
            );
            sello_core::embed(&mut samples, spec.channels as usize, &payload, &config)?;
            write_wav(&output, &samples, spec.channels, spec.sample_rate)?;
            eprintln!("Watermarked audio written to {}", output.display());
        }
        Command::Extract {
            input,
            key,
            strength,
            spread_factor,
        } => {
            let (samples, spec) = read_wav(&input)?;
            let config = ownership_config(&key, strength, spread_factor);

            eprintln!(
                "Extracting from {} ({} samples, {}Hz)...",
                input.display(),
                samples.len(),
                spec.sample_rate
            );
            match sello_core::extract(&samples, spec.channels as usize, &config) {
                Ok(found) => {
                    println!("Payload:     {}", found.text);
                    println!("Sync offset: frame {}", found.sync_offset);
                    println!("Correlation: {:.4}", found.sync_correlation);
                }
                Err(sello_core::Error::NotDetected) => {
                    eprintln!("No watermark detected.");
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::Seal {
            input,
            output,
            block_size,
        } => {
            let (mut samples, spec) = read_wav(&input)?;
            let config = WatermarkConfig {
                integrity_block_size: block_size,
                ..WatermarkConfig::default()
            };
            sello_core::seal(&mut samples, &config)?;
            write_wav(&output, &samples, spec.channels, spec.sample_rate)?;
            eprintln!(
                "Sealed {} blocks of {} samples into {}",
                samples.len() / block_size,
                block_size,
                output.display()
            );
        }
        Command::Verify { input, block_size } => {
            let (samples, spec) = read_wav(&input)?;
            if spec.sample_format != hound::SampleFormat::Float || spec.bits_per_sample != 32 {
                eprintln!(
                    "Warning: input is not 32-bit float; any seal was destroyed by quantization."
                );
            }
            let config = WatermarkConfig {
                integrity_block_size: block_size,
                ..WatermarkConfig::default()
            };
            let violations = sello_core::verify(&samples, &config)?;
            if violations.is_empty() {
                println!("Integrity chain intact ({} blocks).", samples.len() / block_size);
            } else {
                for v in &violations {
                    println!(
                        "Block {}: claimed {:#04x}, actual {:#04x}",
                        v.block_index, v.claimed, v.actual
                    );
                }
                eprintln!("{} tampered block(s) detected.", violations.len());
                std::process::exit(1);
            }
        }
        Command::Encrypt {
            input,
            output,
            key,
            iv,
        }
        | Command::Decrypt {
            input,
            output,
            key,
            iv,
        } => {
            let key = parse_hex(&key, "key")?;
            let iv = parse_hex(&iv, "iv")?;
            let (mut samples, spec) = read_wav(&input)?;

            let mut cipher = sello_core::PcmCipher::new(&key, &iv)?;
            cipher.process_samples(&mut samples);
            write_wav(&output, &samples, spec.channels, spec.sample_rate)?;
            eprintln!(
                "Processed {} samples into {}",
                samples.len(),
                output.display()
            );
        }
        Command::Fingerprint { input } => {
            let (samples, spec) = read_wav(&input)?;
            let config = FingerprintConfig::default();
            let track_id = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unknown".to_string());

            let fp = sello_core::fingerprint(
                &samples,
                spec.channels as usize,
                spec.sample_rate,
                &track_id,
                &config,
            )?;
            println!("Track:     {}", fp.track_id);
            println!("Duration:  {:.2} s", fp.duration_seconds);
            println!("Landmarks: {}", fp.hashes.len());
        }
        Command::Identify { input, index_dir } => {
            let config = FingerprintConfig::default();
            let store = MemoryFingerprintStore::new();

            let mut indexed = 0usize;
            for entry in std::fs::read_dir(&index_dir)? {
                let path = entry?.path();
                if path.extension().map(|e| e != "wav").unwrap_or(true) {
                    continue;
                }
                let track_id = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "unknown".to_string());
                let (samples, spec) = read_wav(&path)?;
                let fp = sello_core::fingerprint(
                    &samples,
                    spec.channels as usize,
                    spec.sample_rate,
                    &track_id,
                    &config,
                )?;
                store.insert(&fp)?;
                indexed += 1;
            }
            if indexed == 0 {
                return Err(format!("no WAV files found in {}", index_dir.display()).into());
            }
            eprintln!("Indexed {indexed} track(s) from {}", index_dir.display());

            let (samples, spec) = read_wav(&input)?;
            match sello_core::identify(
                &samples,
                spec.channels as usize,
                spec.sample_rate,
                &store,
                &config,
            )? {
                Some(found) => {
                    println!("Track:      {}", found.track_id);
                    println!("Position:   {:.2} s", found.match_time_seconds);
                    println!("Confidence: {} aligned hashes", found.confidence);
                    println!("Elapsed:    {:.1} ms", found.processing_time.as_secs_f64() * 1000.0);
                }
                None => {
                    eprintln!("No match found.");
                    std::process::exit(1);
                }
            }
        }
        Command::Tune {
            input,
            payload,
            key,
        } => {
            let (samples, spec) = read_wav(&input)?;
            eprintln!(
                "Tuning against {} ({} samples, {}Hz)...",
                input.display(),
                samples.len(),
                spec.sample_rate
            );
            let tuned = sello_core::tune(
                &samples,
                spec.channels as usize,
                spec.sample_rate,
                &payload,
                &key,
            )?;
            println!("Spread factor: {}", tuned.spread_factor);
            println!("Strength:      {:.3}", tuned.strength);
            if tuned.validated {
                println!("Validated:     yes");
            } else {
                println!("Validated:     no (fallback; verify after embedding)");
            }
        }
    }

    Ok(())
}
