use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use thumbgrab::{
    DemuxContext, FfmpegLogLevel, HardwareDeviceType, PlatformContext, Quality, Thumbnailer,
    ThumbnailerConfig,
};

const CLI_AFTER_HELP: &str = "Examples:\n  thumbgrab extract input.mp4 --at 00:01:30 --size 320 --out thumb.png\n  thumbgrab extract input.mkv --quality hq --hardware --json\n  thumbgrab sweep input.mp4 --count 12 --out thumbs --progress\n  thumbgrab devices\n  thumbgrab completions zsh > _thumbgrab";

#[derive(Debug, Parser)]
#[command(
    name = "thumbgrab",
    version,
    about = "Grab fast thumbnails from video files",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional output.
    #[arg(long)]
    verbose: bool,

    /// Show a progress bar where supported.
    #[arg(long)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long)]
    overwrite: bool,

    /// FFmpeg log level (quiet, fatal, error, warning, info, debug).
    #[arg(long)]
    log_level: Option<String>,

    /// Hardware device type used with --hardware (cuda, vaapi, dxva2,
    /// d3d11va, videotoolbox, qsv, mediacodec).
    #[arg(long)]
    device: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract one thumbnail.
    #[command(
        after_help = "Examples:\n  thumbgrab extract input.mp4 --at 12.5 --out thumb.png\n  thumbgrab extract input.mp4 --at 0:42 --size 128 --quality fast --json"
    )]
    Extract {
        /// Input media file.
        input: PathBuf,

        /// Position as seconds, MM:SS, or HH:MM:SS.
        #[arg(long, default_value = "0")]
        at: String,

        /// Longest side of the thumbnail in pixels.
        #[arg(long, default_value_t = 256)]
        size: u32,

        /// Quality tier (fast, normal, hq).
        #[arg(long, default_value = "normal")]
        quality: String,

        /// Try hardware decoding.
        #[arg(long)]
        hardware: bool,

        /// Output image path; the extension picks the format.
        #[arg(long, default_value = "thumbnail.png")]
        out: PathBuf,

        /// Print a JSON report instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Extract evenly spaced thumbnails across the whole file.
    #[command(
        after_help = "Examples:\n  thumbgrab sweep input.mp4 --count 8 --out thumbs\n  thumbgrab sweep input.mp4 --count 24 --size 160 --quality fast --ext jpg --progress"
    )]
    Sweep {
        /// Input media file.
        input: PathBuf,

        /// Number of thumbnails.
        #[arg(long, default_value_t = 10)]
        count: u32,

        /// Longest side of each thumbnail in pixels.
        #[arg(long, default_value_t = 256)]
        size: u32,

        /// Quality tier (fast, normal, hq).
        #[arg(long, default_value = "fast")]
        quality: String,

        /// Try hardware decoding.
        #[arg(long)]
        hardware: bool,

        /// Output directory.
        #[arg(long)]
        out: PathBuf,

        /// Image extension (png, jpg, bmp).
        #[arg(long, default_value = "png")]
        ext: String,
    },
    /// List hardware device types supported by the linked FFmpeg.
    Devices {
        /// Print JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_quality(value: &str) -> Option<Quality> {
    match value.trim().to_ascii_lowercase().as_str() {
        "fast" | "0" => Some(Quality::Fast),
        "normal" | "1" => Some(Quality::Normal),
        "hq" | "high" | "2" => Some(Quality::Hq),
        _ => None,
    }
}

fn parse_position(value: &str) -> Result<Duration, Box<dyn std::error::Error>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("position cannot be empty".into());
    }

    if let Ok(seconds) = trimmed.parse::<f64>() {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(format!("invalid position: {trimmed}").into());
        }
        return Ok(Duration::try_from_secs_f64(seconds)?);
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(format!("invalid position format: {trimmed}").into());
    }

    let (hours, minutes, seconds_str) = if parts.len() == 3 {
        (parts[0].parse::<u64>()?, parts[1].parse::<u64>()?, parts[2])
    } else {
        (0_u64, parts[0].parse::<u64>()?, parts[1])
    };

    let seconds = seconds_str.parse::<f64>()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(format!("invalid position: {trimmed}").into());
    }
    let total_seconds = (hours as f64 * 3600.0) + (minutes as f64 * 60.0) + seconds;
    Ok(Duration::try_from_secs_f64(total_seconds)?)
}

/// Positions of `count` thumbnails spread over `duration`, each in the
/// middle of its slice so the first and last frames are avoided.
fn sweep_positions(duration: Duration, count: u32) -> Vec<f64> {
    let total = duration.as_secs_f64();
    if count == 0 || total <= 0.0 {
        return Vec::new();
    }
    let step = total / count as f64;
    (0..count)
        .map(|index| step * (index as f64 + 0.5))
        .collect()
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn build_thumbnailer(global: &GlobalOptions) -> Result<Thumbnailer, Box<dyn std::error::Error>> {
    let mut config = ThumbnailerConfig::new();
    if let Some(name) = &global.device {
        let device = HardwareDeviceType::from_name(name)
            .ok_or(format!("unsupported --device: {name}"))?;
        config = config.with_hardware_device(device);
    }

    let thumbnailer = Thumbnailer::with_config(config);
    thumbnailer.initialize(PlatformContext::none())?;
    Ok(thumbnailer)
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    let level = match &global.log_level {
        Some(level) => FfmpegLogLevel::from_name(level)
            .ok_or(format!("unsupported --log-level: {level}"))?,
        None => FfmpegLogLevel::Error,
    };
    thumbgrab::set_ffmpeg_log_level(level);
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Extract {
            input,
            at,
            size,
            quality,
            hardware,
            out,
            json,
        } => {
            let quality =
                parse_quality(&quality).ok_or(format!("unsupported --quality: {quality}"))?;
            let position = parse_position(&at)?;
            ensure_writable_path(&out, cli.global.overwrite)?;

            let thumbnailer = build_thumbnailer(&cli.global)?;
            let started = Instant::now();
            let image = thumbnailer.extract(
                &input,
                position.as_secs_f64(),
                size,
                hardware,
                quality,
            )?;
            let elapsed = started.elapsed();
            image.save(&out)?;

            if json {
                let payload = json!({
                    "input": input.display().to_string(),
                    "output": out.display().to_string(),
                    "position_seconds": position.as_secs_f64(),
                    "quality": quality.to_string(),
                    "hardware_requested": hardware,
                    "hardware_available": thumbnailer.hardware().is_available(),
                    "width": image.width(),
                    "height": image.height(),
                    "elapsed_ms": elapsed.as_secs_f64() * 1000.0,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "{} {}",
                    "success:".green().bold(),
                    format!(
                        "{}x{} thumbnail at {:.3}s written to {} in {:.1} ms",
                        image.width(),
                        image.height(),
                        position.as_secs_f64(),
                        out.display(),
                        elapsed.as_secs_f64() * 1000.0
                    )
                    .green()
                );
            }
        }
        Commands::Sweep {
            input,
            count,
            size,
            quality,
            hardware,
            out,
            ext,
        } => {
            let quality =
                parse_quality(&quality).ok_or(format!("unsupported --quality: {quality}"))?;
            if count == 0 {
                return Err("--count must be greater than 0".into());
            }

            if out.exists() {
                if !cli.global.overwrite {
                    return Err(format!(
                        "output directory already exists: {} (use --overwrite)",
                        out.display()
                    )
                    .into());
                }
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    format!("writing into existing directory {}", out.display()).yellow()
                );
            } else {
                fs::create_dir_all(&out)?;
            }

            let thumbnailer = build_thumbnailer(&cli.global)?;
            let duration = DemuxContext::open(&input, Quality::Fast.profile().probe)?
                .duration()
                .ok_or("input has no known duration")?;
            let positions = sweep_positions(duration, count);
            let ext_clean = ext.trim_start_matches('.').to_ascii_lowercase();

            let progress_bar = if cli.global.progress {
                let pb = ProgressBar::new(positions.len() as u64);
                let style = ProgressStyle::with_template(
                    "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}",
                )?;
                pb.set_style(style.progress_chars("##-"));
                Some(pb)
            } else {
                None
            };

            let mut written = 0_u32;
            for (index, position) in positions.iter().enumerate() {
                let output_path = out.join(format!("thumb_{index:04}.{ext_clean}"));
                match thumbnailer.extract(&input, *position, size, hardware, quality) {
                    Ok(image) => {
                        image.save(&output_path)?;
                        written += 1;
                        if cli.global.verbose {
                            eprintln!("{position:.3}s -> {}", output_path.display());
                        }
                    }
                    Err(error) => {
                        eprintln!(
                            "{} {}",
                            "warning:".yellow().bold(),
                            format!("no thumbnail at {position:.3}s: {error}").yellow()
                        );
                    }
                }

                if let Some(pb) = &progress_bar {
                    pb.inc(1);
                }
            }

            if let Some(pb) = progress_bar {
                pb.finish_with_message("done");
            }

            println!(
                "{} {}",
                "success:".green().bold(),
                format!("Wrote {written}/{count} thumbnail(s) to {}", out.display()).green()
            );
        }
        Commands::Devices { json } => {
            let devices = thumbgrab::available_hardware_devices();
            let preferred = HardwareDeviceType::platform_default();
            if json {
                let payload = json!({
                    "platform_default": preferred.name(),
                    "available": devices.iter().map(|device| device.name()).collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else if devices.is_empty() {
                println!("No hardware device types in this FFmpeg build");
            } else {
                for device in devices {
                    if device == preferred {
                        println!("{} {}", device.name(), "(platform default)".cyan());
                    } else {
                        println!("{}", device.name());
                    }
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "thumbgrab", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{parse_position, parse_quality, sweep_positions};
    use thumbgrab::Quality;

    #[test]
    fn parse_quality_aliases() {
        assert_eq!(parse_quality("fast"), Some(Quality::Fast));
        assert_eq!(parse_quality("NORMAL"), Some(Quality::Normal));
        assert_eq!(parse_quality("hq"), Some(Quality::Hq));
        assert_eq!(parse_quality("2"), Some(Quality::Hq));
        assert!(parse_quality("ultra").is_none());
    }

    #[test]
    fn parse_position_formats() {
        assert_eq!(parse_position("75").unwrap().as_secs(), 75);
        assert_eq!(parse_position("01:15").unwrap().as_secs(), 75);
        assert_eq!(parse_position("00:01:15.5").unwrap().as_millis(), 75_500);
        assert!(parse_position("-3").is_err());
        assert!(parse_position("").is_err());
        assert!(parse_position("1:2:3:4").is_err());
        assert!(parse_position("1e20").is_err());
        assert!(parse_position(&format!("{}:00:00", u64::MAX)).is_err());
    }

    #[test]
    fn sweep_positions_are_centered_in_their_slices() {
        let positions = sweep_positions(Duration::from_secs(10), 5);
        assert_eq!(positions, vec![1.0, 3.0, 5.0, 7.0, 9.0]);
        assert!(sweep_positions(Duration::ZERO, 5).is_empty());
        assert!(sweep_positions(Duration::from_secs(10), 0).is_empty());
    }
}
