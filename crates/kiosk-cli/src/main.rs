use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use kiosk_core::detector::SCRFD_MODEL_FILE;
use kiosk_core::presence::DEFAULT_MIN_CONFIDENCE;
use kiosk_core::{Detection, PresenceDetector, ScrfdDetector};
use kiosk_hw::{Camera, Frame};

#[zbus::proxy(
    interface = "org.smartspecs.Kiosk1",
    default_service = "org.smartspecs.Kiosk1",
    default_path = "/org/smartspecs/Kiosk1"
)]
trait Kiosk {
    async fn send_message(&self, text: &str) -> zbus::Result<bool>;
    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "kiosk", about = "Presence kiosk CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon status
    Status,
    /// Have the assistant say something
    Say {
        /// Message text
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// List V4L2 capture devices
    Devices,
    /// Run presence detection on a still image
    Probe {
        /// Image file (any format the `image` crate reads)
        image: PathBuf,
        #[command(flatten)]
        model: ModelArgs,
    },
    /// Run camera diagnostics
    Test {
        /// V4L2 device path
        #[arg(short, long, default_value = "/dev/video0")]
        device: String,
        /// Number of frames to capture
        #[arg(short = 'n', long, default_value_t = 10)]
        frames: usize,
        #[command(flatten)]
        model: ModelArgs,
    },
}

#[derive(clap::Args)]
struct ModelArgs {
    /// Directory containing det_10g.onnx
    #[arg(long)]
    model_dir: Option<PathBuf>,
    /// Minimum face confidence
    #[arg(long, default_value_t = DEFAULT_MIN_CONFIDENCE)]
    min_confidence: f32,
}

impl ModelArgs {
    fn load(&self) -> Result<PresenceDetector<ScrfdDetector>> {
        let path = self
            .model_dir
            .clone()
            .unwrap_or_else(kiosk_core::default_model_dir)
            .join(SCRFD_MODEL_FILE);
        let path = path.to_string_lossy();
        let detector = ScrfdDetector::load(&path)
            .with_context(|| format!("failed to load detector from {path}"))?
            .with_confidence_threshold(self.min_confidence);
        Ok(PresenceDetector::new(detector).with_min_confidence(self.min_confidence))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Status => {
            let proxy = connect().await?;
            let raw = proxy.status().await.context("Status call failed")?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Say { text } => {
            let text = text.join(" ");
            let proxy = connect().await?;
            if proxy.send_message(&text).await? {
                println!("sent");
            } else {
                println!("nothing to send");
            }
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("no capture devices found");
            }
            for dev in devices {
                println!("{}\t{}\t{} ({})", dev.path, dev.name, dev.driver, dev.bus);
            }
        }
        Commands::Probe { image, model } => {
            let img = image::open(&image)
                .with_context(|| format!("failed to read {}", image.display()))?
                .to_luma8();
            let (width, height) = img.dimensions();
            let frame = Frame::new(img.into_raw(), width, height, 0);

            let mut detector = model.load()?;
            println!("{}: {width}x{height}", image.display());
            report(&mut detector, &frame)?;
        }
        Commands::Test { device, frames, model } => {
            if frames == 0 {
                bail!("--frames must be at least 1");
            }
            let mut detector = model.load()?;
            let camera = Camera::open(&device, 30)?;
            println!(
                "{}: {}x{} {:?}",
                camera.device_path, camera.width, camera.height, camera.fourcc
            );

            let started = Instant::now();
            let captured = camera.capture_frames(frames)?;
            let elapsed = started.elapsed();
            for frame in &captured {
                print!("#{:<4} ", frame.sequence);
                report(&mut detector, frame)?;
            }
            println!(
                "{} frames in {:.2}s ({:.1} fps)",
                captured.len(),
                elapsed.as_secs_f32(),
                captured.len() as f32 / elapsed.as_secs_f32().max(f32::EPSILON)
            );
        }
    }

    Ok(())
}

async fn connect() -> Result<KioskProxy<'static>> {
    let conn = zbus::connection::Builder::session()?
        .method_timeout(Duration::from_secs(5))
        .build()
        .await
        .context("failed to connect to the session bus")?;
    KioskProxy::new(&conn)
        .await
        .context("kioskd is not reachable")
}

fn report(detector: &mut PresenceDetector<ScrfdDetector>, frame: &Frame) -> Result<()> {
    let brightness = frame.avg_brightness();
    if frame.is_dark {
        println!("dark (brightness {brightness:.1})");
        return Ok(());
    }
    let detection: Detection =
        detector.detect(&frame.data, frame.width, frame.height, frame.timestamp)?;
    match detection.bucket() {
        Some(bucket) => println!(
            "face_size {:.3} -> {bucket}{} (brightness {brightness:.1})",
            detection.face_size,
            if bucket.is_in_range() { ", in range" } else { "" }
        ),
        None => println!("no face (brightness {brightness:.1})"),
    }
    Ok(())
}
