use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use mjstream::pool::EncoderPool;
use mjstream::{EncoderKind, Frame, PixelFormat, ScalePolicy, SharedState, StreamConfig};

/// MJPEG frame-encoding pipeline driver.
///
/// Feeds synthetic (or file-sourced) raw frames through the encoder pool
/// and writes the resulting JPEG packets to disk. Capture and HTTP delivery
/// live in the surrounding server; this binary exercises the core.
#[derive(Parser, Debug)]
#[command(name = "mjstream")]
#[command(about = "Encode raw video frames to MJPEG packets")]
struct Args {
    /// Encoder backend.
    #[arg(long, value_enum, default_value = "cpu-jpeg")]
    encoder: EncoderKind,

    /// Target-resolution policy.
    #[arg(long = "encode-scale", value_enum, default_value = "native")]
    encode_scale: ScalePolicy,

    /// JPEG quality, 1..99 (99 = best).
    #[arg(long, default_value_t = 80)]
    quality: u8,

    /// Parallel encoder workers.
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Number of frames to feed through the pipeline.
    #[arg(long, default_value_t = 60)]
    frames: u32,

    /// Source geometry, e.g. 1920x1080.
    #[arg(long, default_value = "1280x720")]
    size: String,

    /// Raw packed NV12 file to read frames from (synthetic pattern when
    /// omitted).
    #[arg(long)]
    input: Option<String>,

    /// Directory the JPEG packets are written to.
    #[arg(short, long, default_value = "frames")]
    output: String,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let (width, height) = parse_size(&args.size)?;

    let config = StreamConfig::new(args.encoder, args.encode_scale, args.quality, args.workers);
    config.validate().map_err(anyhow::Error::msg)?;

    let shared = SharedState::new();
    let mut pool = EncoderPool::spawn(&config.to_pool_options(), shared)?;
    fs::create_dir_all(&args.output)
        .with_context(|| format!("creating output directory {}", args.output))?;

    let input = args
        .input
        .as_deref()
        .map(fs::read)
        .transpose()
        .context("reading input file")?;
    let frame_bytes = PixelFormat::Nv12
        .bytes_per_frame(width, height, width)
        .map_err(|e| anyhow!("{}", e))?;

    let mut dispatched = 0u32;
    let mut written = 0u32;
    for i in 0..args.frames {
        let frame = match &input {
            Some(data) => frame_from_file(data, frame_bytes, width, height, i)?,
            None => synthetic_frame(width, height, i)?,
        };
        if pool.dispatch(frame) {
            dispatched += 1;
        }
        written += drain_packets(&pool, &args.output, written)?;
    }

    // Collect whatever is still in flight before tearing the pool down.
    while written < dispatched {
        match pool.packets().recv_timeout(Duration::from_secs(10)) {
            Ok(packet) => {
                write_packet(&args.output, written, &packet)?;
                written += 1;
            }
            Err(_) => break,
        }
    }
    pool.shutdown();

    println!(
        "{} frames dispatched, {} JPEG packets written to {}",
        dispatched, written, args.output
    );
    Ok(())
}

fn drain_packets(pool: &EncoderPool, dir: &str, mut index: u32) -> Result<u32> {
    let start = index;
    while let Ok(packet) = pool.packets().try_recv() {
        write_packet(dir, index, &packet)?;
        index += 1;
    }
    Ok(index - start)
}

fn write_packet(dir: &str, index: u32, packet: &Frame) -> Result<()> {
    let path = Path::new(dir).join(format!("frame-{:05}.jpg", index));
    fs::write(&path, packet.payload())
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Grey frame with a moving diagonal band so successive packets differ.
fn synthetic_frame(width: u32, height: u32, index: u32) -> Result<Frame> {
    let mut frame = Frame::new_raw(PixelFormat::Nv12, width, height)?;
    let (w, h) = (width as usize, height as usize);
    let (y_plane, uv_plane) = frame.bytes.split_at_mut(w * h);
    uv_plane.fill(0x80);
    let band = (index as usize * 8) % w.max(1);
    for row in 0..h {
        for col in 0..w {
            let on_band = (col + row) % w >= band && (col + row) % w < band + 32;
            y_plane[row * w + col] = if on_band { 0xC0 } else { 0x60 };
        }
    }
    Ok(frame)
}

fn frame_from_file(
    data: &[u8],
    frame_bytes: usize,
    width: u32,
    height: u32,
    index: u32,
) -> Result<Frame> {
    let count = data.len() / frame_bytes;
    if count == 0 {
        return Err(anyhow!(
            "input file holds no complete {}-byte NV12 frame",
            frame_bytes
        ));
    }
    let offset = (index as usize % count) * frame_bytes;
    let mut frame = Frame::new_raw(PixelFormat::Nv12, width, height)?;
    frame.bytes.copy_from_slice(&data[offset..offset + frame_bytes]);
    Ok(frame)
}

fn parse_size(size: &str) -> Result<(u32, u32)> {
    let (w, h) = size
        .split_once('x')
        .ok_or_else(|| anyhow!("size must look like 1920x1080, got {:?}", size))?;
    let w: u32 = w.parse().with_context(|| format!("bad width in {:?}", size))?;
    let h: u32 = h.parse().with_context(|| format!("bad height in {:?}", size))?;
    if w < 2 || h < 2 {
        return Err(anyhow!("size {}x{} too small", w, h));
    }
    Ok((w, h))
}
