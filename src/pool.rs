//! Worker pool: N parallel encoder instances fed round-robin.
//!
//! Each worker is an OS thread owning one [`Encoder`]; the vendor adapter
//! is not thread-safe, so an instance never leaves its thread. Workers
//! share only the read-mostly overlay/blocking state inside
//! [`SharedState`]. Per-worker queues are bounded to one frame: a busy
//! worker exerts backpressure and the dispatcher moves on to the next one,
//! dropping the frame only when every worker is mid-encode.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;

use mj_scale::ScalePolicy;

use crate::encoder::{Encoder, EncoderKind};
use crate::error::{EncodeError, Result};
use crate::frame::Frame;
use crate::SharedState;

#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    pub workers: usize,
    pub kind: EncoderKind,
    pub quality: u8,
    pub policy: ScalePolicy,
}

struct Worker {
    tx: SyncSender<Frame>,
    handle: thread::JoinHandle<()>,
}

/// Dispatches frames to encoder workers and collects finished packets.
pub struct EncoderPool {
    workers: Vec<Worker>,
    packets: Receiver<Frame>,
    shutdown: Arc<AtomicBool>,
    next: usize,
}

impl EncoderPool {
    pub fn spawn(opts: &PoolOptions, shared: SharedState) -> Result<Self> {
        let count = opts.workers.max(1);
        let (out_tx, out_rx) = mpsc::channel();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(count);
        for i in 0..count {
            let name = format!("jpeg-worker-{}", i);
            let encoder = Encoder::new(opts.kind, &name, opts.quality, opts.policy, shared.clone())?;
            let (tx, rx) = mpsc::sync_channel::<Frame>(1);
            let out_tx: Sender<Frame> = out_tx.clone();
            let stop = shutdown.clone();
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker_loop(name, encoder, rx, out_tx, stop))
                .map_err(|e| EncodeError::alloc("worker thread", e.to_string()))?;
            workers.push(Worker { tx, handle });
        }

        Ok(Self {
            workers,
            packets: out_rx,
            shutdown,
            next: 0,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Hand one frame to the next free worker, round-robin. Returns `false`
    /// when every worker is busy and the frame was dropped; the streaming
    /// side simply skips it.
    pub fn dispatch(&mut self, frame: Frame) -> bool {
        let mut frame = frame;
        for _ in 0..self.workers.len() {
            let idx = self.next;
            self.next = (self.next + 1) % self.workers.len();
            match self.workers[idx].tx.try_send(frame) {
                Ok(()) => return true,
                Err(TrySendError::Full(back)) | Err(TrySendError::Disconnected(back)) => {
                    frame = back;
                }
            }
        }
        false
    }

    /// Finished JPEG packets, in completion order (not submission order).
    pub fn packets(&self) -> &Receiver<Frame> {
        &self.packets
    }

    /// Signal workers, close their queues, and join them.
    pub fn shutdown(self) {
        self.shutdown.store(true, Ordering::Release);
        for worker in self.workers {
            // Closing the queue unblocks the worker's recv.
            drop(worker.tx);
            if worker.handle.join().is_err() {
                log::error!("encoder worker panicked during shutdown");
            }
        }
    }
}

fn worker_loop(
    name: String,
    mut encoder: Encoder,
    rx: Receiver<Frame>,
    out: Sender<Frame>,
    stop: Arc<AtomicBool>,
) {
    while let Ok(frame) = rx.recv() {
        if stop.load(Ordering::Acquire) {
            break;
        }
        let mut packet = Frame::new_output();
        match encoder.compress(&frame, &mut packet) {
            Ok(()) => {
                if out.send(packet).is_err() {
                    break;
                }
            }
            // A failed encode drops this single frame; the next one may
            // succeed (a reconfigure failure resets the adapter).
            Err(e) => log::warn!("{}: dropping frame: {}", name, e),
        }
    }
}
