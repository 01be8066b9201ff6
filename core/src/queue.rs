//! Bounded queue between audio capture and pulse analysis.
//!
//! Capture cadence is dictated by the hardware buffer and must never wait
//! on a slow FFT, so the producer side is strictly non-blocking: when the
//! queue is full the incoming block is dropped and counted, and capture
//! carries on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A contiguous run of capture samples and the absolute index of its first
/// sample in the stream.
#[derive(Debug, Clone)]
pub struct SampleBlock {
    pub samples: Vec<f32>,
    pub start_sample: u64,
}

pub fn sample_queue(capacity: usize) -> (SampleQueueSender, SampleQueueReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        SampleQueueSender {
            tx,
            dropped: dropped.clone(),
        },
        SampleQueueReceiver { rx, dropped },
    )
}

/// Producer half, owned by the capture thread.
#[derive(Clone)]
pub struct SampleQueueSender {
    tx: mpsc::Sender<SampleBlock>,
    dropped: Arc<AtomicU64>,
}

impl SampleQueueSender {
    /// Non-blocking push. Returns false when the block was dropped, either
    /// because the queue is full or because the consumer is gone.
    pub fn push(&self, block: SampleBlock) -> bool {
        match self.tx.try_send(block) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// True once the consumer half has been dropped; producers use this to
    /// shut down.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half, owned by the analysis loop.
pub struct SampleQueueReceiver {
    rx: mpsc::Receiver<SampleBlock>,
    dropped: Arc<AtomicU64>,
}

impl SampleQueueReceiver {
    pub async fn recv(&mut self) -> Option<SampleBlock> {
        self.rx.recv().await
    }

    pub fn blocking_recv(&mut self) -> Option<SampleBlock> {
        self.rx.blocking_recv()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
