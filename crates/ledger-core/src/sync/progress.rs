//! Progress and data-changed notifications.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

const CHANNEL_CAPACITY: usize = 64;

struct Channels {
    progress: broadcast::Sender<u8>,
    data_changed: broadcast::Sender<bool>,
}

/// Broadcasts sync progress (0..=100) and data-changed signals to any number
/// of observers.
///
/// Each subscriber sees every value emitted after it subscribed, in emission
/// order. Observers that fall behind by more than the channel capacity lose
/// the oldest values. After [`close`](Self::close) every stream ends and
/// further emissions are dropped.
#[derive(Clone)]
pub struct ProgressReporter {
    channels: Arc<Mutex<Option<Channels>>>,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (progress, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (data_changed, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            channels: Arc::new(Mutex::new(Some(Channels {
                progress,
                data_changed,
            }))),
        }
    }

    /// Emit a progress value, clamped to 100
    pub fn emit_progress(&self, percent: u8) {
        if let Some(channels) = self.channels.lock().as_ref() {
            // No subscribers is fine
            let _ = channels.progress.send(percent.min(100));
        }
    }

    /// Signal that local data changed
    pub fn notify_data_changed(&self, changed: bool) {
        if let Some(channels) = self.channels.lock().as_ref() {
            let _ = channels.data_changed.send(changed);
        }
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<u8> {
        match self.channels.lock().as_ref() {
            Some(channels) => channels.progress.subscribe(),
            None => closed_receiver(),
        }
    }

    pub fn subscribe_data_changed(&self) -> broadcast::Receiver<bool> {
        match self.channels.lock().as_ref() {
            Some(channels) => channels.data_changed.subscribe(),
            None => closed_receiver(),
        }
    }

    /// Progress values as a stream; lagged values are skipped
    pub fn progress_stream(&self) -> impl Stream<Item = u8> + Send + Unpin {
        BroadcastStream::new(self.subscribe_progress()).filter_map(Result::ok)
    }

    /// Data-changed signals as a stream; lagged values are skipped
    pub fn data_changed_stream(&self) -> impl Stream<Item = bool> + Send + Unpin {
        BroadcastStream::new(self.subscribe_data_changed()).filter_map(Result::ok)
    }

    /// End every subscription. Idempotent.
    pub fn close(&self) {
        self.channels.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        self.channels.lock().is_none()
    }
}

fn closed_receiver<T: Clone>() -> broadcast::Receiver<T> {
    let (_, receiver) = broadcast::channel(1);
    receiver
}
