use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub mod inspect;
pub mod record;
pub mod runner;
pub mod streamer;

/// Shared stop request, raised from the signal handler and polled by the capture loop.
#[derive(Clone, Debug, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
