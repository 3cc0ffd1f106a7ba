//! Cancellation flag observed by the runner between experiments.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{BenchError, Result};

/// Shared "stop scheduling" flag.
///
/// Cloning yields a handle to the same flag. The runner only looks at it
/// between two experiments; a running command and its samplers always run
/// to completion.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    /// A flag that is only ever set through [`Interrupt::trigger`]
    pub fn new() -> Self {
        Self::default()
    }

    /// A flag that is also set when the process receives Ctrl+C.
    ///
    /// Only one Ctrl+C handler can be installed per process.
    pub fn install_ctrlc() -> Result<Self> {
        let interrupt = Self::new();
        let flag = Arc::clone(&interrupt.flag);

        ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
        })
        .map_err(|e| BenchError::SignalHandler(e.to_string()))?;

        Ok(interrupt)
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
