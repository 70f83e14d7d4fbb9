//! **Editor context**
//!
//! Collaborators a kernel command may talk to while it runs: a progress sink,
//! the "reset simulation first?" confirmation gate and a cancellation token.
//! Every mutating command on [`Geometry`](crate::geometry::Geometry) receives
//! an [`EditContext`] explicitly.

use crate::errors::{KernelError, KernelResult};
use crate::float_types::Real;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Receives progress of operations that iterate over the whole geometry.
pub trait ProgressSink {
    /// `fraction` runs from 0.0 to 1.0.
    fn set_progress(&mut self, fraction: Real);

    fn set_message(&mut self, _message: &str) {}
}

/// Discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn set_progress(&mut self, _fraction: Real) {}
}

/// Forwards progress to `tracing` at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn set_progress(&mut self, fraction: Real) {
        tracing::trace!(percent = (fraction * 100.0).round(), "progress");
    }

    fn set_message(&mut self, message: &str) {
        tracing::trace!(message, "progress");
    }
}

/// Asked before any edit that invalidates existing simulation results.
pub trait ResetGate {
    /// Return `false` to abort the edit.
    fn confirm_reset(&mut self) -> bool;
}

/// Gate that accepts every edit.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysReset;

impl ResetGate for AlwaysReset {
    fn confirm_reset(&mut self) -> bool {
        true
    }
}

/// Gate that refuses every edit.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverReset;

impl ResetGate for NeverReset {
    fn confirm_reset(&mut self) -> bool {
        false
    }
}

/// Cooperative cancellation flag shared between the caller and a running command.
///
/// Clones share the same flag, so a UI thread can keep one and hand another to
/// the command.
#[derive(Debug, Default, Clone)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Clear a previous request so the token can be reused.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Bundle of collaborators passed to each kernel command.
pub struct EditContext {
    progress: Box<dyn ProgressSink>,
    gate: Box<dyn ResetGate>,
    cancel: CancellationToken,
}

impl Default for EditContext {
    fn default() -> Self {
        Self {
            progress: Box::new(NoProgress),
            gate: Box::new(AlwaysReset),
            cancel: CancellationToken::new(),
        }
    }
}

impl std::fmt::Debug for EditContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditContext")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl EditContext {
    /// Context with no progress reporting, a gate that always accepts and a fresh token.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, progress: impl ProgressSink + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn with_gate(mut self, gate: impl ResetGate + 'static) -> Self {
        self.gate = Box::new(gate);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Ask the gate; a refusal becomes [`KernelError::ResetDeclined`].
    pub fn confirm_reset(&mut self) -> KernelResult<()> {
        if self.gate.confirm_reset() {
            Ok(())
        } else {
            tracing::debug!("edit declined by reset gate");
            Err(KernelError::ResetDeclined)
        }
    }

    /// Fail with [`KernelError::Cancelled`] once the token has fired.
    pub fn check_cancelled(&self) -> KernelResult<()> {
        if self.cancel.is_cancelled() {
            Err(KernelError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Report `done` out of `total` steps.
    pub fn progress(&mut self, done: usize, total: usize) {
        let fraction = if total == 0 {
            1.0
        } else {
            done as Real / total as Real
        };
        self.progress.set_progress(fraction.clamp(0.0, 1.0));
    }

    pub fn message(&mut self, message: &str) {
        self.progress.set_message(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Arc<Mutex<Vec<Real>>>);

    impl ProgressSink for Recorder {
        fn set_progress(&mut self, fraction: Real) {
            self.0.lock().unwrap().push(fraction);
        }
    }

    #[test]
    fn token_clones_share_state() {
        let token = CancellationToken::new();
        let ctx = EditContext::new().with_cancellation(token.clone());
        assert!(ctx.check_cancelled().is_ok());
        token.cancel();
        assert_eq!(ctx.check_cancelled(), Err(KernelError::Cancelled));
        token.reset();
        assert!(ctx.check_cancelled().is_ok());
    }

    #[test]
    fn gate_refusal_is_an_error() {
        let mut ctx = EditContext::new().with_gate(NeverReset);
        assert_eq!(ctx.confirm_reset(), Err(KernelError::ResetDeclined));
        let mut ctx = EditContext::new();
        assert!(ctx.confirm_reset().is_ok());
    }

    #[test]
    fn progress_is_clamped_fraction() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut ctx = EditContext::new().with_progress(Recorder(log.clone()));
        ctx.progress(1, 4);
        ctx.progress(5, 4);
        ctx.progress(0, 0);
        assert_eq!(*log.lock().unwrap(), vec![0.25, 1.0, 1.0]);
    }
}
