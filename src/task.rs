//! Cooperative cancellation and progress reporting shared by all pipelines.

use std::sync::atomic::{
    AtomicBool,
    Ordering,
};
use std::sync::Arc;

/// Shared cancellation flag polled by workers at fixed checkpoints.
///
/// Clones observe the same flag. A [`child`](CancelToken::child) token is
/// cancelled whenever its parent is, but cancelling the child leaves the
/// parent untouched.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag:   Arc<AtomicBool>,
    parent: Option<Box<CancelToken>>,
}

impl CancelToken {
    pub fn new() -> Self { Self::default() }

    pub fn cancel(&self) { self.flag.store(true, Ordering::SeqCst); }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.is_cancelled())
    }

    pub fn child(&self) -> Self {
        Self {
            flag:   Arc::new(AtomicBool::new(false)),
            parent: Some(Box::new(self.clone())),
        }
    }
}

/// Receives `(percent, message)` updates, percent in `0..=100`.
pub trait ProgressSink: Send + Sync {
    fn report(
        &self,
        percent: u8,
        message: &str,
    );
}

impl<F> ProgressSink for F
where
    F: Fn(u8, &str) + Send + Sync,
{
    fn report(
        &self,
        percent: u8,
        message: &str,
    ) {
        self(percent, message)
    }
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(
        &self,
        _percent: u8,
        _message: &str,
    ) {
    }
}

/// Maps a nested pipeline's `0..=100` range onto `offset..=offset+span`.
pub struct ScaledProgress<'a> {
    inner:  &'a dyn ProgressSink,
    offset: u8,
    span:   u8,
}

impl<'a> ScaledProgress<'a> {
    pub fn new(
        inner: &'a dyn ProgressSink,
        offset: u8,
        span: u8,
    ) -> Self {
        Self {
            inner,
            offset,
            span,
        }
    }
}

impl ProgressSink for ScaledProgress<'_> {
    fn report(
        &self,
        percent: u8,
        message: &str,
    ) {
        let scaled = self.offset as u32
            + (percent.min(100) as u32 * self.span as u32) / 100;
        self.inner
            .report(scaled.min(100) as u8, message)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn child_follows_parent_only() {
        let parent = CancelToken::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let parent = CancelToken::new();
        let child = parent.child();
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn scaled_progress_maps_range() {
        let seen = Mutex::new(Vec::new());
        let sink = |p: u8, _m: &str| seen.lock().unwrap().push(p);
        let scaled = ScaledProgress::new(&sink, 0, 80);
        scaled.report(50, "half");
        scaled.report(100, "done");
        assert_eq!(*seen.lock().unwrap(), vec![40, 80]);
    }
}
