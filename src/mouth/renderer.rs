//! Consumers of fired mouth cues.

use crate::mouth::event::MouthKind;
use std::sync::Mutex;
use std::time::Instant;

/// Receives mouth cues as they fire.
///
/// Only the kind is delivered. Renderers see no positions or session data, and
/// they run on the scheduler thread, so they should return quickly.
pub trait MouthRenderer: Send + Sync {
    fn render(&self, kind: MouthKind);
}

impl<F> MouthRenderer for F
where
    F: Fn(MouthKind) + Send + Sync,
{
    fn render(&self, kind: MouthKind) {
        self(kind)
    }
}

/// Prints `open` / `close` lines to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleRenderer;

impl MouthRenderer for ConsoleRenderer {
    fn render(&self, kind: MouthKind) {
        println!("{}", kind);
    }
}

/// Logs cues at debug level and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRenderer;

impl MouthRenderer for LogRenderer {
    fn render(&self, kind: MouthKind) {
        tracing::debug!(kind = %kind, "mouth");
    }
}

/// Records every cue with the instant it fired.
#[derive(Debug, Default)]
pub struct CollectingRenderer {
    fired: Mutex<Vec<(MouthKind, Instant)>>,
}

impl CollectingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kinds in firing order.
    pub fn kinds(&self) -> Vec<MouthKind> {
        self.fired().into_iter().map(|(kind, _)| kind).collect()
    }

    /// Kinds with their firing instants.
    pub fn fired(&self) -> Vec<(MouthKind, Instant)> {
        match self.fired.lock() {
            Ok(fired) => fired.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.fired().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MouthRenderer for CollectingRenderer {
    fn render(&self, kind: MouthKind) {
        let now = Instant::now();
        match self.fired.lock() {
            Ok(mut fired) => fired.push((kind, now)),
            Err(poisoned) => poisoned.into_inner().push((kind, now)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn collecting_renderer_records_in_order() {
        let renderer = CollectingRenderer::new();
        assert!(renderer.is_empty());

        renderer.render(MouthKind::Open);
        renderer.render(MouthKind::Close);

        assert_eq!(renderer.kinds(), vec![MouthKind::Open, MouthKind::Close]);
        let fired = renderer.fired();
        assert!(fired[0].1 <= fired[1].1);
    }

    #[test]
    fn closures_are_renderers() {
        let opens = AtomicUsize::new(0);
        let renderer = |kind: MouthKind| {
            if kind == MouthKind::Open {
                opens.fetch_add(1, Ordering::SeqCst);
            }
        };
        renderer.render(MouthKind::Open);
        renderer.render(MouthKind::Close);
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn console_and_log_renderers_do_not_panic() {
        ConsoleRenderer.render(MouthKind::Open);
        LogRenderer.render(MouthKind::Close);
    }
}
