//! Mouth events and their derivation from synthesis boundaries.

use crate::defaults;
use crate::speech::engine::{BoundaryEvent, BoundaryKind};

/// Whether the mouth should be open or closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouthKind {
    Open,
    Close,
}

impl MouthKind {
    /// Lowercase name, as printed by the console renderer.
    pub fn as_str(&self) -> &'static str {
        match self {
            MouthKind::Open => "open",
            MouthKind::Close => "close",
        }
    }
}

impl std::fmt::Display for MouthKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mouth movement at an offset from the start of the utterance audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouthEvent {
    pub position_ms: u64,
    pub kind: MouthKind,
}

impl MouthEvent {
    pub fn open(position_ms: u64) -> Self {
        Self {
            position_ms,
            kind: MouthKind::Open,
        }
    }

    pub fn close(position_ms: u64) -> Self {
        Self {
            position_ms,
            kind: MouthKind::Close,
        }
    }
}

/// Turns word and end-of-utterance boundaries into open/close events.
///
/// State persists across synthesis chunks of one utterance, so a word that
/// starts in a later chunk still closes a mouth opened in an earlier one.
/// Call [`reset`](Self::reset) between utterances.
#[derive(Debug, Clone)]
pub struct MouthTracker {
    state: MouthKind,
    close_lead_ms: u64,
}

impl MouthTracker {
    pub fn new(close_lead_ms: u64) -> Self {
        Self {
            state: MouthKind::Close,
            close_lead_ms,
        }
    }

    /// Current mouth state after the events seen so far.
    pub fn state(&self) -> MouthKind {
        self.state
    }

    /// Feed one boundary event, appending any resulting mouth events to `out`.
    ///
    /// A look-back close is clamped at zero. It may land before the previous
    /// open when two words start less than `close_lead_ms` apart.
    pub fn observe(&mut self, event: &BoundaryEvent, out: &mut Vec<MouthEvent>) {
        match event.kind {
            BoundaryKind::Word => {
                if self.state == MouthKind::Open {
                    let close_at = event.position_ms.saturating_sub(self.close_lead_ms);
                    out.push(MouthEvent::close(close_at));
                }
                out.push(MouthEvent::open(event.position_ms));
                self.state = MouthKind::Open;
            }
            BoundaryKind::End => {
                out.push(MouthEvent::close(event.position_ms));
                self.state = MouthKind::Close;
            }
            BoundaryKind::Sentence | BoundaryKind::Other => {}
        }
    }

    /// Return to a closed mouth.
    pub fn reset(&mut self) {
        self.state = MouthKind::Close;
    }
}

impl Default for MouthTracker {
    fn default() -> Self {
        Self::new(defaults::CLOSE_LEAD_MS)
    }
}

/// Derive the mouth events for a complete boundary sequence, starting closed.
pub fn derive_mouth_events(events: &[BoundaryEvent], close_lead_ms: u64) -> Vec<MouthEvent> {
    let mut tracker = MouthTracker::new(close_lead_ms);
    let mut out = Vec::with_capacity(events.len() * 2);
    for event in events {
        tracker.observe(event, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derive(events: &[BoundaryEvent]) -> Vec<MouthEvent> {
        derive_mouth_events(events, defaults::CLOSE_LEAD_MS)
    }

    #[test]
    fn single_word_opens_mouth() {
        let events = derive(&[BoundaryEvent::word(500)]);
        assert_eq!(events, vec![MouthEvent::open(500)]);
    }

    #[test]
    fn second_word_closes_before_reopening() {
        let events = derive(&[BoundaryEvent::word(500), BoundaryEvent::word(900)]);
        assert_eq!(
            events,
            vec![
                MouthEvent::open(500),
                MouthEvent::close(880),
                MouthEvent::open(900)
            ]
        );
    }

    #[test]
    fn end_of_utterance_closes_mouth() {
        let events = derive(&[BoundaryEvent::word(300), BoundaryEvent::end(1000)]);
        assert_eq!(events, vec![MouthEvent::open(300), MouthEvent::close(1000)]);
    }

    #[test]
    fn end_without_word_still_closes() {
        let events = derive(&[BoundaryEvent::end(750)]);
        assert_eq!(events, vec![MouthEvent::close(750)]);
    }

    #[test]
    fn early_look_back_is_clamped_to_zero() {
        let events = derive(&[BoundaryEvent::word(0), BoundaryEvent::word(5)]);
        assert_eq!(
            events,
            vec![
                MouthEvent::open(0),
                MouthEvent::close(0),
                MouthEvent::open(5)
            ]
        );
    }

    #[test]
    fn close_words_look_back_past_previous_open() {
        let events = derive(&[BoundaryEvent::word(500), BoundaryEvent::word(510)]);
        assert_eq!(
            events,
            vec![
                MouthEvent::open(500),
                MouthEvent::close(490),
                MouthEvent::open(510)
            ]
        );
    }

    #[test]
    fn look_back_is_fixed_lead_before_each_word() {
        let boundaries = [
            BoundaryEvent::word(5),
            BoundaryEvent::word(12),
            BoundaryEvent::sentence(40),
            BoundaryEvent::word(40),
            BoundaryEvent::word(400),
            BoundaryEvent::word(415),
            BoundaryEvent::end(900),
        ];
        let closes: Vec<u64> = derive(&boundaries)
            .iter()
            .filter(|e| e.kind == MouthKind::Close)
            .map(|e| e.position_ms)
            .collect();
        assert_eq!(closes, vec![0, 20, 380, 395, 900]);
    }

    #[test]
    fn sentence_and_other_boundaries_are_ignored() {
        let events = derive(&[BoundaryEvent::sentence(0), BoundaryEvent::other(10)]);
        assert!(events.is_empty());
    }

    #[test]
    fn tracker_state_follows_events() {
        let mut tracker = MouthTracker::default();
        let mut out = Vec::new();
        assert_eq!(tracker.state(), MouthKind::Close);

        tracker.observe(&BoundaryEvent::word(100), &mut out);
        assert_eq!(tracker.state(), MouthKind::Open);

        tracker.observe(&BoundaryEvent::end(300), &mut out);
        assert_eq!(tracker.state(), MouthKind::Close);
    }

    #[test]
    fn reset_forgets_open_mouth() {
        let mut tracker = MouthTracker::default();
        let mut out = Vec::new();
        tracker.observe(&BoundaryEvent::word(100), &mut out);
        tracker.reset();
        out.clear();

        tracker.observe(&BoundaryEvent::word(50), &mut out);
        assert_eq!(out, vec![MouthEvent::open(50)]);
    }

    #[test]
    fn custom_close_lead() {
        let events = derive_mouth_events(&[BoundaryEvent::word(100), BoundaryEvent::word(200)], 50);
        assert_eq!(events[1], MouthEvent::close(150));
    }

    #[test]
    fn kind_display() {
        assert_eq!(MouthKind::Open.to_string(), "open");
        assert_eq!(MouthKind::Close.to_string(), "close");
    }
}
