use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Failure,
}

impl Tone {
    pub fn frequency_hz(self) -> u32 {
        match self {
            Self::Success => 880,
            Self::Failure => 220,
        }
    }

    pub fn duration(self) -> Duration {
        match self {
            Self::Success => Duration::from_millis(150),
            Self::Failure => Duration::from_millis(300),
        }
    }
}

/// Receives operator feedback signals. Implementations must return promptly; the
/// controller does not wait on them and ignores how they are rendered.
pub trait FeedbackSink: Send + Sync {
    fn signal(&self, tone: Tone);
}

pub struct SilentFeedback;

impl FeedbackSink for SilentFeedback {
    fn signal(&self, _tone: Tone) {}
}

impl<T: FeedbackSink + ?Sized> FeedbackSink for std::sync::Arc<T> {
    fn signal(&self, tone: Tone) {
        (**self).signal(tone)
    }
}
