use std::io::{self, Write};

use scan_session::{FeedbackSink, Tone};
use tracing::trace;

/// Terminal stand-in for the scan tones. A terminal cannot pick a pitch, so failures ring
/// the bell twice.
pub struct TerminalBell;

impl FeedbackSink for TerminalBell {
    fn signal(&self, tone: Tone) {
        let bell: &[u8] = match tone {
            Tone::Success => b"\x07",
            Tone::Failure => b"\x07\x07",
        };
        trace!(
            ?tone,
            hz = tone.frequency_hz(),
            ms = tone.duration().as_millis() as u64,
            "feedback"
        );
        let mut stderr = io::stderr().lock();
        let _ = stderr.write_all(bell).and_then(|_| stderr.flush());
    }
}
