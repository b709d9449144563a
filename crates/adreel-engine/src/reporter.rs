use adreel_contracts::events::EventWriter;
use adreel_contracts::progress::{ProgressEvent, ProgressUpdate};

/// Forwards progress to the caller's sink and mirrors it into the event log.
/// Steps never go backwards within one reporter.
pub(crate) struct ProgressReporter<'a> {
    events: &'a EventWriter,
    sink: &'a mut dyn FnMut(ProgressEvent),
    last_step: u8,
}

impl<'a> ProgressReporter<'a> {
    pub(crate) fn new(events: &'a EventWriter, sink: &'a mut dyn FnMut(ProgressEvent)) -> Self {
        Self {
            events,
            sink,
            last_step: 0,
        }
    }

    pub(crate) fn report(&mut self, step: u8, message: impl Into<String>) {
        let step = step.max(self.last_step);
        self.last_step = step;
        let update = ProgressUpdate::new(step, message);
        // Telemetry failures never abort a run.
        let _ = self.events.emit_progress(&update);
        (self.sink)(ProgressEvent::Step(update));
    }

    pub(crate) fn idle(self) {
        (self.sink)(ProgressEvent::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_clamped_to_non_decreasing() {
        let events = EventWriter::discard("run-progress");
        let mut seen = Vec::new();
        let mut sink = |event: ProgressEvent| seen.push(event);
        let mut reporter = ProgressReporter::new(&events, &mut sink);
        reporter.report(4, "validating");
        reporter.report(3, "regenerating");
        reporter.idle();

        assert_eq!(
            seen,
            vec![
                ProgressEvent::Step(ProgressUpdate::new(4, "validating")),
                ProgressEvent::Step(ProgressUpdate::new(4, "regenerating")),
                ProgressEvent::Idle,
            ]
        );
    }
}
