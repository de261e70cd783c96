//! Session state (component E) and the step-control state machine
//! (component F): the breakpoint table, variable store, frame counter, and
//! the mutex+condvar rendezvous between the transforming thread and the
//! adapter thread.

mod breakpoints;
mod session;
mod step;
mod variables;

pub use breakpoints::BreakpointTable;
pub use session::{SessionState, SessionStatus};
pub use step::{StepController, StepMode};
pub use variables::VariableStore;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use xdbg_protocol::{ProbeEvent, ProbeSink};
    use xdbg_types::{Event, StopReason};

    fn session_with_recorder() -> (Arc<SessionState>, Arc<Mutex<Vec<Event>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        let session = SessionState::new(false, move |e| events_clone.lock().unwrap().push(e));
        (session, events)
    }

    #[test]
    fn breakpoint_hit_pauses_and_emits_stopped() {
        let (session, events) = session_with_recorder();
        session.begin_run("/a.xsl");
        session.set_breakpoints("/a.xsl", vec![5]);

        let session_clone = session.clone();
        let handle = std::thread::spawn(move || {
            session_clone.on_break(ProbeEvent {
                line: 5,
                context_value: String::new(),
                template_label: None,
            });
        });

        // Give the probe thread a chance to reach the rendezvous, then resume it.
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(matches!(session.status(), SessionStatus::Paused { .. }));
        session.continue_();
        handle.join().unwrap();

        let events = events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Stopped { reason: StopReason::Breakpoint, line: 5, .. }
        )));
    }

    #[test]
    fn non_breakpoint_line_does_not_pause() {
        let (session, _events) = session_with_recorder();
        session.begin_run("/a.xsl");
        session.set_breakpoints("/a.xsl", vec![5]);
        session.on_break(ProbeEvent {
            line: 99,
            context_value: String::new(),
            template_label: None,
        });
        assert!(matches!(session.status(), SessionStatus::Running));
    }

    #[test]
    fn terminate_unblocks_a_paused_probe() {
        let (session, _events) = session_with_recorder();
        session.begin_run("/a.xsl");
        session.set_breakpoints("/a.xsl", vec![5]);

        let session_clone = session.clone();
        let handle = std::thread::spawn(move || {
            session_clone.on_break(ProbeEvent {
                line: 5,
                context_value: String::new(),
                template_label: None,
            });
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        session.terminate();
        handle.join().unwrap();
        assert!(session.is_terminate_requested());
    }
}
