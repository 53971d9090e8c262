//! Request/response command endpoints.
//!
//! Each endpoint posts a [`EventPayload::ControlCommand`] and reports success
//! as soon as the event is on the bus. Success means "handed to the bus",
//! not "the engine finished": the engine acts asynchronously and reports
//! back, if at all, through later result events.

use mapbridge_types::{ControlCommand, Event, EventPayload};
use tracing::info;

use crate::bus::EventBus;

pub const COMMAND_SOURCE: &str = "mapbridge-middleware::command";

#[derive(Clone, Debug)]
pub struct CommandDispatcher {
    bus: EventBus,
}

impl CommandDispatcher {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    /// Post `command` for the engine. Always returns `true`.
    pub fn dispatch(&self, command: ControlCommand) -> bool {
        let receivers = self
            .bus
            .post(Event::new(COMMAND_SOURCE, EventPayload::ControlCommand(command)));
        info!(%command, receivers, "command dispatched");
        true
    }

    pub fn reset_memory(&self) -> bool {
        self.dispatch(ControlCommand::ResetMemory)
    }

    pub fn delete_memory(&self) -> bool {
        self.dispatch(ControlCommand::DeleteMemory)
    }

    pub fn dump_memory(&self) -> bool {
        self.dispatch(ControlCommand::DumpMemory)
    }

    pub fn dump_prediction(&self) -> bool {
        self.dispatch(ControlCommand::DumpPrediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use mapbridge_types::EventKind;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn reset_posts_exactly_one_command() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(EventKind::ControlCommand);
        let dispatcher = CommandDispatcher::new(bus.clone());

        assert!(dispatcher.reset_memory());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.source, COMMAND_SOURCE);
        assert!(matches!(
            event.payload,
            EventPayload::ControlCommand(ControlCommand::ResetMemory)
        ));
        assert!(rx.try_recv().is_err(), "exactly one command must be posted");
    }

    #[tokio::test]
    async fn each_endpoint_posts_its_own_tag() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(EventKind::ControlCommand);
        let dispatcher = CommandDispatcher::new(bus.clone());

        assert!(dispatcher.reset_memory());
        assert!(dispatcher.delete_memory());
        assert!(dispatcher.dump_memory());
        assert!(dispatcher.dump_prediction());

        let mut seen = Vec::new();
        for _ in 0..4 {
            if let EventPayload::ControlCommand(cmd) = rx.recv().await.unwrap().payload {
                seen.push(cmd);
            }
        }
        assert_eq!(seen, ControlCommand::ALL.to_vec());
    }

    #[test]
    fn dispatch_succeeds_without_an_engine() {
        let dispatcher = CommandDispatcher::new(EventBus::default());
        assert!(dispatcher.delete_memory());
    }

    #[tokio::test]
    async fn dispatch_does_not_wait_for_a_slow_engine() {
        let bus = EventBus::default();
        let _engine = bus.subscribe(
            EventKind::ControlCommand,
            handler_fn("slow-engine", |_event| {
                std::thread::sleep(Duration::from_millis(200));
                Ok(())
            }),
        );
        let dispatcher = CommandDispatcher::new(bus);

        let started = Instant::now();
        assert!(dispatcher.reset_memory());
        assert!(dispatcher.reset_memory());
        assert!(started.elapsed() < Duration::from_millis(100));
    }
}
