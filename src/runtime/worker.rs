//! The link worker: sole owner and writer of the link state.

use tokio::sync::{broadcast, mpsc, watch};

use crate::bridge::ActuatorBridge;
use crate::link::{InboundEnvelope, LinkClock, LinkEvent, LinkStateMachine, LinkStatus};
use crate::radio::RadioTransport;
use crate::storage::KeyValueStore;

use super::event::{EVENT_PAIRED, EVENT_STARTED, EVENT_UNPAIRED, EventGroup};
use super::inbound::InboundQueue;
use super::stopped;

/// Request from a periodic or console task to the link worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkCommand {
    /// Send a heartbeat if paired (controller).
    SendHeartbeat,
    /// Unpair if the peer has been silent too long.
    CheckTimeout,
    /// Broadcast a pairing request if unpaired (controller).
    BroadcastPairing,
    /// Drop the peer now.
    Unpair,
}

enum Wake {
    Inbound(InboundEnvelope),
    Command(LinkCommand),
    Stop,
}

/// Runs the state machine against the inbound queue and the command
/// channel. Inbound datagrams are handled before pending commands so a
/// backlog of peer traffic is seen before the next liveness check.
///
/// Dropping the worker, including while a panic unwinds out of
/// [`LinkWorker::run`], turns robot torque off: with no worker nothing
/// would ever check the link again.
pub(crate) struct LinkWorker<R, S, B>
where
    R: RadioTransport,
    S: KeyValueStore,
    B: ActuatorBridge,
{
    machine: LinkStateMachine<R, S, B>,
    inbound: InboundQueue,
    commands: mpsc::Receiver<LinkCommand>,
    clock: LinkClock,
    events: EventGroup,
    status: watch::Sender<LinkStatus>,
    observers: broadcast::Sender<LinkEvent>,
}

impl<R, S, B> LinkWorker<R, S, B>
where
    R: RadioTransport,
    S: KeyValueStore,
    B: ActuatorBridge,
{
    pub(crate) fn new(
        machine: LinkStateMachine<R, S, B>,
        inbound: InboundQueue,
        commands: mpsc::Receiver<LinkCommand>,
        clock: LinkClock,
        events: EventGroup,
        status: watch::Sender<LinkStatus>,
        observers: broadcast::Sender<LinkEvent>,
    ) -> Self {
        Self {
            machine,
            inbound,
            commands,
            clock,
            events,
            status,
            observers,
        }
    }

    /// Restore the persisted peer and publish the initial status.
    pub(crate) fn boot(&mut self) {
        let event = self.machine.boot(self.clock.now_ms());
        self.publish(event);
    }

    pub(crate) async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let wake = tokio::select! {
                biased;
                _ = stopped(&mut shutdown) => Wake::Stop,
                envelope = self.inbound.recv() => Wake::Inbound(envelope),
                command = self.commands.recv() => match command {
                    Some(command) => Wake::Command(command),
                    None => Wake::Stop,
                },
            };
            let event = match wake {
                Wake::Inbound(envelope) => self.machine.handle(&envelope),
                Wake::Command(command) => self.apply(command),
                Wake::Stop => break,
            };
            self.publish(event);
        }
        tracing::debug!("[RTOS] Link worker stopped");
    }

    fn apply(&mut self, command: LinkCommand) -> Option<LinkEvent> {
        let now = self.clock.now_ms();
        match command {
            LinkCommand::SendHeartbeat => {
                self.machine.send_periodic_heartbeat(now);
                None
            }
            LinkCommand::CheckTimeout => self.machine.check_timeout(now),
            LinkCommand::BroadcastPairing => {
                self.machine.broadcast_pairing_request(now);
                None
            }
            LinkCommand::Unpair => self.machine.unpair(now),
        }
    }

    // Status goes out before the event bits so a task woken by a bit
    // already sees the new status.
    fn publish(&mut self, event: Option<LinkEvent>) {
        let status = self.machine.status();
        self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });

        let Some(event) = event else {
            return;
        };
        match &event {
            LinkEvent::Paired(_) => {
                self.events.clear(EVENT_UNPAIRED);
                self.events.set(EVENT_PAIRED);
            }
            LinkEvent::Unpaired => {
                self.events.clear(EVENT_PAIRED | EVENT_STARTED);
                self.events.set(EVENT_UNPAIRED);
            }
            LinkEvent::Started => {
                self.events.set(EVENT_STARTED);
            }
            LinkEvent::Telemetry(samples) => {
                tracing::info!("[DATA] {}", format_samples(samples));
            }
            LinkEvent::HeartbeatAck { .. } => {}
        }
        // No subscribers is fine.
        let _ = self.observers.send(event);
    }
}

impl<R, S, B> Drop for LinkWorker<R, S, B>
where
    R: RadioTransport,
    S: KeyValueStore,
    B: ActuatorBridge,
{
    fn drop(&mut self) {
        self.machine.halt();
    }
}

/// Comma-separated samples with the zero fill trimmed.
pub fn format_samples(samples: &[u16]) -> String {
    let used = samples.iter().rposition(|&s| s != 0).map_or(0, |i| i + 1);
    samples[..used]
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{Detached, Q8Bridge, SimFuelGauge, SimServoBus};
    use crate::codec::{DataMessage, HeartbeatMessage, Message, PairingMessage, encode};
    use crate::config::LinkConfig;
    use crate::core::{MacAddress, Role};
    use crate::link::RobotState;
    use crate::radio::{Ether, EtherPort};
    use crate::storage::MemoryStore;
    use std::sync::Arc;
    use std::time::Duration;

    const CONTROLLER: MacAddress = MacAddress::new([0xc0, 0, 0, 0, 0, 1]);
    const ROBOT: MacAddress = MacAddress::new([0xb0, 0, 0, 0, 0, 2]);

    struct Harness {
        inbound: InboundQueue,
        commands: mpsc::Sender<LinkCommand>,
        status: watch::Receiver<LinkStatus>,
        events: EventGroup,
        observer: broadcast::Receiver<LinkEvent>,
        shutdown: watch::Sender<bool>,
        task: tokio::task::JoinHandle<()>,
    }

    fn start(role: Role, radio: Arc<EtherPort>) -> Harness {
        let config = LinkConfig::default();
        let clock = LinkClock::new();
        let inbound = InboundQueue::new(config.inbound_queue_depth).unwrap();
        let (commands, commands_rx) = mpsc::channel(8);
        let (status_tx, status) = watch::channel(LinkStatus::unpaired(role));
        let (observers, observer) = broadcast::channel(16);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let events = EventGroup::new();

        let machine = LinkStateMachine::new(role, radio, MemoryStore::new(), Detached, &config);
        let mut worker = LinkWorker::new(
            machine,
            inbound.clone(),
            commands_rx,
            clock,
            events.clone(),
            status_tx,
            observers,
        );
        worker.boot();
        let task = tokio::spawn(worker.run(shutdown_rx));
        Harness {
            inbound,
            commands,
            status,
            events,
            observer,
            shutdown,
            task,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pairing_ack_publishes_status_and_bits() {
        let ether = Ether::new();
        let port = Arc::new(ether.attach(CONTROLLER, 1));
        let mut h = start(Role::Controller, port);

        let ack = encode(&Message::Pairing(PairingMessage {
            id: 0,
            address: ROBOT,
            channel: 1,
        }));
        assert!(h.inbound.push_raw(ROBOT, &ack, 0));

        let status = h.status.wait_for(|s| s.paired).await.unwrap().clone();
        assert_eq!(status.peer, Some(ROBOT));
        assert_eq!(h.events.get() & EVENT_PAIRED, EVENT_PAIRED);
        assert_eq!(h.observer.recv().await.unwrap(), LinkEvent::Paired(ROBOT));

        h.shutdown.send_replace(true);
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_drive_timeout() {
        let ether = Ether::new();
        let port = Arc::new(ether.attach(CONTROLLER, 1));
        let mut h = start(Role::Controller, port);

        let ack = encode(&Message::Pairing(PairingMessage {
            id: 0,
            address: ROBOT,
            channel: 1,
        }));
        h.inbound.push_raw(ROBOT, &ack, 0);
        h.status.wait_for(|s| s.paired).await.unwrap();

        tokio::time::advance(Duration::from_millis(16_000)).await;
        h.commands.send(LinkCommand::CheckTimeout).await.unwrap();
        let status = h.status.wait_for(|s| !s.paired).await.unwrap().clone();
        assert_eq!(status.state, RobotState::Unpaired);
        assert_eq!(h.events.get() & (EVENT_PAIRED | EVENT_UNPAIRED), EVENT_UNPAIRED);

        h.shutdown.send_replace(true);
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_echo_yields_rtt() {
        let ether = Ether::new();
        let port = Arc::new(ether.attach(CONTROLLER, 1));
        let mut h = start(Role::Controller, port);

        let ack = encode(&Message::Pairing(PairingMessage {
            id: 0,
            address: ROBOT,
            channel: 1,
        }));
        h.inbound.push_raw(ROBOT, &ack, 0);
        let echo = encode(&Message::Heartbeat(HeartbeatMessage {
            id: 1,
            timestamp: 100,
        }));
        h.inbound.push_raw(ROBOT, &echo, 112);

        let status = h.status.wait_for(|s| s.last_rtt_ms.is_some()).await.unwrap().clone();
        assert_eq!(status.last_rtt_ms, Some(12));
        assert_eq!(h.observer.recv().await.unwrap(), LinkEvent::Paired(ROBOT));
        assert_eq!(
            h.observer.recv().await.unwrap(),
            LinkEvent::HeartbeatAck { rtt_ms: 12 }
        );

        drop(h.commands);
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopping_worker_drops_torque() {
        let ether = Ether::new();
        let port = Arc::new(ether.attach(ROBOT, 1));
        let bus = SimServoBus::new();
        let config = LinkConfig::default();
        let inbound = InboundQueue::new(config.inbound_queue_depth).unwrap();
        let (_commands, commands_rx) = mpsc::channel(8);
        let (status_tx, mut status) = watch::channel(LinkStatus::unpaired(Role::Robot));
        let (observers, _) = broadcast::channel(16);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let machine = LinkStateMachine::new(
            Role::Robot,
            port,
            MemoryStore::new(),
            Q8Bridge::new(bus.clone(), SimFuelGauge::new(50)),
            &config,
        );
        let mut worker = LinkWorker::new(
            machine,
            inbound.clone(),
            commands_rx,
            LinkClock::new(),
            EventGroup::new(),
            status_tx,
            observers,
        );
        worker.boot();
        let task = tokio::spawn(worker.run(shutdown_rx));

        let request = encode(&Message::Pairing(PairingMessage {
            id: 1,
            address: CONTROLLER,
            channel: 1,
        }));
        inbound.push_raw(CONTROLLER, &request, 0);
        let torque_on = encode(&Message::Data(DataMessage::command(1, "0,0,0,0,0,0,0,0,0,1000,1")));
        inbound.push_raw(CONTROLLER, &torque_on, 5);
        status.wait_for(|s| s.state == RobotState::Started).await.unwrap();
        assert!(bus.snapshot().torque);

        shutdown.send_replace(true);
        task.await.unwrap();
        assert!(!bus.snapshot().torque);
    }

    #[test]
    fn test_format_samples_trims_fill() {
        let mut samples = [0u16; 100];
        samples[0] = 87;
        samples[2] = 4;
        assert_eq!(format_samples(&samples), "87,0,4");
        assert_eq!(format_samples(&[0u16; 100]), "");
    }
}
