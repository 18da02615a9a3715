//! Pairing, heartbeat liveness and robot operational state.
//!
//! The machine is plain synchronous code. Every operation takes the current
//! link clock reading so the caller decides where time comes from; the
//! runtime feeds it from one worker task, which makes that task the only
//! writer of [`LinkState`].

use crate::bridge::{ActuatorBridge, JointCommand, SpecialResult};
use crate::codec::{
    DataMessage, DataPayload, HeartbeatMessage, Message, MessageCodec, PairingMessage, encode,
};
use crate::config::LinkConfig;
use crate::core::{DATA_PAYLOAD_LEN, MacAddress, Role};
use crate::radio::RadioTransport;
use crate::storage::{KeyValueStore, PeerIdentityStore};

use super::envelope::InboundEnvelope;
use super::rtt::RttEstimator;
use super::state::{LinkState, LinkStatus, RobotState};

/// Observable outcome of a link operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A peer was registered.
    Paired(MacAddress),
    /// The peer was dropped.
    Unpaired,
    /// Robot actuators reported ready.
    Started,
    /// Controller received a sample block.
    Telemetry([u16; DATA_PAYLOAD_LEN]),
    /// Controller received a heartbeat echo.
    HeartbeatAck {
        /// Round trip in milliseconds.
        rtt_ms: u32,
    },
}

/// Datagram counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Datagrams handed to the machine.
    pub received: u64,
    /// Datagrams dropped as transport noise.
    pub dropped: u64,
    /// Datagrams accepted by the radio.
    pub sent: u64,
    /// Datagrams the radio refused.
    pub send_failed: u64,
}

/// Link state machine for one node.
pub struct LinkStateMachine<R, S, B> {
    state: LinkState,
    radio: R,
    identity: PeerIdentityStore<S>,
    bridge: B,
    codec: MessageCodec,
    rtt: RttEstimator,
    timeout_ms: u32,
    permanent_pairing: bool,
    stats: LinkStats,
}

impl<R, S, B> LinkStateMachine<R, S, B>
where
    R: RadioTransport,
    S: KeyValueStore,
    B: ActuatorBridge,
{
    /// Create an unpaired machine. Call [`Self::boot`] before anything else.
    pub fn new(role: Role, radio: R, store: S, bridge: B, config: &LinkConfig) -> Self {
        let state = LinkState::new(role, radio.local_address(), config.channel);
        Self {
            state,
            radio,
            identity: PeerIdentityStore::with_key(
                store,
                config.storage_namespace.clone(),
                config.peer_key.clone(),
            ),
            bridge,
            codec: MessageCodec::for_role(role),
            rtt: RttEstimator::new(),
            timeout_ms: u32::try_from(config.timeout_ms(role)).unwrap_or(u32::MAX / 2),
            permanent_pairing: role == Role::Controller && config.permanent_pairing,
            stats: LinkStats::default(),
        }
    }

    /// Restore a persisted peer.
    ///
    /// With a saved peer the node enters `Paired` optimistically and waits
    /// for traffic to confirm liveness instead of broadcasting.
    pub fn boot(&mut self, now: u32) -> Option<LinkEvent> {
        let Some(peer) = self.identity.load() else {
            tracing::debug!("[PAIRING] No saved MAC found - entering pairing mode");
            return None;
        };
        tracing::info!("[PAIRING] Found saved MAC: {}", peer);
        self.register_peer(peer, now);
        self.state.last_heartbeat_sent_at = now;
        tracing::debug!("[PAIRING] Attempting to reconnect to saved peer");
        Some(LinkEvent::Paired(peer))
    }

    /// Process one inbound datagram in arrival order.
    pub fn handle(&mut self, envelope: &InboundEnvelope) -> Option<LinkEvent> {
        self.stats.received += 1;
        let sender = envelope.sender();
        let now = envelope.received_at();

        let message = match self.codec.decode(envelope.data()) {
            Ok(message) => message,
            Err(e) => {
                self.stats.dropped += 1;
                tracing::debug!("[LINK] Dropping datagram from {}: {}", sender, e);
                return None;
            }
        };

        match message {
            Message::Pairing(msg) => self.on_pairing(sender, &msg, now),
            Message::Heartbeat(msg) => self.on_heartbeat(sender, &msg, now),
            Message::Data(msg) => self.on_data(sender, &msg, now),
            Message::Unknown(tag) => {
                self.stats.dropped += 1;
                tracing::debug!("[LINK] Ignoring unknown tag {} from {}", tag, sender);
                None
            }
        }
    }

    /// Handle a Pairing message: a request on the robot, an acknowledgement
    /// on the controller.
    ///
    /// First writer wins: while paired, pairing messages are ignored.
    pub fn on_pairing(
        &mut self,
        sender: MacAddress,
        msg: &PairingMessage,
        now: u32,
    ) -> Option<LinkEvent> {
        if self.state.paired {
            tracing::debug!("[PAIRING] Already paired, ignoring pairing from {}", sender);
            return None;
        }
        if msg.id != self.state.role.peer_id() {
            self.stats.dropped += 1;
            tracing::debug!("[PAIRING] Ignoring pairing with id {} from {}", msg.id, sender);
            return None;
        }

        match self.state.role {
            Role::Robot => {
                tracing::info!("[PAIRING] Pairing request from: {}", sender);
                self.register_peer(sender, now);
                self.persist_peer(sender);
                let ack = Message::Pairing(PairingMessage {
                    id: self.state.role.node_id(),
                    address: self.state.local_address,
                    channel: self.state.channel,
                });
                self.send(sender, &ack);
            }
            Role::Controller => {
                tracing::info!("[PAIRING] Paired with server: {}", sender);
                self.register_peer(sender, now);
                self.persist_peer(sender);
                tracing::debug!("[HEARTBEAT] Connection established, heartbeat timer started");
            }
        }
        Some(LinkEvent::Paired(sender))
    }

    /// Handle a Heartbeat from the peer.
    ///
    /// The robot echoes it unchanged; the controller measures the round trip.
    pub fn on_heartbeat(
        &mut self,
        sender: MacAddress,
        msg: &HeartbeatMessage,
        now: u32,
    ) -> Option<LinkEvent> {
        if !self.accept_from(sender, "heartbeat") {
            return None;
        }
        self.state.last_heartbeat_received_at = now;

        match self.state.role {
            Role::Robot => {
                tracing::debug!("[HEARTBEAT] Echoing heartbeat {}", msg.timestamp);
                self.send(sender, &Message::Heartbeat(*msg));
                None
            }
            Role::Controller => {
                let rtt_ms = now.wrapping_sub(msg.timestamp);
                self.rtt.update(rtt_ms);
                tracing::debug!("[HEARTBEAT] ACK received, RTT: {}ms", rtt_ms);
                Some(LinkEvent::HeartbeatAck { rtt_ms })
            }
        }
    }

    /// Handle a Data message from the peer. Any Data counts as liveness.
    pub fn on_data(&mut self, sender: MacAddress, msg: &DataMessage, now: u32) -> Option<LinkEvent> {
        if !self.accept_from(sender, "data") {
            return None;
        }
        self.state.last_heartbeat_received_at = now;

        match (self.state.role, &msg.payload) {
            (Role::Robot, DataPayload::Command(text)) => {
                let command = JointCommand::parse(text.as_str());
                let result = self.bridge.apply_joint_command(&command);
                self.route_special(sender, result);
                self.poll_started()
            }
            (Role::Controller, DataPayload::Samples(samples)) => {
                Some(LinkEvent::Telemetry(*samples))
            }
            _ => None,
        }
    }

    /// Controller: send a heartbeat stamped with `now` if paired.
    pub fn send_periodic_heartbeat(&mut self, now: u32) {
        if self.state.role != Role::Controller || !self.state.paired {
            return;
        }
        let Some(peer) = self.state.peer else {
            return;
        };
        tracing::debug!(
            "[HEARTBEAT] Sending heartbeat (last response: {}ms ago)",
            self.state.silence_ms(now)
        );
        self.state.last_heartbeat_sent_at = now;
        let heartbeat = Message::Heartbeat(HeartbeatMessage {
            id: self.state.role.node_id(),
            timestamp: now,
        });
        self.send(peer, &heartbeat);
    }

    /// Unpair if the peer has been silent for longer than the timeout.
    pub fn check_timeout(&mut self, now: u32) -> Option<LinkEvent> {
        if !self.state.paired || self.permanent_pairing {
            return None;
        }
        let silence = self.state.silence_ms(now);
        if silence <= self.timeout_ms {
            return None;
        }
        tracing::info!(
            "[HEARTBEAT] Timeout detected ({}ms since last response)",
            silence
        );
        self.unpair(now)
    }

    /// Drop the peer.
    ///
    /// On the robot, torque goes off before anything else changes. Calling
    /// this while already unpaired does nothing.
    pub fn unpair(&mut self, now: u32) -> Option<LinkEvent> {
        if !self.state.paired && self.state.peer.is_none() {
            return None;
        }
        tracing::info!("[HEARTBEAT] Connection lost - returning to pairing mode");

        if self.state.role == Role::Robot {
            self.bridge.torque_off();
        }
        if let Some(peer) = self.state.peer.take() {
            if let Err(e) = self.radio.remove_peer(peer) {
                tracing::warn!("[PAIRING] Failed to remove peer {}: {}", peer, e);
            }
        }
        match self.identity.clear() {
            Ok(()) => tracing::debug!("[STORAGE] Cleared peer MAC"),
            Err(e) => tracing::warn!("[STORAGE] Failed to clear peer MAC: {}", e),
        }
        if self.state.role == Role::Robot {
            self.bridge.release_recording();
        }

        self.rtt.reset();
        self.state.paired = false;
        self.state.robot_state = RobotState::Unpaired;
        self.state.pair_attempt_at = now;
        Some(LinkEvent::Unpaired)
    }

    /// Robot: de-energize the actuators and fall back from `Started`,
    /// keeping the pairing. Called when the owner of the machine stops.
    pub fn halt(&mut self) {
        if self.state.role != Role::Robot {
            return;
        }
        self.bridge.torque_off();
        if self.state.robot_state == RobotState::Started {
            self.state.robot_state = RobotState::Paired;
        }
    }

    /// Controller: broadcast a pairing request if unpaired.
    pub fn broadcast_pairing_request(&mut self, now: u32) {
        if self.state.role != Role::Controller || self.state.paired {
            return;
        }
        tracing::debug!("[PAIRING] Sending broadcast...");
        self.state.pair_attempt_at = now;
        let request = Message::Pairing(PairingMessage {
            id: self.state.role.node_id(),
            address: self.state.local_address,
            channel: self.state.channel,
        });
        self.send(MacAddress::BROADCAST, &request);
    }

    /// Robot: move from `Paired` to `Started` once the bridge is ready.
    pub fn poll_started(&mut self) -> Option<LinkEvent> {
        if self.state.role == Role::Robot
            && self.state.robot_state == RobotState::Paired
            && self.bridge.is_ready()
        {
            tracing::info!("[STATE] Robot start!");
            self.state.robot_state = RobotState::Started;
            return Some(LinkEvent::Started);
        }
        None
    }

    /// Link state.
    pub fn state(&self) -> &LinkState {
        &self.state
    }

    /// Snapshot for the other tasks.
    pub fn status(&self) -> LinkStatus {
        LinkStatus {
            role: self.state.role,
            paired: self.state.paired,
            peer: self.state.peer,
            state: self.state.robot_state,
            srtt: self.rtt.srtt(),
            last_rtt_ms: self.rtt.latest_ms(),
        }
    }

    /// Which end of the link this node is.
    pub fn role(&self) -> Role {
        self.state.role
    }

    /// Whether a peer is registered.
    pub fn is_paired(&self) -> bool {
        self.state.paired
    }

    /// Registered peer.
    pub fn peer(&self) -> Option<MacAddress> {
        self.state.peer
    }

    /// Round-trip estimator.
    pub fn rtt(&self) -> &RttEstimator {
        &self.rtt
    }

    /// Datagram counters.
    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Radio transport.
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Actuator bridge.
    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    /// Peer identity store.
    pub fn identity(&self) -> &PeerIdentityStore<S> {
        &self.identity
    }

    /// Liveness timeout in milliseconds.
    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    fn register_peer(&mut self, peer: MacAddress, now: u32) {
        if let Err(e) = self.radio.add_peer(peer) {
            tracing::warn!("[PAIRING] Failed to add peer {}: {}", peer, e);
        }
        self.state.peer = Some(peer);
        self.state.paired = true;
        self.state.last_heartbeat_received_at = now;
        self.state.robot_state = RobotState::Paired;
    }

    fn persist_peer(&mut self, peer: MacAddress) {
        match self.identity.save(peer) {
            Ok(()) => tracing::debug!("[STORAGE] Saved peer MAC"),
            Err(e) => tracing::warn!("[STORAGE] Failed to save peer MAC: {}", e),
        }
    }

    /// Heartbeat and Data are only taken from the current peer.
    fn accept_from(&mut self, sender: MacAddress, kind: &str) -> bool {
        if self.state.is_peer(sender) {
            return true;
        }
        self.stats.dropped += 1;
        tracing::debug!("[LINK] Dropping {} from non-peer {}", kind, sender);
        false
    }

    fn route_special(&mut self, peer: MacAddress, result: SpecialResult) {
        let id = self.state.role.node_id();
        match result {
            SpecialResult::None => {}
            SpecialResult::ReportBattery => {
                let percent = self.bridge.battery_percent();
                tracing::debug!("[DATA] Send battery level {}%", percent);
                self.send(peer, &Message::Data(DataMessage::samples(id, &[percent])));
            }
            SpecialResult::RecordSample => self.bridge.record_sample(),
            SpecialResult::FlushRecordedSamples => {
                let recorded = self.bridge.take_recorded();
                let mut chunks = 0;
                for chunk in recorded.chunks(DATA_PAYLOAD_LEN) {
                    self.send(peer, &Message::Data(DataMessage::samples(id, chunk)));
                    chunks += 1;
                }
                tracing::debug!(
                    "[DATA] Sent {} recorded samples in {} chunks",
                    recorded.len(),
                    chunks
                );
            }
        }
    }

    fn send(&mut self, dest: MacAddress, message: &Message) {
        let frame = encode(message);
        match self.radio.send(dest, &frame) {
            Ok(()) => self.stats.sent += 1,
            Err(e) => {
                self.stats.send_failed += 1;
                if e.is_silent_drop() {
                    tracing::debug!("[LINK] {} to {} lost: {}", message.kind(), dest, e);
                } else {
                    tracing::warn!("[LINK] {} to {} failed: {}", message.kind(), dest, e);
                }
            }
        }
    }
}
