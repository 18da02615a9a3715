//! End-to-end link scenarios: two full nodes over an in-process radio
//! medium, driven by Tokio's paused clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use q8link::bridge::{
    ActuatorBridge, Detached, JointCommand, Q8Bridge, SimFuelGauge, SimServoBus, SpecialResult,
};
use q8link::config::LinkConfig;
use q8link::core::{LinkError, MacAddress, Role, SERVO_POSITION_LIMIT, TAG_PAIRING};
use q8link::link::RobotState;
use q8link::radio::{Ether, EtherPort, RadioTransport};
use q8link::runtime::{NodeHandle, NodeOptions, spawn_node};
use q8link::storage::{FileStore, PeerIdentityStore};
use tempfile::TempDir;
use tokio::time::Instant;

const CONTROLLER: MacAddress = MacAddress::new([0x24, 0x6f, 0x28, 0xaa, 0x00, 0x01]);
const ROBOT: MacAddress = MacAddress::new([0x24, 0x6f, 0x28, 0xbb, 0x00, 0x02]);
const SNIFFER: MacAddress = MacAddress::new([0x24, 0x6f, 0x28, 0xcc, 0x00, 0x03]);

const TORQUE_ON: &[u8] = b"0,0,0,0,0,0,0,0,0,1000,1;";

struct Robot {
    node: NodeHandle,
    bus: SimServoBus,
}

fn spawn_robot(ether: &Ether, store_dir: &TempDir) -> Robot {
    let bus = SimServoBus::new();
    let bridge = Q8Bridge::new(bus.clone(), SimFuelGauge::new(76));
    let node = spawn_node(
        Role::Robot,
        &LinkConfig::default(),
        Arc::new(ether.attach(ROBOT, 1)),
        FileStore::open(store_dir.path()).unwrap(),
        bridge,
        NodeOptions::new(),
    )
    .unwrap();
    Robot { node, bus }
}

fn spawn_controller(ether: &Ether, store_dir: &TempDir) -> NodeHandle {
    spawn_node(
        Role::Controller,
        &LinkConfig::default(),
        Arc::new(ether.attach(CONTROLLER, 1)),
        FileStore::open(store_dir.path()).unwrap(),
        Detached,
        NodeOptions::new(),
    )
    .unwrap()
}

fn saved_peer(dir: &TempDir) -> Option<MacAddress> {
    PeerIdentityStore::new(FileStore::open(dir.path()).unwrap()).load()
}

/// Counts pairing broadcasts seen by a third station.
fn sniff_pairing(ether: &Ether) -> (EtherPort, Arc<AtomicUsize>) {
    let port = ether.attach(SNIFFER, 1);
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    port.register_receive(Arc::new(move |_from: MacAddress, data: &[u8]| {
        if data.first() == Some(&TAG_PAIRING) {
            seen.fetch_add(1, Ordering::Relaxed);
        }
    }))
    .unwrap();
    (port, count)
}

#[tokio::test(start_paused = true)]
async fn test_pairing_then_heartbeats_keep_link_up() {
    let ether = Ether::new();
    let (robot_dir, controller_dir) = (TempDir::new().unwrap(), TempDir::new().unwrap());
    let robot = spawn_robot(&ether, &robot_dir);
    let controller = spawn_controller(&ether, &controller_dir);

    let status = controller.wait_for(|s| s.paired).await.unwrap();
    assert_eq!(status.peer, Some(ROBOT));
    let robot_status = robot.node.status();
    assert!(robot_status.paired);
    assert_eq!(robot_status.peer, Some(CONTROLLER));
    assert_eq!(robot_status.state, RobotState::Paired);

    assert_eq!(saved_peer(&robot_dir), Some(CONTROLLER));
    assert_eq!(saved_peer(&controller_dir), Some(ROBOT));

    // Well past both timeouts; heartbeats every 5 s keep the session.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(controller.status().paired);
    assert!(robot.node.status().paired);
    assert!(controller.status().last_rtt_ms.is_some());

    controller.shutdown().await;
    robot.node.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_console_command_starts_robot() {
    let ether = Ether::new();
    let (robot_dir, controller_dir) = (TempDir::new().unwrap(), TempDir::new().unwrap());
    let robot = spawn_robot(&ether, &robot_dir);
    let controller = spawn_controller(&ether, &controller_dir);
    controller.wait_for(|s| s.paired).await.unwrap();

    controller.input(TORQUE_ON).await.unwrap();
    let status = robot.node.wait_for(|s| s.state == RobotState::Started).await.unwrap();
    assert!(status.paired);
    assert!(robot.bus.snapshot().torque);

    controller.input(&b"90,0,0,0,0,0,0,-90;"[..]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let bus = robot.bus.snapshot();
    assert_eq!(bus.goals[0], 5120);
    assert_eq!(bus.goals[7], 3073);
}

#[tokio::test(start_paused = true)]
async fn test_silence_unpairs_both_ends() {
    let ether = Ether::new();
    let (robot_dir, controller_dir) = (TempDir::new().unwrap(), TempDir::new().unwrap());
    let robot = spawn_robot(&ether, &robot_dir);
    let controller = spawn_controller(&ether, &controller_dir);
    controller.wait_for(|s| s.paired).await.unwrap();
    controller.input(TORQUE_ON).await.unwrap();
    robot.node.wait_for(|s| s.state == RobotState::Started).await.unwrap();

    let silent_since = Instant::now();
    ether.set_link_up(false);

    controller.wait_for(|s| !s.paired).await.unwrap();
    let elapsed = silent_since.elapsed();
    assert!(elapsed > Duration::from_secs(15), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(17), "{elapsed:?}");
    assert!(robot.node.status().paired);
    assert_eq!(saved_peer(&controller_dir), None);

    let status = robot.node.wait_for(|s| !s.paired).await.unwrap();
    let elapsed = silent_since.elapsed();
    assert!(elapsed > Duration::from_secs(20), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(22), "{elapsed:?}");
    assert_eq!(status.state, RobotState::Unpaired);
    assert!(!robot.bus.snapshot().torque);
    assert_eq!(saved_peer(&robot_dir), None);

    // The controller kept broadcasting; the next request re-pairs.
    ether.set_link_up(true);
    let status = controller.wait_for(|s| s.paired).await.unwrap();
    assert_eq!(status.peer, Some(ROBOT));
    assert!(silent_since.elapsed() < Duration::from_secs(24));
}

#[tokio::test(start_paused = true)]
async fn test_saved_peer_resumes_without_broadcast() {
    let ether = Ether::new();
    let (robot_dir, controller_dir) = (TempDir::new().unwrap(), TempDir::new().unwrap());
    PeerIdentityStore::new(FileStore::open(robot_dir.path()).unwrap())
        .save(CONTROLLER)
        .unwrap();
    PeerIdentityStore::new(FileStore::open(controller_dir.path()).unwrap())
        .save(ROBOT)
        .unwrap();
    let (_sniffer, broadcasts) = sniff_pairing(&ether);

    let robot = spawn_robot(&ether, &robot_dir);
    let status = robot.node.status();
    assert!(status.paired);
    assert_eq!(status.peer, Some(CONTROLLER));
    assert_eq!(status.state, RobotState::Paired);

    let controller = spawn_controller(&ether, &controller_dir);
    assert!(controller.status().paired);

    // The first heartbeat confirms liveness.
    let status = controller.wait_for(|s| s.last_rtt_ms.is_some()).await.unwrap();
    assert_eq!(status.peer, Some(ROBOT));
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(robot.node.status().paired);
    assert!(controller.status().paired);
    assert_eq!(broadcasts.load(Ordering::Relaxed), 0);
}

#[tokio::test(start_paused = true)]
async fn test_second_controller_cannot_hijack() {
    let ether = Ether::new();
    let (robot_dir, controller_dir) = (TempDir::new().unwrap(), TempDir::new().unwrap());
    let robot = spawn_robot(&ether, &robot_dir);
    let controller = spawn_controller(&ether, &controller_dir);
    controller.wait_for(|s| s.paired).await.unwrap();

    let intruder_mac = MacAddress::new([0x24, 0x6f, 0x28, 0xdd, 0x00, 0x04]);
    let intruder_dir = TempDir::new().unwrap();
    let intruder = spawn_node(
        Role::Controller,
        &LinkConfig::default(),
        Arc::new(ether.attach(intruder_mac, 1)),
        FileStore::open(intruder_dir.path()).unwrap(),
        Detached,
        NodeOptions::new(),
    )
    .unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(robot.node.status().peer, Some(CONTROLLER));
    assert!(!intruder.status().paired);
}

#[tokio::test]
async fn test_rejects_invalid_config() {
    let ether = Ether::new();
    let config = LinkConfig {
        inbound_queue_depth: 0,
        ..LinkConfig::default()
    };
    let err = spawn_node(
        Role::Robot,
        &config,
        Arc::new(ether.attach(ROBOT, 1)),
        q8link::storage::MemoryStore::new(),
        Detached,
        NodeOptions::new(),
    )
    .unwrap_err();
    assert!(matches!(err, q8link::InitError::Config(_)));
}

#[test]
fn test_boot_outside_runtime_fails() {
    let ether = Ether::new();
    let err = spawn_node(
        Role::Controller,
        &LinkConfig::default(),
        Arc::new(ether.attach(CONTROLLER, 1)),
        q8link::storage::MemoryStore::new(),
        Detached,
        NodeOptions::new(),
    )
    .unwrap_err();
    assert!(matches!(err, q8link::InitError::Task(_)));
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_command_then_silence_drops_torque() {
    let ether = Ether::new();
    let (robot_dir, controller_dir) = (TempDir::new().unwrap(), TempDir::new().unwrap());
    let robot = spawn_robot(&ether, &robot_dir);
    let controller = spawn_controller(&ether, &controller_dir);
    controller.wait_for(|s| s.paired).await.unwrap();
    controller.input(TORQUE_ON).await.unwrap();
    robot.node.wait_for(|s| s.state == RobotState::Started).await.unwrap();

    controller.input(&b"1e30,0,0,0,0,0,0,-1e30;"[..]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let bus = robot.bus.snapshot();
    assert_eq!(bus.goals[0], SERVO_POSITION_LIMIT);
    assert_eq!(bus.goals[7], -SERVO_POSITION_LIMIT);
    assert!(!robot.node.is_stopped());

    ether.set_link_up(false);
    tokio::time::sleep(Duration::from_secs(40)).await;
    let status = robot.node.status();
    assert!(!status.paired);
    assert!(!robot.bus.snapshot().torque);
}

/// Actuator driver that fails hard on any motion command.
struct FaultyBridge {
    torque: Arc<AtomicBool>,
}

impl ActuatorBridge for FaultyBridge {
    fn apply_joint_command(&mut self, command: &JointCommand) -> SpecialResult {
        if command.torque == Some(true) {
            self.torque.store(true, Ordering::SeqCst);
            return SpecialResult::None;
        }
        panic!("servo driver fault");
    }

    fn torque_off(&mut self) {
        self.torque.store(false, Ordering::SeqCst);
    }

    fn is_ready(&self) -> bool {
        self.torque.load(Ordering::SeqCst)
    }

    fn battery_percent(&mut self) -> u16 {
        0
    }

    fn record_sample(&mut self) {}

    fn take_recorded(&mut self) -> Vec<u16> {
        Vec::new()
    }

    fn release_recording(&mut self) {}
}

#[tokio::test(start_paused = true)]
async fn test_dead_link_worker_halts_node_with_torque_off() {
    let ether = Ether::new();
    let (robot_dir, controller_dir) = (TempDir::new().unwrap(), TempDir::new().unwrap());
    let torque = Arc::new(AtomicBool::new(false));
    let robot = spawn_node(
        Role::Robot,
        &LinkConfig::default(),
        Arc::new(ether.attach(ROBOT, 1)),
        FileStore::open(robot_dir.path()).unwrap(),
        FaultyBridge {
            torque: Arc::clone(&torque),
        },
        NodeOptions::new(),
    )
    .unwrap();
    let controller = spawn_controller(&ether, &controller_dir);
    controller.wait_for(|s| s.paired).await.unwrap();
    controller.input(TORQUE_ON).await.unwrap();
    robot.wait_for(|s| s.state == RobotState::Started).await.unwrap();
    assert!(torque.load(Ordering::SeqCst));

    controller.input(&b"10,0,0,0,0,0,0,0;"[..]).await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), robot.stopped())
        .await
        .expect("node did not halt");

    assert!(robot.is_stopped());
    assert!(!torque.load(Ordering::SeqCst));
    assert!(matches!(robot.wait_for(|_| false).await, Err(LinkError::Stopped)));
    robot.shutdown().await;
}
