//! Node boot and the per-role task sets.

use std::fmt;
use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::bridge::ActuatorBridge;
use crate::config::LinkConfig;
use crate::console::{ConsoleQueue, VerboseFlag};
use crate::core::{CONTROL_QUEUE_DEPTH, InitError, LinkError, Role};
use crate::link::{LinkClock, LinkEvent, LinkStateMachine, LinkStatus};
use crate::radio::RadioTransport;
use crate::storage::KeyValueStore;

use super::event::EventGroup;
use super::indicator::{StatusIndicator, run_indicator};
use super::inbound::InboundQueue;
use super::task::{TaskPriority, TaskSpec, sort_by_priority};
use super::tasks::{
    CONSOLE_POLL_INTERVAL, InputMode, TaskContext, command_ticker, console_input, console_output,
    pairing_broadcast,
};
use super::worker::{LinkCommand, LinkWorker};

const EVENT_CHANNEL_DEPTH: usize = 32;
const CONSOLE_INPUT_DEPTH: usize = 16;

type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

fn task(spec: TaskSpec, future: impl Future<Output = ()> + Send + 'static) -> (TaskSpec, TaskFuture) {
    let future: TaskFuture = Box::pin(future);
    (spec, future)
}

/// Optional node peripherals.
#[derive(Default)]
pub struct NodeOptions {
    console: Option<(ConsoleQueue, Box<dyn Write + Send>)>,
    indicator: Option<Box<dyn StatusIndicator>>,
    verbose: VerboseFlag,
}

impl NodeOptions {
    /// No console output, no indicator, verbose off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain `queue` to `output` from a lowest-priority task.
    pub fn console(mut self, queue: ConsoleQueue, output: impl Write + Send + 'static) -> Self {
        self.console = Some((queue, Box::new(output)));
        self
    }

    /// Drive a status indicator.
    pub fn indicator(mut self, indicator: impl StatusIndicator + 'static) -> Self {
        self.indicator = Some(Box::new(indicator));
        self
    }

    /// Share a verbose flag, for example with a console writer set up
    /// before boot.
    pub fn verbose(mut self, verbose: VerboseFlag) -> Self {
        self.verbose = verbose;
        self
    }
}

impl fmt::Debug for NodeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeOptions")
            .field("console", &self.console.is_some())
            .field("indicator", &self.indicator.is_some())
            .field("verbose", &self.verbose.is_on())
            .finish()
    }
}

/// Boot a node and start its task set.
///
/// Must be called from inside a Tokio runtime. A current-thread runtime
/// keeps the single-core execution model: tasks never run in parallel and
/// only switch at their queue, timer or event waits.
///
/// The persisted peer, if any, is restored before any task starts.
pub fn spawn_node<R, S, B>(
    role: Role,
    config: &LinkConfig,
    radio: Arc<R>,
    store: S,
    bridge: B,
    options: NodeOptions,
) -> Result<NodeHandle, InitError>
where
    R: RadioTransport + 'static,
    S: KeyValueStore + 'static,
    B: ActuatorBridge + 'static,
{
    config.validate()?;
    if tokio::runtime::Handle::try_current().is_err() {
        return Err(InitError::Task("link worker"));
    }

    let clock = LinkClock::new();
    let inbound = InboundQueue::new(config.inbound_queue_depth)?;
    let (commands_tx, commands_rx) = mpsc::channel(CONTROL_QUEUE_DEPTH);
    let (status_tx, status_rx) = watch::channel(LinkStatus::unpaired(role));
    let (observers, _) = broadcast::channel(EVENT_CHANNEL_DEPTH);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    let (input_tx, input_rx) = mpsc::channel(CONSOLE_INPUT_DEPTH);
    let events = EventGroup::new();

    radio.register_receive(inbound.receive_callback(clock))?;

    let machine = LinkStateMachine::new(role, Arc::clone(&radio), store, bridge, config);
    let mut worker = LinkWorker::new(
        machine,
        inbound.clone(),
        commands_rx,
        clock,
        events.clone(),
        status_tx,
        observers.clone(),
    );
    worker.boot();

    let ctx = TaskContext {
        role,
        config: config.clone(),
        radio,
        events: events.clone(),
        status: status_rx.clone(),
        commands: commands_tx.clone(),
        shutdown: shutdown_rx.clone(),
        verbose: options.verbose.clone(),
    };

    let mut set: Vec<(TaskSpec, TaskFuture)> = vec![task(
        TaskSpec::event_driven("link worker", TaskPriority::LinkWorker),
        supervise(
            "link worker",
            worker.run(shutdown_rx.clone()),
            Arc::clone(&shutdown_tx),
        ),
    )];
    match role {
        Role::Controller => set.extend(controller_tasks(&ctx, input_rx)),
        Role::Robot => set.extend(robot_tasks(&ctx, input_rx)),
    }
    if let Some(indicator) = options.indicator {
        set.push(task(
            TaskSpec::event_driven("status", TaskPriority::Status),
            run_indicator(indicator, status_rx.clone(), shutdown_rx.clone()),
        ));
    }
    let console = options.console.map(|(queue, output)| {
        set.push(task(
            TaskSpec::periodic("console output", TaskPriority::ConsoleOutput, CONSOLE_POLL_INTERVAL),
            console_output(
                queue.clone(),
                options.verbose.clone(),
                output,
                CONSOLE_POLL_INTERVAL,
                shutdown_rx.clone(),
            ),
        ));
        queue
    });

    sort_by_priority(&mut set);
    let tasks: Vec<_> = set
        .into_iter()
        .map(|(spec, future)| {
            tracing::debug!("[RTOS] Starting task '{}' (priority {})", spec.name, spec.priority);
            (spec, tokio::spawn(future))
        })
        .collect();
    tracing::info!("[RTOS] All tasks created successfully");

    Ok(NodeHandle {
        role,
        status: status_rx,
        observers,
        commands: commands_tx,
        input: input_tx,
        events,
        inbound,
        console,
        verbose: options.verbose,
        shutdown: shutdown_tx,
        tasks,
    })
}

/// Run a task the node cannot live without.
///
/// If it ends before shutdown is signalled, by returning or by panicking,
/// every other task is stopped.
async fn supervise(
    name: &'static str,
    future: impl Future<Output = ()> + Send + 'static,
    shutdown: Arc<watch::Sender<bool>>,
) {
    let result = tokio::spawn(future).await;
    if *shutdown.borrow() {
        return;
    }
    match result {
        Ok(()) => tracing::error!("[RTOS] Task '{}' exited unexpectedly", name),
        Err(e) => tracing::error!("[RTOS] Task '{}' failed: {}", name, e),
    }
    tracing::error!("[RTOS] Halting node");
    shutdown.send_replace(true);
}

/// Heartbeat, liveness monitor, pairing broadcast and fixed-rate command
/// forwarding.
fn controller_tasks<R: RadioTransport + 'static>(
    ctx: &TaskContext<R>,
    input: mpsc::Receiver<Vec<u8>>,
) -> Vec<(TaskSpec, TaskFuture)> {
    let heartbeat = ctx.config.heartbeat_interval();
    let monitor = ctx.config.monitor_interval();
    let pairing = ctx.config.pairing_interval();
    let forwarding = ctx.config.command_interval();
    vec![
        task(
            TaskSpec::periodic("command forwarding", TaskPriority::CommandForwarding, forwarding),
            console_input(ctx.clone(), input, forwarding, InputMode::Forward),
        ),
        task(
            TaskSpec::periodic("heartbeat", TaskPriority::Periodic, heartbeat),
            command_ticker(ctx.clone(), heartbeat, LinkCommand::SendHeartbeat),
        ),
        task(
            TaskSpec::periodic("monitor", TaskPriority::Periodic, monitor),
            command_ticker(ctx.clone(), monitor, LinkCommand::CheckTimeout),
        ),
        task(
            TaskSpec::periodic("pairing", TaskPriority::Periodic, pairing),
            pairing_broadcast(ctx.clone()),
        ),
    ]
}

/// Liveness monitor and console input. Datagrams from the controller are
/// handled by the link worker as they arrive.
fn robot_tasks<R: RadioTransport + 'static>(
    ctx: &TaskContext<R>,
    input: mpsc::Receiver<Vec<u8>>,
) -> Vec<(TaskSpec, TaskFuture)> {
    let monitor = ctx.config.monitor_interval();
    vec![
        task(
            TaskSpec::periodic("monitor", TaskPriority::Periodic, monitor),
            command_ticker(ctx.clone(), monitor, LinkCommand::CheckTimeout),
        ),
        task(
            TaskSpec::periodic("console input", TaskPriority::Status, CONSOLE_POLL_INTERVAL),
            console_input(ctx.clone(), input, CONSOLE_POLL_INTERVAL, InputMode::Discard),
        ),
    ]
}

/// Handle to a running node.
///
/// Dropping the handle stops every task.
pub struct NodeHandle {
    role: Role,
    status: watch::Receiver<LinkStatus>,
    observers: broadcast::Sender<LinkEvent>,
    commands: mpsc::Sender<LinkCommand>,
    input: mpsc::Sender<Vec<u8>>,
    events: EventGroup,
    inbound: InboundQueue,
    console: Option<ConsoleQueue>,
    verbose: VerboseFlag,
    shutdown: Arc<watch::Sender<bool>>,
    tasks: Vec<(TaskSpec, JoinHandle<()>)>,
}

impl NodeHandle {
    /// Which end of the link this node is.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Latest published link status.
    pub fn status(&self) -> LinkStatus {
        self.status.borrow().clone()
    }

    /// Receiver of link status updates.
    pub fn status_receiver(&self) -> watch::Receiver<LinkStatus> {
        self.status.clone()
    }

    /// Wait until the published status satisfies `f`.
    pub async fn wait_for(&self, f: impl FnMut(&LinkStatus) -> bool) -> Result<LinkStatus, LinkError> {
        let mut rx = self.status.clone();
        let status = rx.wait_for(f).await.map_err(|_| LinkError::Stopped)?;
        Ok(status.clone())
    }

    /// Subscribe to link events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.observers.subscribe()
    }

    /// Ask the link worker to run a command.
    pub async fn command(&self, command: LinkCommand) -> Result<(), LinkError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| LinkError::Stopped)
    }

    /// Feed console input bytes.
    pub async fn input(&self, bytes: impl Into<Vec<u8>>) -> Result<(), LinkError> {
        self.input
            .send(bytes.into())
            .await
            .map_err(|_| LinkError::Stopped)
    }

    /// Sender for console input, for a reader task of the caller's own.
    pub fn input_sender(&self) -> mpsc::Sender<Vec<u8>> {
        self.input.clone()
    }

    /// Signal bits shared by the tasks.
    pub fn event_group(&self) -> &EventGroup {
        &self.events
    }

    /// Inbound datagram queue.
    pub fn inbound(&self) -> &InboundQueue {
        &self.inbound
    }

    /// Console queue, when console output is enabled.
    pub fn console(&self) -> Option<&ConsoleQueue> {
        self.console.as_ref()
    }

    /// Verbose output switch.
    pub fn verbose(&self) -> &VerboseFlag {
        &self.verbose
    }

    /// Check if the node has been told to stop, by [`Self::shutdown`] or
    /// because a task it depends on died.
    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Wait until the node stops.
    pub async fn stopped(&self) {
        let mut rx = self.shutdown.subscribe();
        let _ = rx.wait_for(|stop| *stop).await;
    }

    /// Running tasks, highest priority first.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskSpec> {
        self.tasks.iter().map(|(spec, _)| spec)
    }

    /// Stop every task and wait for them to finish.
    pub async fn shutdown(mut self) {
        self.shutdown.send_replace(true);
        for (spec, handle) in self.tasks.drain(..) {
            if let Err(e) = handle.await {
                tracing::warn!("[RTOS] Task '{}' ended abnormally: {}", spec.name, e);
            }
        }
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHandle")
            .field("role", &self.role)
            .field("status", &*self.status.borrow())
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

impl Drop for NodeHandle {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}
