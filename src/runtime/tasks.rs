//! Task bodies shared by both roles.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::codec::{CommandText, DataMessage, DataPayload, Message, encode};
use crate::config::LinkConfig;
use crate::console::{CommandAssembler, ConsoleCommand, ConsoleQueue, VerboseFlag, drain_into};
use crate::core::Role;
use crate::link::LinkStatus;
use crate::radio::RadioTransport;

use super::event::{EVENT_UNPAIRED, EventGroup};
use super::periodic::Periodic;
use super::stopped;
use super::worker::LinkCommand;

/// Console output poll period.
pub const CONSOLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Everything a node task may touch. Link state itself is not here: tasks
/// read the published status and ask the worker for changes.
pub(crate) struct TaskContext<R> {
    pub role: Role,
    pub config: LinkConfig,
    pub radio: Arc<R>,
    pub events: EventGroup,
    pub status: watch::Receiver<LinkStatus>,
    pub commands: mpsc::Sender<LinkCommand>,
    pub shutdown: watch::Receiver<bool>,
    pub verbose: VerboseFlag,
}

impl<R> Clone for TaskContext<R> {
    fn clone(&self) -> Self {
        Self {
            role: self.role,
            config: self.config.clone(),
            radio: Arc::clone(&self.radio),
            events: self.events.clone(),
            status: self.status.clone(),
            commands: self.commands.clone(),
            shutdown: self.shutdown.clone(),
            verbose: self.verbose.clone(),
        }
    }
}

impl<R> TaskContext<R> {
    /// Hand a command to the worker without waiting. A full channel skips
    /// this period; the next one retries.
    fn request(&self, command: LinkCommand) {
        match self.commands.try_send(command) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!("[RTOS] Skipping {:?}: worker busy", command);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::error!("[RTOS] Link worker gone, dropping {:?}", command);
            }
        }
    }
}

/// Send `command` to the worker every `period`, starting one period from
/// now.
pub(crate) async fn command_ticker<R>(mut ctx: TaskContext<R>, period: Duration, command: LinkCommand) {
    let mut ticker = Periodic::delayed(period);
    loop {
        tokio::select! {
            _ = ticker.tick() => ctx.request(command),
            _ = stopped(&mut ctx.shutdown) => return,
        }
    }
}

/// Controller: broadcast pairing requests while unpaired and sleep on the
/// unpaired event while paired.
pub(crate) async fn pairing_broadcast<R>(mut ctx: TaskContext<R>) {
    let mut ticker = Periodic::new(ctx.config.pairing_interval());
    loop {
        if ctx.status.borrow().paired {
            tokio::select! {
                _ = ctx.events.wait_any(EVENT_UNPAIRED, true) => {}
                _ = stopped(&mut ctx.shutdown) => return,
            }
            tracing::debug!("[PAIRING] Resuming pairing broadcasts");
            ticker.reset_immediately();
            continue;
        }
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stopped(&mut ctx.shutdown) => return,
        }
        if !ctx.status.borrow().paired {
            ctx.request(LinkCommand::BroadcastPairing);
        }
    }
}

/// How the console input task treats joint commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputMode {
    /// Send them to the peer (controller).
    Forward,
    /// Discard them (robot).
    Discard,
}

/// Poll console input every `period` and act on completed commands.
pub(crate) async fn console_input<R: RadioTransport>(
    mut ctx: TaskContext<R>,
    mut input: mpsc::Receiver<Vec<u8>>,
    period: Duration,
    mode: InputMode,
) {
    let force_pair = ctx.role == Role::Controller && ctx.config.permanent_pairing;
    let mut assembler = CommandAssembler::new(force_pair);
    let mut ticker = Periodic::new(period);
    let mut input_open = true;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stopped(&mut ctx.shutdown) => return,
        }
        while input_open {
            let bytes = match input.try_recv() {
                Ok(bytes) => bytes,
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    input_open = false;
                    break;
                }
            };
            for command in assembler.extend(&bytes) {
                on_console_command(&ctx, command, mode);
            }
        }
    }
}

fn on_console_command<R: RadioTransport>(ctx: &TaskContext<R>, command: ConsoleCommand, mode: InputMode) {
    match command {
        ConsoleCommand::ToggleVerbose => {
            let on = ctx.verbose.toggle();
            tracing::info!("Debug mode: {}", if on { "ON" } else { "OFF" });
        }
        ConsoleCommand::ForcePair => {
            tracing::info!("[PAIRING] Forcing re-pair");
            ctx.request(LinkCommand::Unpair);
        }
        ConsoleCommand::Forward(text) => {
            if mode == InputMode::Discard {
                tracing::debug!("[CLI] Ignoring command: {}", text.as_str());
                return;
            }
            forward_command(ctx, text);
        }
    }
}

/// Send a joint command straight to the peer. Commands typed while
/// unpaired are discarded.
fn forward_command<R: RadioTransport>(ctx: &TaskContext<R>, text: CommandText) {
    let peer = {
        let status = ctx.status.borrow();
        if !status.paired {
            None
        } else {
            status.peer
        }
    };
    let Some(peer) = peer else {
        tracing::debug!("[CLI] Not paired, dropping command");
        return;
    };
    let frame = encode(&Message::Data(DataMessage {
        id: ctx.role.node_id(),
        payload: DataPayload::Command(text),
    }));
    match ctx.radio.send(peer, &frame) {
        Ok(()) => tracing::trace!("[DATA] Sent: {}", text.as_str()),
        Err(e) if e.is_silent_drop() => tracing::debug!("[DATA] Send dropped: {}", e),
        Err(e) => tracing::warn!("[DATA] Send failed: {}", e),
    }
}

/// Drain the console queue to `output` every `period`.
///
/// Runs at the lowest priority; producers never wait on it.
pub(crate) async fn console_output(
    queue: ConsoleQueue,
    verbose: VerboseFlag,
    mut output: Box<dyn Write + Send>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = Periodic::new(period);
    loop {
        let stopping = tokio::select! {
            _ = ticker.tick() => false,
            _ = stopped(&mut shutdown) => true,
        };
        if drain_into(&queue, &verbose, &mut output).is_err() || stopping {
            return;
        }
    }
}
