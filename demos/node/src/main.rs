//! Host node for the Q8 link.
//!
//! Runs a controller, or a robot with a simulated servo bus, over UDP. Two
//! nodes on one machine:
//!
//! ```text
//! q8-node robot      --bind 127.0.0.1:47002 --neighbour 127.0.0.1:47001
//! q8-node controller --bind 127.0.0.1:47001 --neighbour 127.0.0.1:47002
//! ```
//!
//! Type `d` to toggle debug output, or a joint command such as
//! `0,0,0,0,0,0,0,0,0,1000,1;` on the controller.

use std::io::{self, Read};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use q8link::bridge::{Detached, Q8Bridge, SimFuelGauge, SimServoBus};
use q8link::config::LinkConfig;
use q8link::console::{ConsoleQueue, ConsoleWriter, VerboseFlag, drain_into};
use q8link::core::{InitError, MacAddress, Role};
use q8link::radio::UdpRadio;
use q8link::runtime::{NodeHandle, NodeOptions, spawn_node};
use q8link::storage::FileStore;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Controller,
    Robot,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Controller => Role::Controller,
            RoleArg::Robot => Role::Robot,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Run one end of a Q8 radio link over UDP", long_about = None)]
struct Cli {
    /// Which end of the link to run
    #[arg(value_enum)]
    role: RoleArg,

    /// TOML file overriding link defaults
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Local UDP address standing in for the radio
    #[arg(long, default_value = "127.0.0.1:47001")]
    bind: SocketAddr,

    /// UDP address of a node sharing the medium (repeatable)
    #[arg(long = "neighbour", value_name = "ADDR")]
    neighbours: Vec<SocketAddr>,

    /// Hardware address of this node (defaults per role)
    #[arg(long)]
    mac: Option<MacAddress>,

    /// Directory holding the persisted peer address
    #[arg(long, env = "Q8_STORE_DIR", default_value = ".q8link")]
    store_dir: PathBuf,

    /// Start with debug output on
    #[arg(short, long)]
    verbose: bool,
}

fn default_mac(role: Role) -> MacAddress {
    match role {
        Role::Controller => MacAddress::new([0x02, 0x51, 0x38, 0x00, 0x00, 0x01]),
        Role::Robot => MacAddress::new([0x02, 0x51, 0x38, 0x00, 0x00, 0x02]),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("config error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let queue = ConsoleQueue::new(config.console_queue_depth);
    let verbose = VerboseFlag::new(cli.verbose);
    tracing_subscriber::fmt()
        .with_writer(ConsoleWriter::new(queue.clone()))
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .with_level(false)
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("[RTOS] Initialization failed - halting system: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(cli, config, queue.clone(), verbose.clone()));
    if let Err(e) = result {
        tracing::error!("[RTOS] Initialization failed - halting system");
        tracing::error!("{:#}", e);
        // The output task never started or has stopped; flush by hand.
        verbose.set(true);
        let _ = drain_into(&queue, &verbose, &mut io::stderr());
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn load_config(path: Option<&PathBuf>) -> Result<LinkConfig> {
    match path {
        Some(path) => LinkConfig::from_path(path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(LinkConfig::default()),
    }
}

async fn run(cli: Cli, config: LinkConfig, queue: ConsoleQueue, verbose: VerboseFlag) -> Result<()> {
    let role = Role::from(cli.role);
    let mac = cli.mac.unwrap_or_else(|| default_mac(role));
    tracing::info!("[RTOS] {} {} on {}", role, mac, cli.bind);

    let radio = UdpRadio::bind(cli.bind, mac, config.channel, cli.neighbours)
        .await
        .map_err(|e| InitError::Transport(e.into()))?;
    let radio = Arc::new(radio);
    let receiver = radio.spawn_receiver();

    let store = FileStore::open(cli.store_dir.clone())
        .with_context(|| format!("opening store {}", cli.store_dir.display()))?;
    let options = NodeOptions::new()
        .console(queue, io::stdout())
        .verbose(verbose);

    let node = match role {
        Role::Controller => spawn_node(role, &config, Arc::clone(&radio), store, Detached, options)?,
        Role::Robot => {
            let bridge = Q8Bridge::new(SimServoBus::new(), SimFuelGauge::new(87));
            spawn_node(role, &config, Arc::clone(&radio), store, bridge, options)?
        }
    };
    spawn_stdin_reader(&node);

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("[RTOS] Shutting down");
    node.shutdown().await;
    receiver.abort();
    Ok(())
}

/// Forward raw stdin bytes to the node's console input.
fn spawn_stdin_reader(node: &NodeHandle) {
    let input = node.input_sender();
    std::thread::spawn(move || {
        let mut stdin = io::stdin().lock();
        let mut buf = [0u8; 128];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if input.blocking_send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
}
