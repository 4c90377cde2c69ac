//! focusguardd - the focusguard background service
//!
//! Wires together:
//! - Configuration loading
//! - Store initialization
//! - Core engine and its stop-blocking wake-up
//! - IPC server

mod alarms;
mod dispatch;

use anyhow::{Context, Result};
use clap::Parser;
use focusguard_api::{Event, EventPayload, Remaining};
use focusguard_config::load_config_or_default;
use focusguard_core::{CoreEngine, STOP_BLOCKING_ALARM};
use focusguard_ipc::{IpcServer, ServerMessage};
use focusguard_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use focusguard_util::{
    default_config_path, format_minutes, FOCUSGUARD_CONFIG_ENV, FOCUSGUARD_DATA_DIR_ENV,
    FOCUSGUARD_SOCKET_ENV,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::alarms::TokioAlarms;
use crate::dispatch::{event_payload, handle_command, to_response};

/// focusguardd - distraction blocking and usage tracking service
#[derive(Parser, Debug)]
#[command(name = "focusguardd")]
#[command(about = "Blocks distracting sites and tracks time spent on them", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/focusguard/config.toml)
    #[arg(short, long, env = FOCUSGUARD_CONFIG_ENV, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override
    #[arg(short, long, env = FOCUSGUARD_SOCKET_ENV)]
    socket: Option<PathBuf>,

    /// Data directory override
    #[arg(short, long, env = FOCUSGUARD_DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

type SharedEngine = Arc<Mutex<CoreEngine>>;

struct Service {
    engine: CoreEngine,
    ipc: Arc<IpcServer>,
    store: Arc<dyn Store>,
    alarm_rx: mpsc::UnboundedReceiver<String>,
    poll_interval: Duration,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let policy = load_config_or_default(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(
            config_path = %args.config.display(),
            sites = policy.sites.len(),
            custom_sites = policy.custom_sites.len(),
            mode = ?policy.service.blocking_mode,
            "Configuration loaded"
        );

        let socket_path = args
            .socket
            .clone()
            .unwrap_or_else(|| policy.service.socket_path.clone());
        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| policy.service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join("focusguard.db");
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );
        info!(db_path = %db_path.display(), "Store initialized");

        store.append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;

        let (alarm_tx, alarm_rx) = mpsc::unbounded_channel();
        let alarms = Arc::new(TokioAlarms::new(alarm_tx));
        let poll_interval = policy.service.poll_interval;

        let mut engine = CoreEngine::new(policy, store.clone(), alarms);
        let now = focusguard_util::now();
        engine.initialize(now);

        match engine.block_status(now) {
            Ok((state, Remaining::Minutes(m))) if state.is_active() => {
                info!(state = ?state, remaining = %format_minutes(m), "Blocking in effect");
            }
            Ok((state, _)) => info!(state = ?state, "Block state"),
            Err(e) => warn!(error = %e, "Block state unreadable at startup"),
        }

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start().await?;

        Ok(Self {
            engine,
            ipc: Arc::new(ipc),
            store,
            alarm_rx,
            poll_interval,
        })
    }

    async fn run(mut self) -> Result<()> {
        let ipc = self.ipc.clone();
        let mut ipc_messages = ipc
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        let engine: SharedEngine = Arc::new(Mutex::new(self.engine));
        let store = self.store.clone();

        // Startup work may already have queued events
        Self::publish(&engine, &ipc).await;

        let ipc_accept = ipc.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup =
            signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        let mut poll_timer = tokio::time::interval(self.poll_interval);
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(poll_secs = self.poll_interval.as_secs(), "Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                _ = poll_timer.tick() => {
                    let now = focusguard_util::now();
                    engine.lock().await.tick(now);
                    Self::publish(&engine, &ipc).await;
                }

                Some(alarm) = self.alarm_rx.recv() => {
                    Self::handle_alarm(&engine, &alarm).await;
                    Self::publish(&engine, &ipc).await;
                }

                Some(msg) = ipc_messages.recv() => {
                    Self::handle_ipc_message(&engine, &ipc, &store, msg).await;
                    Self::publish(&engine, &ipc).await;
                }
            }
        }

        info!("Shutting down focusguardd");

        engine.lock().await.shutdown(focusguard_util::now());
        Self::publish(&engine, &ipc).await;
        ipc.broadcast_event(Event::new(EventPayload::Shutdown));

        if let Err(e) = store.append_audit(AuditEvent::new(AuditEventType::ServiceStopped)) {
            warn!(error = %e, "Failed to log service shutdown");
        }

        ipc.shutdown();
        info!("Shutdown complete");
        Ok(())
    }

    /// Broadcast everything the engine queued
    async fn publish(engine: &SharedEngine, ipc: &Arc<IpcServer>) {
        let events = engine.lock().await.drain_events();
        for event in events {
            debug!(event = ?event, "Broadcasting event");
            ipc.broadcast_event(Event::new(event_payload(event)));
        }
    }

    async fn handle_alarm(engine: &SharedEngine, alarm: &str) {
        if alarm != STOP_BLOCKING_ALARM {
            warn!(alarm, "Unknown alarm fired");
            return;
        }

        let now = focusguard_util::now();
        if let Err(e) = engine.lock().await.on_stop_blocking_alarm(now) {
            warn!(error = %e, "Failed to handle stop-blocking wake-up");
        }
    }

    async fn handle_ipc_message(
        engine: &SharedEngine,
        ipc: &Arc<IpcServer>,
        store: &Arc<dyn Store>,
        msg: ServerMessage,
    ) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                debug!(
                    client_id = %client_id,
                    request_id = request.request_id,
                    command = ?request.command,
                    "Request"
                );

                let now = focusguard_util::now();
                let result = {
                    let mut engine = engine.lock().await;
                    handle_command(&mut engine, &client_id, request.command, now)
                };

                let response = to_response(request.request_id, result);
                if let Err(e) = ipc.send_response(&client_id, response).await {
                    debug!(client_id = %client_id, error = %e, "Failed to send response");
                }
            }

            ServerMessage::ClientConnected { client_id, info } => {
                let _ = store.append_audit(AuditEvent::new(AuditEventType::ClientConnected {
                    client_id: client_id.to_string(),
                    uid: info.uid,
                }));
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");
                let _ = store.append_audit(AuditEvent::new(
                    AuditEventType::ClientDisconnected {
                        client_id: client_id.to_string(),
                    },
                ));
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "focusguardd starting"
    );

    if focusguard_util::is_mock_time_active() {
        warn!(now = %focusguard_util::now(), "Mock time is active");
    }

    let service = Service::new(&args).await?;
    service.run().await
}
