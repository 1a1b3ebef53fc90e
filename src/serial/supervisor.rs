use std::{
    io::Write,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use log::{error, info, warn};
use serde::Serialize;
use serialport::SerialPort;
use tokio::{
    sync::{mpsc, watch},
    time::{interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::settings::SerialSettings;

use super::link::{self, ReaderEvent};

/// Observable connection state, published on a watch channel for the
/// presentation layer's status indicator.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "state", content = "detail")]
pub enum LinkState {
    Closed,
    Open(String),
    Error(String),
}

#[derive(Debug)]
enum LinkCommand {
    Reconnect,
    Write(String),
}

/// Handle to the supervisor task. Cheap to clone; every clone talks to the
/// same single port owner.
#[derive(Clone)]
pub struct SerialHandle {
    commands: mpsc::UnboundedSender<LinkCommand>,
    status: watch::Receiver<LinkState>,
    cancel: CancellationToken,
}

impl SerialHandle {
    /// Throttled close-and-reopen; driven by the `reconnect` token or the
    /// presentation layer's reset control.
    pub fn request_reconnect(&self) {
        let _ = self.commands.send(LinkCommand::Reconnect);
    }

    /// Best-effort host-to-device line (`correct`, `wrong`, `ledSequence`).
    /// Write failures are logged, never fatal.
    pub fn send_line(&self, token: &str) {
        let _ = self.commands.send(LinkCommand::Write(token.to_string()));
    }

    pub fn status(&self) -> watch::Receiver<LinkState> {
        self.status.clone()
    }

    /// Close and drain the port, then stop the supervisor. Idempotent and
    /// safe to call when the port never opened. Must complete before
    /// another context may bind the device.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Owns the serial connection lifecycle: opens the port, runs the reconnect
/// watchdog, forwards debounced tokens, and performs best-effort writes.
pub struct SerialSupervisor;

impl SerialSupervisor {
    /// Spawns the supervisor task. Tokens surviving framing and debounce
    /// arrive on `tokens` in FIFO order.
    pub fn spawn(
        settings: SerialSettings,
        tokens: mpsc::UnboundedSender<String>,
    ) -> SerialHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(LinkState::Closed);
        let cancel = CancellationToken::new();

        let owner = LinkOwner {
            settings,
            tokens,
            status_tx,
            generation: 0,
            writer: None,
            reader: None,
            last_attempt: None,
        };

        tokio::spawn(owner.run(command_rx, cancel.clone()));

        SerialHandle {
            commands: command_tx,
            status: status_rx,
            cancel,
        }
    }
}

struct LinkOwner {
    settings: SerialSettings,
    tokens: mpsc::UnboundedSender<String>,
    status_tx: watch::Sender<LinkState>,
    generation: u64,
    writer: Option<Box<dyn SerialPort>>,
    reader: Option<(Arc<AtomicBool>, thread::JoinHandle<()>)>,
    last_attempt: Option<Instant>,
}

impl LinkOwner {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<LinkCommand>,
        cancel: CancellationToken,
    ) {
        let (reader_tx, mut reader_rx) = mpsc::unbounded_channel::<ReaderEvent>();

        if self.wants_port() {
            self.open_now(&reader_tx);
        }

        let mut watchdog = interval(Duration::from_secs(self.settings.watchdog_interval_secs));
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(LinkCommand::Reconnect) => self.reconnect(&reader_tx).await,
                        Some(LinkCommand::Write(line)) => self.write_line(&line),
                        None => break,
                    }
                }
                event = reader_rx.recv() => {
                    match event {
                        Some(ReaderEvent::Token { generation, token })
                            if generation == self.generation =>
                        {
                            let _ = self.tokens.send(token);
                        }
                        Some(ReaderEvent::Failed { generation, message })
                            if generation == self.generation =>
                        {
                            error!("serial read failed: {message}");
                            self.writer = None;
                            self.reader = None;
                            self.status_tx.send_replace(LinkState::Error(message));
                        }
                        // Stale generation: a line from a connection that
                        // was already replaced.
                        Some(_) => {}
                        None => break,
                    }
                }
                _ = watchdog.tick() => {
                    if self.wants_port() && !self.is_open() {
                        self.open_now(&reader_tx);
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }

        self.close().await;
        info!("serial supervisor shutting down");
    }

    fn wants_port(&self) -> bool {
        !matches!(self.settings.port.as_str(), "" | "none")
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    fn throttle_ok(&self) -> bool {
        let throttle = Duration::from_millis(self.settings.reconnect_throttle_ms);
        self.last_attempt
            .map(|at| at.elapsed() >= throttle)
            .unwrap_or(true)
    }

    fn open_now(&mut self, reader_tx: &mpsc::UnboundedSender<ReaderEvent>) {
        if !self.throttle_ok() {
            return;
        }
        self.last_attempt = Some(Instant::now());

        let (name, port) = match link::open_port(&self.settings) {
            Ok(opened) => opened,
            Err(err) => {
                warn!("serial open failed: {err}");
                self.status_tx.send_replace(LinkState::Error(err.to_string()));
                return;
            }
        };

        self.generation += 1;
        let writer = match port.try_clone() {
            Ok(clone) => Some(clone),
            Err(err) => {
                warn!("serial write handle unavailable on {name}: {err}");
                None
            }
        };

        let stop = Arc::new(AtomicBool::new(false));
        let debounce = Duration::from_millis(self.settings.debounce_ms);
        match link::spawn_reader(port, self.generation, debounce, stop.clone(), reader_tx.clone())
        {
            Ok(handle) => {
                info!("serial link open on {name}");
                self.reader = Some((stop, handle));
                self.writer = writer;
                self.status_tx.send_replace(LinkState::Open(name));
            }
            Err(err) => {
                error!("failed to spawn serial reader for {name}: {err}");
                self.status_tx
                    .send_replace(LinkState::Error(format!("reader spawn failed: {err}")));
            }
        }
    }

    async fn reconnect(&mut self, reader_tx: &mpsc::UnboundedSender<ReaderEvent>) {
        if !self.throttle_ok() {
            return;
        }
        self.close().await;
        // Give the device a beat to settle before the handle is reacquired.
        tokio::time::sleep(Duration::from_millis(150)).await;
        self.open_now(reader_tx);
    }

    /// Stops the reader (which drains in-flight bytes before exiting) and
    /// releases both handles. Idempotent.
    async fn close(&mut self) {
        self.writer = None;
        if let Some((stop, handle)) = self.reader.take() {
            stop.store(true, Ordering::Relaxed);
            let joined = tokio::task::spawn_blocking(move || handle.join()).await;
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(panic)) => error!("serial reader thread panicked: {panic:?}"),
                Err(err) => error!("failed to join serial reader: {err}"),
            }
        }
        self.status_tx.send_replace(LinkState::Closed);
    }

    fn write_line(&mut self, token: &str) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let framed = format!("{token}\n");
        if let Err(err) = writer.write_all(framed.as_bytes()) {
            warn!("serial write failed: {err}");
        }
    }
}
