//! Bridge driver
//!
//! This module runs the [`ProtocolEngine`] against real collaborators. All
//! activity goes through one shared engine behind a mutex: the panel read
//! loop, the simulator dispatcher, the activation task, the delayed preset
//! resolution and the connection supervisor. The lock is only held while the
//! engine computes its effects, never while those effects are carried out.
//!
//! # Tasks
//!
//! - **panel reader**: decodes lines and feeds them to the engine
//! - **panel writer**: drains the outgoing line queue
//! - **simulator dispatcher**: feeds [`SimUpdate`]s to the engine
//! - **activation**: uploads a preset layout, pausing between fields
//! - **resolution**: single-flight, runs after the coalescing window
//! - **supervisor**: reconnects while the operator wants a connection
//!
//! # Example
//!
//! ```rust,ignore
//! use cockpit_engine::{CockpitBridge, EngineConfig, SerialDevicePort};
//!
//! let port = Arc::new(SerialDevicePort::new("/dev/ttyACM0", 2400));
//! let (bridge, mut channels) = CockpitBridge::new(EngineConfig::default(), library, sim, port);
//! bridge.start();
//! bridge.set_keep_connected(true).await;
//!
//! while let Some(event) = channels.events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

use std::io::{self, ErrorKind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use cockpit_preset::{PresetLibrary, Resolution, SimVariable, IDENTIFICATION_VARS};
use cockpit_protocol::{EncodeLine, PanelCommand};
use parking_lot::Mutex;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::device::{write_lines, BoxedDeviceIo, DevicePort, DeviceReader};
use crate::engine::{Effect, ProtocolEngine, SimCommand};
use crate::error::EngineError;
use crate::events::{Direction, EngineEvent, Indicator, Link, PresetChoiceRequest};
use crate::scheduler::SingleFlight;
use crate::simulator::{SimLinkError, SimUpdate, SimulatorLink};
use crate::state::LinkState;
use crate::supervisor::run_supervisor;

/// Capacity of the operator event channel
const EVENT_CAPACITY: usize = 256;
/// Capacity of the outgoing panel line queue
const DEVICE_QUEUE: usize = 64;
/// Capacity of the simulator update channel
const SIM_UPDATE_CAPACITY: usize = 256;

/// Receiving ends handed to the operator surface
#[derive(Debug)]
pub struct BridgeChannels {
    pub events: mpsc::Receiver<EngineEvent>,
    pub choices: mpsc::Receiver<PresetChoiceRequest>,
}

/// One open panel transport
struct DeviceSession {
    id: u64,
    lines: mpsc::Sender<String>,
    cancel: CancellationToken,
    reader: JoinHandle<()>,
}

/// State shared by every bridge task
pub(crate) struct BridgeInner {
    pub(crate) config: EngineConfig,
    engine: Mutex<ProtocolEngine>,
    sim: Arc<dyn SimulatorLink>,
    port: Mutex<Arc<dyn DevicePort>>,
    device: Mutex<Option<DeviceSession>>,
    next_session: AtomicU64,
    events: mpsc::Sender<EngineEvent>,
    choices: mpsc::Sender<PresetChoiceRequest>,
    sim_updates: mpsc::Sender<SimUpdate>,
    keep_connected: AtomicBool,
    resolution: Arc<SingleFlight>,
    /// Serializes activations so layouts never interleave on the wire
    activation: tokio::sync::Mutex<()>,
    /// Serializes connection attempts
    supervising: tokio::sync::Mutex<()>,
    /// Stops the supervisor, the dispatcher and pending resolutions
    pub(crate) shutdown: CancellationToken,
}

/// Handle to a running bridge
pub struct CockpitBridge {
    inner: Arc<BridgeInner>,
    sim_updates: Mutex<Option<mpsc::Receiver<SimUpdate>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CockpitBridge {
    /// Create a bridge; call [`CockpitBridge::start`] from within a runtime
    pub fn new(
        config: EngineConfig,
        library: PresetLibrary,
        sim: Arc<dyn SimulatorLink>,
        port: Arc<dyn DevicePort>,
    ) -> (Self, BridgeChannels) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
        let (choice_tx, choice_rx) = mpsc::channel(4);
        let (update_tx, update_rx) = mpsc::channel(SIM_UPDATE_CAPACITY);

        let inner = Arc::new(BridgeInner {
            engine: Mutex::new(ProtocolEngine::new(library, config.clone())),
            config,
            sim,
            port: Mutex::new(port),
            device: Mutex::new(None),
            next_session: AtomicU64::new(1),
            events: event_tx,
            choices: choice_tx,
            sim_updates: update_tx,
            keep_connected: AtomicBool::new(false),
            resolution: SingleFlight::new(),
            activation: tokio::sync::Mutex::new(()),
            supervising: tokio::sync::Mutex::new(()),
            shutdown: CancellationToken::new(),
        });

        let bridge = Self {
            inner,
            sim_updates: Mutex::new(Some(update_rx)),
            tasks: Mutex::new(Vec::new()),
        };
        let channels = BridgeChannels {
            events: event_rx,
            choices: choice_rx,
        };
        (bridge, channels)
    }

    /// Spawn the simulator dispatcher and the supervisor
    ///
    /// Only the first call has an effect, so exactly one supervisor runs.
    pub fn start(&self) -> bool {
        let Some(updates) = self.sim_updates.lock().take() else {
            warn!("Bridge already started");
            return false;
        };
        let dispatcher = tokio::spawn(run_sim_dispatcher(Arc::clone(&self.inner), updates));
        let supervisor = tokio::spawn(run_supervisor(Arc::clone(&self.inner)));
        self.tasks.lock().extend([dispatcher, supervisor]);
        info!("Bridge started");
        true
    }

    /// Set or clear the operator's keep-connected intent
    ///
    /// Setting it retries immediately, also after a failed handshake.
    /// Clearing it releases the panel and the simulator.
    pub async fn set_keep_connected(&self, keep: bool) {
        if keep {
            self.inner.engine.lock().clear_failure();
            self.inner.keep_connected.store(true, Ordering::SeqCst);
            info!("Keep connected enabled");
            self.inner.supervise_once().await;
        } else {
            info!("Keep connected disabled");
            self.inner.disconnect_all().await;
        }
    }

    pub fn keep_connected(&self) -> bool {
        self.inner.keep_connected.load(Ordering::SeqCst)
    }

    /// Use another port from the next connection attempt on
    pub fn set_port(&self, port: Arc<dyn DevicePort>) {
        info!("Panel port set to {}", port.name());
        *self.inner.port.lock() = port;
    }

    pub fn link_state(&self) -> LinkState {
        self.inner.engine.lock().link_state()
    }

    pub fn active_preset_name(&self) -> Option<String> {
        self.inner
            .engine
            .lock()
            .active_preset_name()
            .map(str::to_string)
    }

    pub fn is_resolution_pending(&self) -> bool {
        self.inner.resolution.is_pending()
    }

    /// Stop every task, release the panel and leave the simulator
    ///
    /// The panel gets `R` and a short grace period. Task joins are bounded,
    /// so a stuck task cannot hold up process exit.
    pub async fn shutdown(&self) {
        info!("Shutting down bridge");
        self.inner.keep_connected.store(false, Ordering::SeqCst);
        self.inner.shutdown.cancel();
        self.inner.close_device(true).await;
        if self.inner.sim.is_connected() {
            self.inner.sim.disconnect();
        }

        let tasks = std::mem::take(&mut *self.tasks.lock());
        let timeout = self.inner.config.join_timeout();
        for task in tasks {
            if tokio::time::timeout(timeout, task).await.is_err() {
                warn!("Bridge task did not stop within {:?}", timeout);
            }
        }
        info!("Bridge stopped");
    }
}

impl BridgeInner {
    async fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event).await;
    }

    /// Carry out engine effects in order
    async fn run_effects(self: &Arc<Self>, effects: Vec<Effect>) {
        let mut written = false;
        for effect in effects {
            match effect {
                Effect::Device(command) => written = self.send_device(command).await,
                Effect::Settle => tokio::time::sleep(self.config.field_settle()).await,
                Effect::Sim(command) => {
                    if let Err(e) = self.apply_sim(command) {
                        let err = EngineError::from(e);
                        warn!("{}", err);
                        self.emit(EngineEvent::warning(err.to_string())).await;
                    }
                }
                Effect::Notify(event) => self.emit(event).await,
                Effect::Activate => self.spawn_activation(),
                Effect::ScheduleResolution => self.schedule_resolution(),
                Effect::ArmKnob { generation, knob } => {
                    if written && !self.engine.lock().knob_written(generation, knob) {
                        debug!("Knob {} rebound before its value was sent", knob);
                    }
                }
                Effect::SuspendReconnect => {
                    self.keep_connected.store(false, Ordering::SeqCst);
                    self.emit(EngineEvent::KeepConnectedChanged(false)).await;
                    self.spawn_close_device();
                }
            }
        }
    }

    /// Queue a line for the panel writer; false when it was dropped
    async fn send_device(&self, command: PanelCommand) -> bool {
        let lines = self.device.lock().as_ref().map(|d| d.lines.clone());
        let Some(lines) = lines else {
            debug!("Panel not connected, dropping {}", command);
            return false;
        };
        if lines.send(command.encode()).await.is_err() {
            debug!("Panel writer gone, dropping {}", command);
            return false;
        }
        true
    }

    fn apply_sim(&self, command: SimCommand) -> Result<(), SimLinkError> {
        match command {
            SimCommand::ClearSubscriptions => self.sim.clear_subscriptions(),
            SimCommand::Subscribe(variable) => self.sim.subscribe(&variable),
            SimCommand::SetValue { variable, value } => self.sim.set_value(&variable, &value),
            SimCommand::Execute(code) => self.sim.execute_code(&code),
            SimCommand::Transmit { handle, payload } => self.sim.transmit_event(handle, payload),
            SimCommand::RegisterFieldEvent {
                generation,
                field,
                event,
            } => {
                let handle = self.sim.register_event(&event)?;
                if !self.engine.lock().bind_field_event(generation, field, handle) {
                    debug!("Discarding stale handle for field event {}", event);
                }
                Ok(())
            }
            SimCommand::RegisterSwitchEvent {
                generation,
                switch,
                on,
                event,
            } => {
                let handle = self.sim.register_event(&event)?;
                if !self
                    .engine
                    .lock()
                    .bind_switch_event(generation, switch, on, handle)
                {
                    debug!("Discarding stale handle for switch event {}", event);
                }
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------------
    // Panel link
    // ------------------------------------------------------------------------

    pub(crate) fn device_connected(&self) -> bool {
        self.device
            .lock()
            .as_ref()
            .is_some_and(|d| !d.cancel.is_cancelled())
    }

    pub(crate) fn keep_connected(&self) -> bool {
        self.keep_connected.load(Ordering::SeqCst)
    }

    pub(crate) fn handshake_ping(&self) -> Option<PanelCommand> {
        self.engine.lock().handshake_ping()
    }

    pub(crate) async fn ping(&self, command: PanelCommand) {
        self.send_device(command).await;
    }

    pub(crate) async fn connect_device(self: &Arc<Self>) {
        let port = Arc::clone(&*self.port.lock());
        match port.open() {
            Ok(io) => self.attach_device(port.name().to_string(), io).await,
            Err(e) => {
                let err = EngineError::Transport(e);
                warn!("Cannot open panel port {}: {}", port.name(), err);
                self.emit(EngineEvent::warning(format!(
                    "Cannot open {}: {}",
                    port.name(),
                    err
                )))
                .await;
                self.emit(EngineEvent::link(Link::Device, Indicator::Failed))
                    .await;
            }
        }
    }

    async fn attach_device(self: &Arc<Self>, name: String, io: BoxedDeviceIo) {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let (read_half, write_half) = tokio::io::split(io);
        let (line_tx, line_rx) = mpsc::channel(DEVICE_QUEUE);
        let cancel = CancellationToken::new();

        tokio::spawn(run_device_writer(
            Arc::clone(self),
            id,
            write_half,
            line_rx,
            cancel.clone(),
        ));
        let reader = tokio::spawn(run_device_reader(
            Arc::clone(self),
            id,
            DeviceReader::new(name.clone(), read_half),
            cancel.clone(),
        ));

        let previous = self.device.lock().replace(DeviceSession {
            id,
            lines: line_tx,
            cancel,
            reader,
        });
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }

        info!("Panel link {} open (session {})", name, id);
        self.emit(EngineEvent::info(format!("Connected to {name}")))
            .await;
        let effects = self.engine.lock().transport_connected();
        self.run_effects(effects).await;
    }

    async fn handle_device_line(self: &Arc<Self>, line: String) {
        self.emit(EngineEvent::DeviceTraffic {
            direction: Direction::In,
            line: line.clone(),
        })
        .await;
        let effects = self.engine.lock().handle_device_line(&line, Instant::now());
        self.run_effects(effects).await;
    }

    /// Forget session `id` after a transport failure
    async fn device_lost(self: &Arc<Self>, id: u64, err: EngineError) {
        let session = {
            let mut device = self.device.lock();
            if device.as_ref().is_some_and(|d| d.id == id) {
                device.take()
            } else {
                None
            }
        };
        let Some(session) = session else {
            return;
        };
        session.cancel.cancel();
        warn!("Panel session {} ended: {}", id, err);
        self.emit(EngineEvent::warning(err.to_string())).await;
        let effects = self.engine.lock().transport_lost();
        self.run_effects(effects).await;
    }

    /// Close the panel transport, optionally releasing the panel with `R` first
    pub(crate) async fn close_device(&self, reset: bool) {
        let session = self.device.lock().take();
        let Some(session) = session else {
            return;
        };
        if reset {
            let _ = session.lines.send(PanelCommand::Reset.encode()).await;
            tokio::time::sleep(self.config.reset_grace()).await;
        }
        session.cancel.cancel();

        let timeout = self.config.join_timeout();
        if tokio::time::timeout(timeout, session.reader).await.is_err() {
            warn!("Panel read loop did not stop within {:?}", timeout);
        }
        info!("Panel session {} closed", session.id);
    }

    fn spawn_close_device(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.close_device(false).await;
        });
    }

    /// Operator cleared the keep-connected intent
    async fn disconnect_all(self: &Arc<Self>) {
        self.keep_connected.store(false, Ordering::SeqCst);
        self.close_device(true).await;
        if self.sim.is_connected() {
            self.sim.disconnect();
            info!("Simulator disconnected");
        }
        let effects = self.engine.lock().close_session();
        self.run_effects(effects).await;
        self.emit(EngineEvent::link(Link::Simulator, Indicator::Inactive))
            .await;
    }

    // ------------------------------------------------------------------------
    // Simulator link
    // ------------------------------------------------------------------------

    pub(crate) fn sim_connected(&self) -> bool {
        self.sim.is_connected()
    }

    pub(crate) async fn connect_sim(&self) {
        if let Err(e) = self.sim.connect(self.sim_updates.clone()) {
            let err = EngineError::from(e);
            warn!("{}", err);
            self.emit(EngineEvent::warning(err.to_string())).await;
            self.emit(EngineEvent::link(Link::Simulator, Indicator::Failed))
                .await;
            return;
        }

        let version = self.sim.version();
        self.engine.lock().set_sim_version(version);
        for name in IDENTIFICATION_VARS {
            if let Err(e) = self.sim.subscribe(&SimVariable::new(name, "")) {
                warn!("Cannot subscribe to {}: {}", name, e);
            }
        }
        info!("Simulator connected ({:?})", version);
        self.emit(EngineEvent::info(format!("Simulator connected ({version:?})")))
            .await;
        self.emit(EngineEvent::link(Link::Simulator, Indicator::Ok))
            .await;
    }

    // ------------------------------------------------------------------------
    // Activation and resolution
    // ------------------------------------------------------------------------

    fn spawn_activation(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.activate().await;
        });
    }

    async fn activate(self: Arc<Self>) {
        let _serial = self.activation.lock().await;
        let plan = self.engine.lock().activation_plan();
        if plan.is_empty() {
            debug!("Nothing to activate");
            return;
        }
        self.run_effects(plan).await;
    }

    fn schedule_resolution(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        let scheduled = self.resolution.schedule(
            self.config.resolution_delay(),
            &self.shutdown,
            move || inner.resolve_preset(),
        );
        if scheduled {
            debug!(
                "Preset resolution in {:?}",
                self.config.resolution_delay()
            );
        } else {
            debug!("Preset resolution already pending");
        }
    }

    async fn resolve_preset(self: Arc<Self>) {
        let (resolution, aircraft) = {
            let engine = self.engine.lock();
            (engine.resolve(), engine.aircraft_label())
        };
        debug!("Resolution for {}: {:?}", aircraft, resolution);

        let resolution = match resolution {
            Resolution::Ambiguous(ids) => {
                let candidates = self.engine.lock().library().names(&ids);
                let err = EngineError::AmbiguousPreset {
                    candidates: candidates.clone(),
                };
                info!("{}", err);
                self.emit(EngineEvent::info(err.to_string())).await;
                let pick = self.ask_operator(aircraft, candidates).await;
                Resolution::Ambiguous(ids).with_choice(pick)
            }
            other => other,
        };

        let effects = self.engine.lock().apply_resolution(resolution);
        self.run_effects(effects).await;
    }

    async fn ask_operator(&self, aircraft: String, candidates: Vec<String>) -> Option<usize> {
        let (reply, answer) = oneshot::channel();
        let request = PresetChoiceRequest {
            aircraft,
            candidates,
            reply,
        };
        if self.choices.send(request).await.is_err() {
            warn!("No operator to choose a preset");
            return None;
        }
        tokio::select! {
            _ = self.shutdown.cancelled() => None,
            answer = answer => answer.ok().flatten(),
        }
    }
}

async fn run_device_reader(
    inner: Arc<BridgeInner>,
    id: u64,
    mut reader: DeviceReader<ReadHalf<BoxedDeviceIo>>,
    cancel: CancellationToken,
) {
    info!("Starting panel read loop on {}", reader.port_name());
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = reader.next_line() => line,
        };
        match line {
            Ok(Some(line)) => inner.handle_device_line(line).await,
            Ok(None) => {
                let closed = io::Error::new(ErrorKind::UnexpectedEof, "panel closed the link");
                inner.device_lost(id, EngineError::Transport(closed)).await;
                break;
            }
            Err(e) => {
                inner.device_lost(id, EngineError::Transport(e)).await;
                break;
            }
        }
    }
    info!("Panel read loop ended on {}", reader.port_name());
}

async fn run_device_writer(
    inner: Arc<BridgeInner>,
    id: u64,
    io: WriteHalf<BoxedDeviceIo>,
    lines: mpsc::Receiver<String>,
    cancel: CancellationToken,
) {
    if let Err(e) = write_lines(io, lines, &inner.events, &cancel).await {
        inner.device_lost(id, EngineError::Transport(e)).await;
    }
}

async fn run_sim_dispatcher(inner: Arc<BridgeInner>, mut updates: mpsc::Receiver<SimUpdate>) {
    loop {
        let update = tokio::select! {
            _ = inner.shutdown.cancelled() => break,
            update = updates.recv() => update,
        };
        let Some(update) = update else {
            break;
        };
        let effects =
            inner
                .engine
                .lock()
                .handle_sim_value(&update.variable, &update.value, Instant::now());
        inner.run_effects(effects).await;
    }
    debug!("Simulator dispatcher stopped");
}

impl BridgeInner {
    pub(crate) async fn supervise_once(self: &Arc<Self>) {
        let _serial = self.supervising.lock().await;
        crate::supervisor::supervise_once(self).await;
    }
}
