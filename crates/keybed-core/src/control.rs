//! The serialized control context that owns the [`KeyboardModel`].
//!
//! Other threads never touch the model directly. They hold a
//! [`ControlHandle`] and enqueue [`ControlCommand`]s, which either a
//! dedicated thread ([`ThreadContext`]) or the caller's own thread
//! ([`ManualContext`]) applies in order.
//!
//! The queue itself never refuses local commands, so a gesture's release
//! cannot be lost. Only raw device input, which arrives on the OS MIDI
//! thread, is held to the configured capacity.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use keybed_layout::KeyIndex;
use keybed_midi::{InboundSink, Pedal, PortId};
use smallvec::SmallVec;
use thiserror::Error;
use tracing::{debug, warn};

use crate::mirror::PressMirror;
use crate::model::{KeyboardModel, PedalState};

/// Work item for the control context.
#[derive(Debug)]
pub enum ControlCommand {
    /// Raw bytes received on an input port.
    Inbound {
        port: PortId,
        bytes: SmallVec<[u8; 3]>,
    },
    SetPressed {
        key: KeyIndex,
        pressed: bool,
    },
    GlissandoTo(KeyIndex),
    EndGlissando,
    SetPedal {
        pedal: Pedal,
        on: bool,
    },
    DestinationsChanged(Vec<PortId>),
    SubscribeKey {
        key: KeyIndex,
        sender: Sender<bool>,
    },
    SubscribePedals(Sender<PedalState>),
    /// All notes off.
    Reset,
    /// Stop the context; later commands are discarded.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("control queue is full")]
    Full,
    #[error("control context has shut down")]
    Closed,
}

impl KeyboardModel {
    /// Apply one command. Returns `false` once the context should stop.
    pub fn apply(&mut self, command: ControlCommand) -> bool {
        match command {
            ControlCommand::Inbound { port, bytes } => self.receive(port, &bytes),
            ControlCommand::SetPressed { key, pressed } => {
                self.set_pressed(key, pressed);
            }
            ControlCommand::GlissandoTo(key) => self.glissando_to(key),
            ControlCommand::EndGlissando => self.end_glissando(),
            ControlCommand::SetPedal { pedal, on } => {
                self.set_pedal(pedal, on);
            }
            ControlCommand::DestinationsChanged(destinations) => {
                self.set_destinations(destinations)
            }
            ControlCommand::SubscribeKey { key, sender } => self.register_key_watcher(key, sender),
            ControlCommand::SubscribePedals(sender) => self.register_pedal_watcher(sender),
            ControlCommand::Reset => self.reset(),
            ControlCommand::Shutdown => return false,
        }
        true
    }
}

/// Count of queued device messages, shared by handles and the context.
#[derive(Debug)]
struct InboundBudget {
    capacity: usize,
    pending: AtomicUsize,
}

impl InboundBudget {
    fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            pending: AtomicUsize::new(0),
        })
    }

    fn try_acquire(&self) -> bool {
        if self.capacity == 0 {
            return true;
        }
        let previous = self.pending.fetch_add(1, Ordering::AcqRel);
        if previous >= self.capacity {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return false;
        }
        true
    }

    /// Saturates at zero: `Inbound` commands may also arrive through
    /// [`ControlHandle::submit`], which takes no slot.
    fn release(&self) {
        if self.capacity != 0 {
            let _ = self
                .pending
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        }
    }
}

/// Apply one command on behalf of a context, returning its budget slot.
fn run_command(
    model: &mut KeyboardModel,
    budget: &InboundBudget,
    command: ControlCommand,
) -> bool {
    if matches!(command, ControlCommand::Inbound { .. }) {
        budget.release();
    }
    model.apply(command)
}

/// Queue feeding a control context, created before the context so that
/// transports can be wired to a handle first.
pub struct ControlQueue {
    tx: Sender<ControlCommand>,
    rx: Receiver<ControlCommand>,
    mirror: PressMirror,
    budget: Arc<InboundBudget>,
}

impl ControlQueue {
    /// `capacity` bounds how many device messages may wait at once; 0
    /// leaves them unbounded. Local commands are always accepted.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx,
            rx,
            mirror: PressMirror::default(),
            budget: InboundBudget::new(capacity),
        }
    }

    pub fn handle(&self) -> ControlHandle {
        ControlHandle {
            tx: self.tx.clone(),
            mirror: self.mirror.clone(),
            budget: Arc::clone(&self.budget),
        }
    }
}

/// Cheap, cloneable way into the control context.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: Sender<ControlCommand>,
    mirror: PressMirror,
    budget: Arc<InboundBudget>,
}

impl ControlHandle {
    /// Queue a command. Fails only once the context has shut down.
    pub fn submit(&self, command: ControlCommand) -> Result<(), ControlError> {
        self.tx.send(command).map_err(|_| ControlError::Closed)
    }

    /// Queue device input, refusing it while the inbound budget is spent.
    fn submit_inbound(&self, port: PortId, bytes: &[u8]) -> Result<(), ControlError> {
        if !self.budget.try_acquire() {
            return Err(ControlError::Full);
        }
        let command = ControlCommand::Inbound {
            port,
            bytes: SmallVec::from_slice(bytes),
        };
        self.submit(command).inspect_err(|_| self.budget.release())
    }

    pub fn set_pressed(&self, key: KeyIndex, pressed: bool) -> Result<(), ControlError> {
        self.submit(ControlCommand::SetPressed { key, pressed })
    }

    pub fn glissando_to(&self, key: KeyIndex) -> Result<(), ControlError> {
        self.submit(ControlCommand::GlissandoTo(key))
    }

    pub fn end_glissando(&self) -> Result<(), ControlError> {
        self.submit(ControlCommand::EndGlissando)
    }

    pub fn set_pedal(&self, pedal: Pedal, on: bool) -> Result<(), ControlError> {
        self.submit(ControlCommand::SetPedal { pedal, on })
    }

    pub fn reset(&self) -> Result<(), ControlError> {
        self.submit(ControlCommand::Reset)
    }

    /// Subscribe to one key. The current state is delivered first, once the
    /// context has processed the request.
    pub fn subscribe_key(&self, key: KeyIndex) -> Result<Receiver<bool>, ControlError> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.submit(ControlCommand::SubscribeKey { key, sender })?;
        Ok(receiver)
    }

    pub fn subscribe_pedals(&self) -> Result<Receiver<PedalState>, ControlError> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.submit(ControlCommand::SubscribePedals(sender))?;
        Ok(receiver)
    }

    /// Lock-free read of the last state the model published.
    pub fn is_pressed(&self, key: KeyIndex) -> bool {
        self.mirror.is_pressed(key)
    }

    pub fn pedals(&self) -> PedalState {
        self.mirror.pedals()
    }

    pub fn mirror(&self) -> &PressMirror {
        &self.mirror
    }
}

impl InboundSink for ControlHandle {
    fn message_received(&self, port: PortId, bytes: &[u8]) {
        if let Err(err) = self.submit_inbound(port, bytes) {
            warn!(%err, %port, "dropping inbound MIDI message");
        }
    }

    fn destinations_changed(&self, destinations: Vec<PortId>) {
        if let Err(err) = self.submit(ControlCommand::DestinationsChanged(destinations)) {
            warn!(%err, "dropping MIDI destination update");
        }
    }
}

/// Runs the model on a dedicated thread.
pub struct ThreadContext {
    tx: Sender<ControlCommand>,
    thread: Option<thread::JoinHandle<KeyboardModel>>,
}

impl ThreadContext {
    pub fn spawn(queue: ControlQueue, mut model: KeyboardModel) -> anyhow::Result<Self> {
        let ControlQueue {
            tx,
            rx,
            mirror,
            budget,
        } = queue;
        model.attach_mirror(mirror);
        let thread = thread::Builder::new()
            .name("keybed-control".into())
            .spawn(move || {
                for command in rx.iter() {
                    if !run_command(&mut model, &budget, command) {
                        break;
                    }
                }
                debug!("control context stopped");
                model
            })?;
        Ok(Self {
            tx,
            thread: Some(thread),
        })
    }

    /// Stop after every command queued so far and hand the model back.
    pub fn shutdown(mut self) -> Option<KeyboardModel> {
        self.stop()
    }

    fn stop(&mut self) -> Option<KeyboardModel> {
        let thread = self.thread.take()?;
        let _ = self.tx.send(ControlCommand::Shutdown);
        match thread.join() {
            Ok(model) => Some(model),
            Err(_) => {
                warn!("control thread panicked");
                None
            }
        }
    }
}

impl Drop for ThreadContext {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs queued commands on the caller's thread, on demand.
pub struct ManualContext {
    rx: Receiver<ControlCommand>,
    budget: Arc<InboundBudget>,
    model: KeyboardModel,
    stopped: bool,
}

impl ManualContext {
    pub fn new(queue: ControlQueue, mut model: KeyboardModel) -> Self {
        let ControlQueue {
            rx, mirror, budget, ..
        } = queue;
        model.attach_mirror(mirror);
        Self {
            rx,
            budget,
            model,
            stopped: false,
        }
    }

    /// Apply every queued command. Returns how many were applied.
    pub fn run_pending(&mut self) -> usize {
        let mut applied = 0;
        while !self.stopped {
            let Ok(command) = self.rx.try_recv() else {
                break;
            };
            self.stopped = !run_command(&mut self.model, &self.budget, command);
            applied += 1;
        }
        applied
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn model(&self) -> &KeyboardModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut KeyboardModel {
        &mut self.model
    }

    pub fn into_model(self) -> KeyboardModel {
        self.model
    }
}
