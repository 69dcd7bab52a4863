//! Engine shared between the application and interrupt handlers
//!
//! The engine lives behind a `critical-section` mutex. Interrupt handlers
//! post [`EngineEvent`]s, the application arms frames through
//! [`Transmitter`]. The ready flag is mirrored in an atomic so polling it
//! never takes a critical section.
//!
//! See the `stm32f1` module for the interrupt handler wiring.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;

use crate::Transmitter;
use crate::engine::{Engine, EngineEvent, EngineState, SendError};
use crate::hal::Peripherals;
use crate::timing::EngineConfig;

/// Interrupt-safe home for an [`Engine`]
pub struct EngineCell<P: Peripherals> {
    engine: Mutex<RefCell<Engine<P>>>,
    ready: AtomicBool,
}

impl<P: Peripherals> EngineCell<P> {
    pub const fn new(peripherals: P, config: EngineConfig) -> Self {
        Self {
            engine: Mutex::new(RefCell::new(Engine::new(peripherals, config))),
            ready: AtomicBool::new(true),
        }
    }

    /// Deliver an interrupt to the state machine
    ///
    /// Call this from the DMA transfer-complete and timer update handlers.
    pub fn post(&self, event: EngineEvent) -> EngineState {
        critical_section::with(|cs| {
            let state = self.engine.borrow(cs).borrow_mut().handle(event);
            self.ready
                .store(state == EngineState::Idle, Ordering::Release);
            state
        })
    }

    /// Completion flag: no frame is being sent or latched
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Busy-wait until the previous frame has latched
    ///
    /// Never returns if the completion interrupt does not arrive.
    pub fn wait_ready(&self) {
        while !self.is_ready() {
            core::hint::spin_loop();
        }
    }

    pub fn state(&self) -> EngineState {
        self.with(|engine| engine.state())
    }

    /// Run a closure with exclusive access to the engine
    pub fn with<R>(&self, f: impl FnOnce(&mut Engine<P>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.engine.borrow(cs).borrow_mut()))
    }
}

impl<P: Peripherals> Transmitter for &EngineCell<P> {
    fn init(&mut self, frame: &[u8]) {
        self.with(|engine| engine.init(frame));
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), SendError> {
        critical_section::with(|cs| {
            let mut engine = self.engine.borrow(cs).borrow_mut();
            engine.send(frame)?;
            self.ready
                .store(engine.state() == EngineState::Idle, Ordering::Release);
            Ok(())
        })
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}
