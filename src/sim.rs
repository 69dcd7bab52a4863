//! Simulated peripherals
//!
//! A register-level model of the timer, the three DMA streams and the
//! output pin. Each [`SimulatedPeripherals::tick`] plays one timer period
//! and reports the interrupts it raised, so the engine can be driven
//! without hardware. Every call made by the engine is recorded, and the
//! pin's high time is captured per bit period.

use alloc::vec::Vec;

use heapless::Vec as TraceVec;

use crate::engine::{EngineEvent, EngineState};
use crate::hal::{Peripherals, Stream};
use crate::shared::EngineCell;
use crate::timing::BitTiming;

/// Number of register operations kept in the trace
pub const TRACE_CAPACITY: usize = 256;

/// Register operation recorded by the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOp {
    Configure,
    SetDataSource(usize),
    ClearStreamFlags(Stream),
    SetTransferCount(Stream, u16),
    EnableStream(Stream),
    DisableStream(Stream),
    EnableRequest(Stream),
    DisableRequest(Stream),
    ClearTimerFlags,
    ClearUpdateFlag,
    SetCounter(u16),
    StartTimer,
    StopTimer,
    EnableUpdateInterrupt,
    DisableUpdateInterrupt,
}

#[derive(Debug, Clone, Copy, Default)]
struct StreamState {
    enabled: bool,
    requested: bool,
    remaining: u16,
}

impl StreamState {
    const fn armed(&self) -> bool {
        self.enabled && self.requested && self.remaining > 0
    }
}

/// Simulated timer + DMA + GPIO
#[derive(Debug, Default)]
pub struct SimulatedPeripherals {
    timing: BitTiming,
    configured: bool,
    /// Copy of the data source, as the DMA would read it
    frame: Vec<u8>,
    position: usize,
    streams: [StreamState; 3],
    running: bool,
    counter: u16,
    update_interrupt: bool,
    pin: bool,
    pulses: Vec<u16>,
    trace: TraceVec<RegisterOp, TRACE_CAPACITY>,
}

impl SimulatedPeripherals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Play one timer period and return the interrupts it raised
    ///
    /// A counter sitting at the reload value overflows on the first tick, so
    /// the period opens with the update event and both compare events follow.
    /// Any other counter value first counts up to the reload value: compare
    /// events still fire on the way, but the update event (and the "high"
    /// stream) only arrives with the next period.
    pub fn tick(&mut self) -> TraceVec<EngineEvent, 2> {
        let mut events = TraceVec::new();
        if !self.running {
            return events;
        }

        let reload = self.timing.reload();
        let update = self.counter >= reload;
        let start = if update { 0 } else { self.counter };

        if update && self.update_interrupt {
            let _ = events.push(EngineEvent::TimerOverflow);
        }

        let mut high_ticks = None;
        if update && self.stream(Stream::Set).armed() {
            self.transfer(Stream::Set);
            self.pin = true;
            high_ticks = Some(self.timing.period_ticks);
        }

        if start <= self.timing.zero_high_ticks && self.stream(Stream::Data).armed() {
            self.transfer(Stream::Data);
            let bit = self.frame.get(self.position).copied().unwrap_or(0);
            self.position += 1;
            self.pin = bit & 1 != 0;
            if !self.pin && high_ticks.is_some() {
                high_ticks = Some(self.timing.zero_high_ticks);
            }
        }

        if start <= self.timing.one_high_ticks && self.stream(Stream::Reset).armed() {
            self.transfer(Stream::Reset);
            if self.pin && high_ticks == Some(self.timing.period_ticks) {
                high_ticks = Some(self.timing.one_high_ticks);
            }
            self.pin = false;
            if self.stream(Stream::Reset).remaining == 0 {
                let _ = events.push(EngineEvent::TransferComplete);
            }
        }

        if let Some(ticks) = high_ticks {
            self.pulses.push(ticks);
        }
        self.counter = reload;
        events
    }

    /// Number of frame bytes the data stream has written so far
    pub const fn bytes_read(&self) -> usize {
        self.position
    }

    /// High time, in timer ticks, of every bit period seen so far
    pub fn pulses(&self) -> &[u16] {
        &self.pulses
    }

    /// Decode the recorded pulses back into bytes, MSB first
    ///
    /// A pulse longer than the `0` high time is a `1` bit. Trailing bits
    /// that do not fill a byte are dropped.
    pub fn received_bytes(&self) -> Vec<u8> {
        self.pulses
            .chunks_exact(8)
            .map(|bits| {
                bits.iter().fold(0u8, |byte, &ticks| {
                    (byte << 1) | u8::from(ticks > self.timing.zero_high_ticks)
                })
            })
            .collect()
    }

    pub fn clear_pulses(&mut self) {
        self.pulses.clear();
    }

    pub fn trace(&self) -> &[RegisterOp] {
        &self.trace
    }

    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }

    pub const fn is_configured(&self) -> bool {
        self.configured
    }

    pub const fn is_running(&self) -> bool {
        self.running
    }

    pub const fn update_interrupt_enabled(&self) -> bool {
        self.update_interrupt
    }

    pub const fn counter(&self) -> u16 {
        self.counter
    }

    pub const fn pin(&self) -> bool {
        self.pin
    }

    /// Whether `stream` is enabled or its timer request is still on
    pub fn is_stream_active(&self, stream: Stream) -> bool {
        let state = self.stream(stream);
        state.enabled || state.requested
    }

    fn record(&mut self, op: RegisterOp) {
        // Full trace keeps the oldest entries
        let _ = self.trace.push(op);
    }

    const fn index(stream: Stream) -> usize {
        match stream {
            Stream::Set => 0,
            Stream::Data => 1,
            Stream::Reset => 2,
        }
    }

    fn stream(&self, stream: Stream) -> &StreamState {
        &self.streams[Self::index(stream)]
    }

    fn stream_mut(&mut self, stream: Stream) -> &mut StreamState {
        &mut self.streams[Self::index(stream)]
    }

    fn transfer(&mut self, stream: Stream) {
        let state = self.stream_mut(stream);
        state.remaining = state.remaining.saturating_sub(1);
    }
}

impl Peripherals for SimulatedPeripherals {
    fn configure(&mut self, timing: &BitTiming) {
        self.timing = *timing;
        self.configured = true;
        self.record(RegisterOp::Configure);
    }

    fn set_data_source(&mut self, frame: &[u8]) {
        self.frame.clear();
        self.frame.extend_from_slice(frame);
        self.position = 0;
        self.record(RegisterOp::SetDataSource(frame.len()));
    }

    fn clear_stream_flags(&mut self, stream: Stream) {
        self.record(RegisterOp::ClearStreamFlags(stream));
    }

    fn set_transfer_count(&mut self, stream: Stream, count: u16) {
        self.stream_mut(stream).remaining = count;
        self.record(RegisterOp::SetTransferCount(stream, count));
    }

    fn enable_stream(&mut self, stream: Stream) {
        self.stream_mut(stream).enabled = true;
        self.record(RegisterOp::EnableStream(stream));
    }

    fn disable_stream(&mut self, stream: Stream) {
        self.stream_mut(stream).enabled = false;
        self.record(RegisterOp::DisableStream(stream));
    }

    fn enable_request(&mut self, stream: Stream) {
        self.stream_mut(stream).requested = true;
        self.record(RegisterOp::EnableRequest(stream));
    }

    fn disable_request(&mut self, stream: Stream) {
        self.stream_mut(stream).requested = false;
        self.record(RegisterOp::DisableRequest(stream));
    }

    fn clear_timer_flags(&mut self) {
        self.record(RegisterOp::ClearTimerFlags);
    }

    fn clear_update_flag(&mut self) {
        self.record(RegisterOp::ClearUpdateFlag);
    }

    fn set_counter(&mut self, value: u16) {
        self.counter = value;
        self.record(RegisterOp::SetCounter(value));
    }

    fn start_timer(&mut self) {
        self.running = true;
        self.record(RegisterOp::StartTimer);
    }

    fn stop_timer(&mut self) {
        self.running = false;
        self.record(RegisterOp::StopTimer);
    }

    fn enable_update_interrupt(&mut self) {
        self.update_interrupt = true;
        self.record(RegisterOp::EnableUpdateInterrupt);
    }

    fn disable_update_interrupt(&mut self) {
        self.update_interrupt = false;
        self.record(RegisterOp::DisableUpdateInterrupt);
    }
}

/// Play one timer period and deliver its interrupts to the engine
pub fn step(cell: &EngineCell<SimulatedPeripherals>) -> EngineState {
    let events = cell.with(|engine| engine.peripherals_mut().tick());
    let mut state = cell.state();
    for event in events {
        state = cell.post(event);
    }
    state
}

/// Step until the engine is idle again
///
/// Returns the number of timer periods played, or `None` if the engine
/// was still busy after `max_ticks`.
pub fn run_until_idle(cell: &EngineCell<SimulatedPeripherals>, max_ticks: usize) -> Option<usize> {
    for ticks in 1..=max_ticks {
        if step(cell) == EngineState::Idle {
            return Some(ticks);
        }
    }
    None
}
