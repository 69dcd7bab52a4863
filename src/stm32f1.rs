//! STM32F1 timer + DMA peripherals
//!
//! TIM2 paces the bits. DMA1 channel 2 (TIM2 update), channel 5 (TIM2
//! compare 1) and channel 7 (TIM2 compare 2) write to the GPIOA output data
//! register, and the strip data line is PA0. Channel 7's transfer-complete
//! interrupt ends the frame, TIM2's update interrupt counts the latch.
//!
//! Every bit rewrites the low byte of GPIOA ODR, so PA1..PA7 cannot be
//! driven as outputs by other code.
//!
//! # Wiring
//!
//! Enable the `rt` feature for the interrupt attribute.
//!
//! ```ignore
//! use myrtio_ws2812_dma::stm32f1::{Stm32f1Peripherals, pac::interrupt};
//! use myrtio_ws2812_dma::{EngineCell, EngineConfig, EngineEvent, Strip, StripType};
//!
//! // TIM2, DMA1 channels 2/5/7 and PA0..PA7 are not used anywhere else
//! static ENGINE: EngineCell<Stm32f1Peripherals> =
//!     EngineCell::new(unsafe { Stm32f1Peripherals::new() }, EngineConfig::DEFAULT);
//!
//! #[interrupt]
//! fn DMA1_CHANNEL7() {
//!     ENGINE.post(EngineEvent::TransferComplete);
//! }
//!
//! #[interrupt]
//! fn TIM2() {
//!     ENGINE.post(EngineEvent::TimerOverflow);
//! }
//!
//! #[cortex_m_rt::entry]
//! fn main() -> ! {
//!     let mut strip = Strip::new(30, StripType::GRB | StripType::KHZ800, &ENGINE);
//!     strip.begin();
//!     loop {
//!         strip.set_pixel_color(0, 255, 0, 0);
//!         strip.show().ok();
//!         strip.wait_ready();
//!     }
//! }
//! ```

use core::ptr;

use cortex_m::peripheral::NVIC;

pub use stm32f1::stm32f103 as pac;

use pac::{DMA1, GPIOA, Interrupt, RCC, TIM2};

use crate::hal::{Peripherals, Stream};
use crate::timing::BitTiming;

/// Word read by the "high" stream; the DMA only takes its low byte
static LEVEL_HIGH: u16 = 0xFFFF;
/// Word read by the "low" stream
static LEVEL_LOW: u16 = 0x0000;

// DMA channel configuration register bits
const CCR_EN: u32 = 1 << 0;
const CCR_TCIE: u32 = 1 << 1;
const CCR_DIR_FROM_MEMORY: u32 = 1 << 4;
const CCR_MINC: u32 = 1 << 7;
const CCR_PSIZE_32: u32 = 0b10 << 8;
const CCR_PL_HIGH: u32 = 0b10 << 12;

/// Memory bytes to the 32-bit ODR, no memory increment
const CCR_LEVEL: u32 = CCR_PL_HIGH | CCR_PSIZE_32 | CCR_DIR_FROM_MEMORY;

/// Output compare 1 frozen, output compare 2 in PWM mode 1, no preload
const CCMR1_COMPARE: u32 = 0b110 << 12;

/// PA0 as 50 MHz push-pull output (MODE = 11, CNF = 00)
const CRL_PA0_MASK: u32 = 0xF;
const CRL_PA0_OUTPUT: u32 = 0b0011;

// STM32F1 implements the upper four priority bits
const DMA_PRIORITY: u8 = 1 << 4;
const TIMER_PRIORITY: u8 = 2 << 4;

/// TIM2 + DMA1 + GPIOA on STM32F103
pub struct Stm32f1Peripherals {
    _private: (),
}

impl Stm32f1Peripherals {
    /// Create the driver without taking the PAC singletons
    ///
    /// Usable in a `static` initializer.
    ///
    /// # Safety
    ///
    /// TIM2, DMA1 channels 2, 5 and 7 and pins PA0..PA7 must not be used by
    /// any other code.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }

    /// Create the driver from the owned PAC peripherals
    #[allow(clippy::needless_pass_by_value)]
    pub fn from_parts(_tim: TIM2, _dma: DMA1, _gpio: GPIOA) -> Self {
        Self { _private: () }
    }

    fn tim() -> &'static pac::tim2::RegisterBlock {
        // SAFETY: TIM2 is owned by this driver
        unsafe { &*TIM2::ptr() }
    }

    fn dma() -> &'static pac::dma1::RegisterBlock {
        // SAFETY: channels 2, 5 and 7 are owned by this driver, the shared
        // flag clear register is write-one-to-clear
        unsafe { &*DMA1::ptr() }
    }

    fn gpio() -> &'static pac::gpioa::RegisterBlock {
        // SAFETY: PA0..PA7 are owned by this driver
        unsafe { &*GPIOA::ptr() }
    }

    fn channel(stream: Stream) -> &'static pac::dma1::CH {
        let dma = Self::dma();
        match stream {
            Stream::Set => &dma.ch2,
            Stream::Data => &dma.ch5,
            Stream::Reset => &dma.ch7,
        }
    }

    const fn channel_number(stream: Stream) -> u32 {
        match stream {
            Stream::Set => 2,
            Stream::Data => 5,
            Stream::Reset => 7,
        }
    }

    fn enable_clocks() {
        // SAFETY: read-modify-write of clock enable bits, called from the
        // engine's critical section
        let rcc = unsafe { &*RCC::ptr() };
        rcc.apb2enr.modify(|_, w| w.iopaen().set_bit());
        rcc.apb1enr.modify(|_, w| w.tim2en().set_bit());
        rcc.ahbenr.modify(|_, w| w.dma1en().set_bit());
    }

    #[allow(clippy::cast_possible_truncation)]
    fn address<T>(value: &T) -> u32 {
        ptr::from_ref(value) as usize as u32
    }
}

impl Peripherals for Stm32f1Peripherals {
    fn configure(&mut self, timing: &BitTiming) {
        Self::enable_clocks();

        Self::gpio()
            .crl
            .modify(|r, w| unsafe { w.bits((r.bits() & !CRL_PA0_MASK) | CRL_PA0_OUTPUT) });

        let odr = Self::address(&Self::gpio().odr);
        let streams = [
            (Stream::Set, CCR_LEVEL),
            (Stream::Data, CCR_LEVEL | CCR_MINC),
            (Stream::Reset, CCR_LEVEL | CCR_TCIE),
        ];
        for (stream, config) in streams {
            let channel = Self::channel(stream);
            channel.cr.write(|w| unsafe { w.bits(config) });
            channel.par.write(|w| unsafe { w.bits(odr) });
        }
        Self::channel(Stream::Set)
            .mar
            .write(|w| unsafe { w.bits(Self::address(&LEVEL_HIGH)) });
        Self::channel(Stream::Reset)
            .mar
            .write(|w| unsafe { w.bits(Self::address(&LEVEL_LOW)) });

        let tim = Self::tim();
        tim.cr1.modify(|_, w| w.cen().clear_bit());
        tim.psc
            .write(|w| unsafe { w.bits(u32::from(timing.prescaler())) });
        tim.arr.write(|w| unsafe { w.bits(u32::from(timing.reload())) });
        tim.ccr1
            .write(|w| unsafe { w.bits(u32::from(timing.zero_high_ticks)) });
        tim.ccr2
            .write(|w| unsafe { w.bits(u32::from(timing.one_high_ticks)) });
        tim.ccmr1_output().write(|w| unsafe { w.bits(CCMR1_COMPARE) });
        // Latch the prescaler now instead of on the first frame's update
        tim.egr.write(|w| w.ug().set_bit());
        tim.sr.write(|w| unsafe { w.bits(0) });

        // SAFETY: only the two interrupts handled by the engine change
        unsafe {
            let mut core = cortex_m::Peripherals::steal();
            core.NVIC.set_priority(Interrupt::DMA1_CHANNEL7, DMA_PRIORITY);
            core.NVIC.set_priority(Interrupt::TIM2, TIMER_PRIORITY);
            NVIC::unmask(Interrupt::DMA1_CHANNEL7);
            NVIC::unmask(Interrupt::TIM2);
        }

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "TIM2 prescaler {} reload {}",
            timing.prescaler(),
            timing.reload()
        );
    }

    #[allow(clippy::cast_possible_truncation)]
    fn set_data_source(&mut self, frame: &[u8]) {
        let address = frame.as_ptr() as usize as u32;
        Self::channel(Stream::Data)
            .mar
            .write(|w| unsafe { w.bits(address) });
    }

    fn clear_stream_flags(&mut self, stream: Stream) {
        let shift = 4 * (Self::channel_number(stream) - 1);
        Self::dma()
            .ifcr
            .write(|w| unsafe { w.bits(0xF << shift) });
    }

    fn set_transfer_count(&mut self, stream: Stream, count: u16) {
        Self::channel(stream)
            .ndtr
            .write(|w| unsafe { w.bits(u32::from(count)) });
    }

    fn enable_stream(&mut self, stream: Stream) {
        Self::channel(stream)
            .cr
            .modify(|r, w| unsafe { w.bits(r.bits() | CCR_EN) });
    }

    fn disable_stream(&mut self, stream: Stream) {
        Self::channel(stream)
            .cr
            .modify(|r, w| unsafe { w.bits(r.bits() & !CCR_EN) });
    }

    fn enable_request(&mut self, stream: Stream) {
        Self::tim().dier.modify(|_, w| match stream {
            Stream::Set => w.ude().set_bit(),
            Stream::Data => w.cc1de().set_bit(),
            Stream::Reset => w.cc2de().set_bit(),
        });
    }

    fn disable_request(&mut self, stream: Stream) {
        Self::tim().dier.modify(|_, w| match stream {
            Stream::Set => w.ude().clear_bit(),
            Stream::Data => w.cc1de().clear_bit(),
            Stream::Reset => w.cc2de().clear_bit(),
        });
    }

    fn clear_timer_flags(&mut self) {
        Self::tim().sr.write(|w| unsafe { w.bits(0) });
    }

    fn clear_update_flag(&mut self) {
        Self::tim().sr.modify(|_, w| w.uif().clear_bit());
    }

    fn set_counter(&mut self, value: u16) {
        Self::tim()
            .cnt
            .write(|w| unsafe { w.bits(u32::from(value)) });
    }

    fn start_timer(&mut self) {
        Self::tim().cr1.modify(|_, w| w.cen().set_bit());
    }

    fn stop_timer(&mut self) {
        Self::tim().cr1.modify(|_, w| w.cen().clear_bit());
    }

    fn enable_update_interrupt(&mut self) {
        Self::tim().dier.modify(|_, w| w.uie().set_bit());
    }

    fn disable_update_interrupt(&mut self) {
        Self::tim().dier.modify(|_, w| w.uie().clear_bit());
    }
}
