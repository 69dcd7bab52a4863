mod tests {
    use myrtio_ws2812_dma::sim::{RegisterOp, SimulatedPeripherals, run_until_idle, step};
    use myrtio_ws2812_dma::{
        BitTiming, Engine, EngineCell, EngineConfig, EngineEvent, EngineState, Peripherals,
        SendError, Stream, Transmitter,
    };

    fn engine() -> Engine<SimulatedPeripherals> {
        Engine::new(SimulatedPeripherals::new(), EngineConfig::default())
    }

    /// Tick the simulation until the engine reaches `target`
    fn drive_until(engine: &mut Engine<SimulatedPeripherals>, target: EngineState) -> usize {
        for ticks in 1..=10_000 {
            let events = engine.peripherals_mut().tick();
            for event in events {
                engine.handle(event);
            }
            if engine.state() == target {
                return ticks;
            }
        }
        panic!("engine never reached {target:?}");
    }

    fn position(trace: &[RegisterOp], op: RegisterOp) -> usize {
        trace
            .iter()
            .position(|&recorded| recorded == op)
            .unwrap_or_else(|| panic!("{op:?} not in trace"))
    }

    #[test]
    fn test_send_enters_transmitting() {
        let mut engine = engine();
        assert_eq!(engine.state(), EngineState::Idle);

        let frame = [1u8, 0, 1, 0];
        assert_eq!(engine.send(&frame), Ok(()));
        assert_eq!(engine.state(), EngineState::Transmitting);
        assert!(engine.peripherals().is_running());

        let view = engine.in_flight().expect("frame in flight");
        assert_eq!(view.len, 4);
        assert_eq!(view.address, frame.as_ptr() as usize);
    }

    #[test]
    fn test_send_arms_in_order() {
        let mut engine = engine();
        engine.send(&[0u8; 24]).unwrap();
        let trace = engine.peripherals().trace();

        for stream in [Stream::Set, Stream::Data, Stream::Reset] {
            assert!(trace.contains(&RegisterOp::SetTransferCount(stream, 24)));
            let cleared = position(trace, RegisterOp::ClearStreamFlags(stream));
            let enabled = position(trace, RegisterOp::EnableStream(stream));
            assert!(cleared < enabled);
        }

        // Data stream is enabled before the reset stream
        assert!(
            position(trace, RegisterOp::EnableStream(Stream::Data))
                < position(trace, RegisterOp::EnableStream(Stream::Reset))
        );

        // Every stream is enabled before any request line
        let last_stream = position(trace, RegisterOp::EnableStream(Stream::Reset));
        for stream in [Stream::Set, Stream::Data, Stream::Reset] {
            assert!(position(trace, RegisterOp::EnableRequest(stream)) > last_stream);
        }

        // Counter is preloaded with the reload value, timer starts last
        let start = position(trace, RegisterOp::StartTimer);
        assert_eq!(start, trace.len() - 1);
        assert_eq!(trace[start - 1], RegisterOp::SetCounter(29));
    }

    #[test]
    fn test_configures_once() {
        let mut engine = engine();
        engine.init(&[]);
        assert!(engine.is_configured());
        engine.send(&[1u8; 8]).unwrap();
        drive_until(&mut engine, EngineState::Idle);
        engine.send(&[1u8; 8]).unwrap();

        let configures = engine
            .peripherals()
            .trace()
            .iter()
            .filter(|&&op| op == RegisterOp::Configure)
            .count();
        assert_eq!(configures, 1);
    }

    #[test]
    fn test_init_keeps_source_while_busy() {
        let mut engine = engine();
        engine.send(&[1u8; 8]).unwrap();
        engine.peripherals_mut().clear_trace();

        engine.init(&[0u8; 8]);
        let repointed = engine
            .peripherals()
            .trace()
            .iter()
            .any(|op| matches!(op, RegisterOp::SetDataSource(_)));
        assert!(!repointed);

        drive_until(&mut engine, EngineState::Idle);
        assert_eq!(engine.peripherals().received_bytes(), vec![255]);

        engine.init(&[0u8; 16]);
        assert!(
            engine
                .peripherals()
                .trace()
                .contains(&RegisterOp::SetDataSource(16))
        );
    }

    #[test]
    fn test_invalid_timing_is_rejected() {
        let config = EngineConfig {
            timing: BitTiming {
                one_high_ticks: 30,
                ..BitTiming::DEFAULT
            },
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(SimulatedPeripherals::new(), config);

        engine.init(&[0u8; 8]);
        assert!(!engine.is_configured());
        assert_eq!(engine.send(&[1u8; 8]), Err(SendError::InvalidTiming));
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.peripherals().trace().is_empty());
    }

    #[test]
    fn test_preloaded_counter_starts_on_first_tick() {
        let mut engine = engine();
        engine.send(&[1u8; 8]).unwrap();
        assert_eq!(engine.peripherals().counter(), 29);

        engine.peripherals_mut().tick();
        assert_eq!(engine.peripherals().pulses(), &[17]);
        assert_eq!(engine.peripherals().bytes_read(), 1);
    }

    #[test]
    fn test_counter_without_preload_delays_update() {
        let mut hw = SimulatedPeripherals::new();
        hw.configure(&BitTiming::DEFAULT);
        let frame = [1u8; 8];
        hw.set_data_source(&frame);
        for stream in Stream::ARM_ORDER {
            hw.set_transfer_count(stream, 8);
            hw.enable_stream(stream);
        }
        for stream in Stream::REQUEST_ORDER {
            hw.enable_request(stream);
        }
        hw.start_timer();
        assert_eq!(hw.counter(), 0);

        // Compares fire before the first update: a byte is lost, no pulse
        assert!(hw.tick().is_empty());
        assert!(hw.pulses().is_empty());
        assert_eq!(hw.bytes_read(), 1);
        assert_eq!(hw.counter(), 29);

        hw.tick();
        assert_eq!(hw.pulses(), &[17]);
        assert_eq!(hw.bytes_read(), 2);
    }

    #[test]
    fn test_send_configures_lazily() {
        let mut engine = engine();
        assert!(!engine.peripherals().is_configured());
        engine.send(&[0u8; 8]).unwrap();
        assert!(engine.peripherals().is_configured());
    }

    #[test]
    fn test_empty_frame_is_noop() {
        let mut engine = engine();
        assert_eq!(engine.send(&[]), Ok(()));
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.peripherals().trace().is_empty());
        assert!(engine.in_flight().is_none());
    }

    #[test]
    fn test_frame_too_long() {
        let mut engine = engine();
        let frame = vec![0u8; usize::from(u16::MAX) + 1];
        assert_eq!(engine.send(&frame), Err(SendError::TooLong));
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn test_send_while_busy_is_rejected() {
        let mut engine = engine();
        engine.send(&[1u8; 24]).unwrap();
        assert_eq!(engine.send(&[1u8; 24]), Err(SendError::Busy));

        drive_until(&mut engine, EngineState::DeadTime);
        assert_eq!(engine.send(&[1u8; 24]), Err(SendError::Busy));
    }

    #[test]
    fn test_transfer_complete_starts_dead_time() {
        let mut engine = engine();
        engine.send(&[1u8; 16]).unwrap();

        let ticks = drive_until(&mut engine, EngineState::DeadTime);
        assert_eq!(ticks, 16);

        let hw = engine.peripherals();
        for stream in [Stream::Set, Stream::Data, Stream::Reset] {
            assert!(!hw.is_stream_active(stream));
        }
        assert!(hw.update_interrupt_enabled());
        assert!(hw.is_running());
        assert!(!hw.pin());
    }

    #[test]
    fn test_dead_time_counts_overflows() {
        let mut engine = engine();
        engine.send(&[0u8; 8]).unwrap();
        drive_until(&mut engine, EngineState::DeadTime);

        for expected in 1..=19 {
            assert_eq!(engine.handle(EngineEvent::TimerOverflow), EngineState::DeadTime);
            assert_eq!(engine.overflows(), expected);
        }
        assert_eq!(engine.handle(EngineEvent::TimerOverflow), EngineState::Idle);
        assert_eq!(engine.overflows(), 0);
        assert!(engine.in_flight().is_none());

        let hw = engine.peripherals();
        assert!(!hw.is_running());
        assert!(!hw.update_interrupt_enabled());
    }

    #[test]
    fn test_full_cycle_length() {
        let mut engine = engine();
        engine.send(&[1u8; 48]).unwrap();
        // 48 bit periods, then 20 overflows of dead time
        assert_eq!(drive_until(&mut engine, EngineState::Idle), 48 + 20);
    }

    #[test]
    fn test_custom_dead_period() {
        let config = EngineConfig {
            dead_period: 3,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(SimulatedPeripherals::new(), config);
        engine.send(&[1u8; 8]).unwrap();
        assert_eq!(drive_until(&mut engine, EngineState::Idle), 8 + 4);
    }

    #[test]
    fn test_second_send_after_idle() {
        let mut engine = engine();
        engine.send(&[1u8; 8]).unwrap();
        drive_until(&mut engine, EngineState::Idle);

        assert_eq!(engine.send(&[0u8; 8]), Ok(()));
        assert_eq!(engine.state(), EngineState::Transmitting);
    }

    #[test]
    fn test_spurious_events_are_ignored() {
        let mut engine = engine();
        assert_eq!(engine.handle(EngineEvent::TimerOverflow), EngineState::Idle);
        assert_eq!(engine.handle(EngineEvent::TransferComplete), EngineState::Idle);

        engine.send(&[1u8; 8]).unwrap();
        assert_eq!(
            engine.handle(EngineEvent::TimerOverflow),
            EngineState::Transmitting
        );
        assert_eq!(engine.overflows(), 0);
    }

    #[test]
    fn test_waveform_matches_frame() {
        let mut engine = engine();
        let frame = [1u8, 0, 1, 1, 0, 0, 1, 0, 0, 1, 1, 1, 1, 1, 1, 0];
        engine.send(&frame).unwrap();
        drive_until(&mut engine, EngineState::Idle);

        let hw = engine.peripherals();
        // One pulse per bit, nothing during the dead time
        assert_eq!(hw.pulses().len(), frame.len());
        for (&bit, &ticks) in frame.iter().zip(hw.pulses()) {
            assert_eq!(ticks, if bit == 1 { 17 } else { 8 });
        }
        assert_eq!(hw.received_bytes(), vec![0b1011_0010, 0b0111_1110]);
    }

    #[test]
    fn test_cell_ready_flag() {
        let cell = EngineCell::new(SimulatedPeripherals::new(), EngineConfig::default());
        let mut transmitter = &cell;
        assert!(transmitter.is_ready());

        transmitter.init(&[]);
        transmitter.send(&[1u8; 24]).unwrap();
        assert!(!cell.is_ready());
        assert_eq!(cell.state(), EngineState::Transmitting);
        assert_eq!(transmitter.send(&[1u8; 24]), Err(SendError::Busy));

        assert_eq!(run_until_idle(&cell, 1000), Some(24 + 20));
        assert!(cell.is_ready());
        cell.wait_ready();
    }

    #[test]
    fn test_cell_steps_through_states() {
        let cell = EngineCell::new(SimulatedPeripherals::new(), EngineConfig::default());
        (&cell).send(&[0u8; 2]).unwrap();

        assert_eq!(step(&cell), EngineState::Transmitting);
        assert_eq!(step(&cell), EngineState::DeadTime);
        assert!(!cell.is_ready());
        assert_eq!(run_until_idle(&cell, 1000), Some(20));
        assert!(cell.is_ready());
    }

    #[test]
    fn test_cell_gives_up_without_interrupts() {
        let cell = EngineCell::new(SimulatedPeripherals::new(), EngineConfig::default());
        (&cell).send(&[0u8; 100]).unwrap();
        assert_eq!(run_until_idle(&cell, 50), None);
        assert_eq!(cell.state(), EngineState::Transmitting);
    }
}
