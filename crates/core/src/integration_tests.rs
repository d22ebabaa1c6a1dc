//! Integration tests: exercise the full flow using a simulated Buzz! device.
//!
//! A mock controller is enumerated, opened through the controller layer,
//! fed button reports, driven with light commands, and finally unplugged or
//! closed, checking the observable device traffic at each step.

#[cfg(test)]
mod tests {
    use crate::channel::ChannelState;
    use crate::config::BuzzConfig;
    use crate::controller::{BuzzController, BuzzEvent};
    use crate::report::{ButtonSnapshot, LightStates};
    use crate::transport::mock::{MockBackend, MockDevice};
    use crate::{pids, BUZZ_VID};
    use std::sync::mpsc::Receiver;
    use std::thread;
    use std::time::{Duration, Instant};

    const WAIT: Duration = Duration::from_secs(2);
    const WIN_PATH: &str =
        r"\\?\hid#vid_054c&pid_1000#7&2b5e9c1&0&0000#{4d1e55b2-f16f-11cf-88cb-001111000030}";

    fn config() -> BuzzConfig {
        BuzzConfig {
            read_poll_ms: 10,
            ..Default::default()
        }
    }

    /// A wired controller listed under a Windows-style path, with the
    /// registry ids left blank so only the path token can match.
    fn create_mock_buzz() -> (MockBackend, MockDevice) {
        let backend = MockBackend::new();
        backend.add_entry(None, 0, 0);
        backend.add_entry(Some(r"\\?\hid#vid_046d&pid_c08b#1"), 0x046D, 0xC08B);
        let device = MockDevice::new(6, 8, "Logitech Buzz(tm) Controller V1");
        backend.add_device(WIN_PATH, 0, 0, device.clone());
        (backend, device)
    }

    fn report(b3: u8, b4: u8, b5: u8) -> [u8; 6] {
        [0x00, 0x7F, 0x7F, b3, b4, b5]
    }

    fn next_snapshot(rx: &Receiver<BuzzEvent>) -> ButtonSnapshot {
        match rx.recv_timeout(WAIT).unwrap() {
            BuzzEvent::Buttons(snapshot) => snapshot,
            BuzzEvent::Removed => panic!("unexpected removal"),
        }
    }

    /// Test: press and release sequence, lights follow held handsets.
    #[test]
    fn quiz_round_with_light_echo() {
        let (backend, device) = create_mock_buzz();
        let controller = BuzzController::find_first(&backend, &config())
            .unwrap()
            .unwrap();
        assert_eq!(controller.product_string(), "Logitech Buzz(tm) Controller V1");
        let events = controller.subscribe();

        // Handset 1 buzzes in (red), then handset 3 picks orange, then all release.
        device.push_report(&report(0x20, 0x00, 0x00));
        device.push_report(&report(0x20, 0x00, 0x04));
        device.push_report(&report(0x00, 0x00, 0x00));

        let mut last = ButtonSnapshot::default();
        let mut changes = Vec::new();
        for _ in 0..3 {
            let snapshot = next_snapshot(&events);
            if snapshot != last {
                controller.set_lights(LightStates::from_held(&snapshot));
                changes.push(snapshot);
                last = snapshot;
            }
        }

        assert_eq!(changes.len(), 3);
        assert!(changes[0].handsets[1].red);
        assert!(changes[1].handsets[3].orange);
        assert!(!changes[2].any());

        assert_eq!(
            device.writes(),
            vec![
                vec![0, 0, 0x00, 0xFF, 0x00, 0x00, 0, 0],
                vec![0, 0, 0x00, 0xFF, 0x00, 0xFF, 0, 0],
                vec![0, 0, 0x00, 0x00, 0x00, 0x00, 0, 0],
            ]
        );
    }

    /// Test: unplug mid-session degrades to one removal event, no errors.
    #[test]
    fn unplug_mid_session() {
        let (backend, device) = create_mock_buzz();
        let controller = BuzzController::find_first(&backend, &config())
            .unwrap()
            .unwrap();
        let events = controller.subscribe();

        device.push_report(&report(0x01, 0x00, 0x00));
        assert!(next_snapshot(&events).handsets[0].red);

        device.unplug();
        assert_eq!(events.recv_timeout(WAIT).unwrap(), BuzzEvent::Removed);

        let deadline = Instant::now() + WAIT;
        while controller.state() != ChannelState::Disposed {
            assert!(Instant::now() < deadline, "channel never released");
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!controller.is_connected());

        // Best-effort writes after removal are silent no-ops.
        controller.set_lights(LightStates::all_on());
        controller.close();

        assert!(events.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(device.writes().is_empty());
        assert_eq!(device.releases(), 1);
        assert_eq!(device.close_calls(), 1);
    }

    /// Test: a slow consumer on another thread sees every report in order.
    #[test]
    fn consumer_thread_sees_every_report() {
        let (backend, device) = create_mock_buzz();
        let controller = BuzzController::find_first(&backend, &config())
            .unwrap()
            .unwrap();
        let events = controller.subscribe();

        let consumer = thread::spawn(move || {
            let mut seen = Vec::new();
            while let Ok(BuzzEvent::Buttons(snapshot)) = events.recv_timeout(WAIT) {
                thread::sleep(Duration::from_millis(2));
                seen.push(snapshot);
            }
            seen
        });

        for i in 0..20u8 {
            device.push_report(&report(i, 0x00, 0x00));
        }
        device.unplug();

        let seen = consumer.join().unwrap();
        assert_eq!(seen.len(), 20);
        // Report 1 is handset 0 red only; report 16 is handset 0 blue only.
        assert!(seen[1].handsets[0].red);
        assert!(seen[16].handsets[0].blue && !seen[16].handsets[0].red);
    }

    /// Test: dropping the controller turns lights off exactly once.
    #[test]
    fn drop_turns_lights_off() {
        let (backend, device) = create_mock_buzz();
        {
            let controller = BuzzController::find_first(&backend, &config())
                .unwrap()
                .unwrap();
            controller.set_lights(LightStates::only(0));
        }
        let writes = device.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0][2], 0xFF);
        assert_eq!(writes[1], vec![0u8; 8]);
        assert_eq!(device.releases(), 1);
    }

    /// Test: wired and wireless devices are both opened by find_all.
    #[test]
    fn find_all_mixed_devices() {
        let (backend, _wired) = create_mock_buzz();
        let wireless = MockDevice::new(6, 8, "Buzz Wireless");
        backend.add_device("/dev/hidraw4", BUZZ_VID, pids::BUZZ_WIRELESS, wireless.clone());

        let controllers = BuzzController::find_all(&backend, &config()).unwrap();
        assert_eq!(controllers.len(), 2);
        assert_eq!(controllers[0].path(), WIN_PATH);
        assert_eq!(controllers[1].product_string(), "Buzz Wireless");

        controllers[1].set_lights(LightStates::all_on());
        drop(controllers);
        assert_eq!(wireless.writes().len(), 2);
        assert_eq!(wireless.releases(), 1);
    }
}
