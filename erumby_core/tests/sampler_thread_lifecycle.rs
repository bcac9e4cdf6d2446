use std::time::{Duration, Instant};

use erumby_core::sampler::{FrameSource, RadioSampler};
use erumby_hardware::SimRadio;
use erumby_hardware::error::HwError;
use erumby_traits::clock::MonotonicClock;
use erumby_traits::{BoxError, Radio, RadioFrame};

const FRAME: RadioFrame = RadioFrame {
    steering_us: 1476,
    throttle_us: 1500,
    mode_us: 2024,
};

fn wait_for_frame(s: &mut RadioSampler, within: Duration) -> Option<RadioFrame> {
    let start = Instant::now();
    while start.elapsed() < within {
        if let Some(f) = s.latest_frame() {
            return Some(f);
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    None
}

#[test]
fn sampler_publishes_frames_and_joins_on_drop() {
    let mut s = RadioSampler::spawn(
        SimRadio::constant(FRAME),
        Duration::from_millis(1),
        Duration::from_millis(5),
        Duration::from_millis(500),
        MonotonicClock::new(),
    );
    assert_eq!(wait_for_frame(&mut s, Duration::from_secs(2)), Some(FRAME));
    let start = Instant::now();
    drop(s);
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn silent_radio_yields_no_frame() {
    let mut s = RadioSampler::spawn(
        SimRadio::new([]),
        Duration::from_millis(1),
        Duration::from_millis(5),
        Duration::from_millis(50),
        MonotonicClock::new(),
    );
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(s.latest_frame(), None);
}

/// Delivers a single frame, then behaves like a lost link.
struct OneShot(Option<RadioFrame>);

impl Radio for OneShot {
    fn read(&mut self, timeout: Duration) -> Result<RadioFrame, BoxError> {
        match self.0.take() {
            Some(f) => Ok(f),
            None => {
                std::thread::sleep(timeout);
                Err(Box::new(HwError::Timeout))
            }
        }
    }
}

#[test]
fn stale_frame_is_withheld_after_failsafe() {
    let mut s = RadioSampler::spawn(
        OneShot(Some(FRAME)),
        Duration::from_millis(1),
        Duration::from_millis(5),
        Duration::from_millis(40),
        MonotonicClock::new(),
    );
    assert_eq!(wait_for_frame(&mut s, Duration::from_secs(2)), Some(FRAME));
    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(s.latest_frame(), None);
    assert!(s.stalled_for_now() >= 40);
}
