use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use gbhost_core::core::FRAME_BYTES;
use gbhost_core::runtime::{FrameExchange, Presenter};
use proptest::prelude::*;

fn solid(value: u8) -> Vec<u8> {
    vec![value; FRAME_BYTES]
}

#[derive(Clone, Debug)]
enum Op {
    Publish(u8),
    Consume,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![any::<u8>().prop_map(Op::Publish), Just(Op::Consume)]
}

proptest! {
    /// The consumer only ever sees the most recent frame; frames published
    /// while a hand-off is in flight are counted as dropped.
    #[test]
    fn test_latest_frame_wins(ops in prop::collection::vec(op(), 1..64)) {
        let exchange = Arc::new(FrameExchange::new());
        let mut presenter = Presenter::new(Arc::clone(&exchange));

        let mut in_flight = false;
        let mut published = 0u64;
        let mut dropped = 0u64;
        let mut latest = 0u8;

        for op in ops {
            match op {
                Op::Publish(value) => {
                    published += 1;
                    if in_flight {
                        dropped += 1;
                    }
                    in_flight = true;
                    latest = value;
                    prop_assert_eq!(exchange.publish(&solid(value)), published);
                }
                Op::Consume => {
                    let got = presenter.consume_latest().map(|f| (f.sequence(), f.pixel(80, 72)[0]));
                    if in_flight {
                        prop_assert_eq!(got, Some((published, latest)));
                    } else {
                        prop_assert_eq!(got, None);
                    }
                    in_flight = false;
                }
            }
        }

        prop_assert_eq!(exchange.frames_published(), published);
        prop_assert_eq!(exchange.frames_dropped(), dropped);
        prop_assert_eq!(exchange.has_pending(), in_flight);
    }
}

#[test]
fn test_frames_never_tear_under_contention() {
    let exchange = Arc::new(FrameExchange::new());
    let done = Arc::new(AtomicBool::new(false));

    let producer = {
        let exchange = Arc::clone(&exchange);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut value = 0u8;
            while !done.load(Ordering::Relaxed) {
                value = value.wrapping_add(1);
                exchange.publish(&solid(value));
            }
        })
    };

    let mut presenter = Presenter::new(Arc::clone(&exchange));
    let mut seen = 0;
    let mut last_sequence = 0;
    while seen < 500 {
        if let Some(frame) = presenter.wait_latest(Duration::from_secs(5)) {
            let first = frame.pixels()[0];
            assert!(
                frame.pixels().iter().all(|&b| b == first),
                "torn frame at sequence {}",
                frame.sequence()
            );
            assert!(frame.sequence() > last_sequence);
            last_sequence = frame.sequence();
            seen += 1;
        } else {
            panic!("producer stalled");
        }
    }

    done.store(true, Ordering::Relaxed);
    producer.join().unwrap();
    assert_eq!(
        exchange.frames_published(),
        exchange.frames_dropped() + seen + u64::from(exchange.has_pending())
    );
}

#[test]
fn test_listener_sees_each_hand_off() {
    let exchange = FrameExchange::new();
    let (tx, rx) = std::sync::mpsc::channel();
    exchange.set_listener(Some(Arc::new(move |seq| {
        tx.send(seq).unwrap();
    })));

    exchange.publish(&solid(1));
    exchange.publish(&solid(2));
    let mut frame = gbhost_core::core::Frame::new();
    assert!(exchange.swap_latest(&mut frame));
    exchange.publish(&solid(3));

    let notified: Vec<u64> = rx.try_iter().collect();
    assert_eq!(notified, [1, 3]);
}
