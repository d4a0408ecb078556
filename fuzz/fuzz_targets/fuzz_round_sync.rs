#![no_main]

use libfuzzer_sys::fuzz_target;
use stake_bingo_client::countdown::Countdown;
use stake_bingo_client::protocol::InboundFrame;
use stake_bingo_client::round::{RoundSynchronizer, SyncSettings};

// One command per line: `s<n>` selects, `m<n>` marks, `c` claims, `a` toggles
// auto-play, anything else is fed in as a server frame.
fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let mut sync = RoundSynchronizer::new(10, SyncSettings::default(), Countdown::manual());
    for line in s.lines() {
        let number = || line.get(1..).and_then(|n| n.parse::<u8>().ok());
        match line.as_bytes().first() {
            Some(b's') => {
                if let Some(n) = number() {
                    let _ = sync.select_number(n);
                }
            }
            Some(b'm') => {
                if let Some(n) = number() {
                    let _ = sync.mark_number(n);
                }
            }
            Some(b'c') => {
                let _ = sync.claim_bingo();
            }
            Some(b'a') => {
                let enabled = !sync.auto_play();
                sync.set_auto_play(enabled);
            }
            _ => {
                if let Ok(frame) = InboundFrame::parse(line) {
                    sync.handle_frame(frame);
                }
            }
        }
        let _ = sync.take_effects();
        let _ = sync.view();
    }
});
