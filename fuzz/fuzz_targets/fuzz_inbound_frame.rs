#![no_main]

use libfuzzer_sys::fuzz_target;
use stake_bingo_client::protocol::{parse_lobby_status, InboundFrame};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Decoded frames must encode again.
        if let Ok(frame) = InboundFrame::parse(s) {
            let _ = frame.encode();
        }
        let _ = parse_lobby_status(s);
    }
});
