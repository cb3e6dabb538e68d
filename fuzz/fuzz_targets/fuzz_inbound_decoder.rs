#![no_main]

use libfuzzer_sys::fuzz_target;
use minigames::transport::decode_inbound;

fuzz_target!(|data: &[u8]| {
    // Only whole UTF-8 lines reach the decoder
    if let Ok(line) = std::str::from_utf8(data) {
        if let Ok(inbound) = decode_inbound(line) {
            let _ = inbound.channel();
            let _ = inbound.kind();
        }
    }
});
