#![no_main]

use keybed_midi::KeyboardMessage;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(Some(message)) = KeyboardMessage::decode(data) {
        let channel = data[0] & 0x0F;
        let encoded = message.encode(channel);
        assert_eq!(KeyboardMessage::decode(&encoded), Ok(Some(message)));
    }
});
