#![no_main]

use libfuzzer_sys::fuzz_target;
use vab_native::frame::split_record;
use vab_native::{Frame, Response, DEFAULT_FRAME_BUFFER};

fuzz_target!(|data: &[u8]| {
    let mut inbox = data.to_vec();

    // Drain complete records the way the server loop does, then feed each
    // body to both decoders. Whatever decodes must re-encode byte for byte.
    loop {
        let (body, consumed) = match split_record(&inbox, DEFAULT_FRAME_BUFFER) {
            Ok(Some((body, consumed))) => (body.to_vec(), consumed),
            Ok(None) | Err(_) => break,
        };
        inbox.drain(..consumed);

        if let Ok(frame) = Frame::decode(&body) {
            let encoded = frame.encode().expect("decoded requests re-encode");
            assert_eq!(&encoded[4..], body.as_slice());
        }
        if let Ok(response) = Response::decode(&body) {
            let encoded = response.encode().expect("decoded responses re-encode");
            assert_eq!(&encoded[4..], body.as_slice());
        }
    }
});
