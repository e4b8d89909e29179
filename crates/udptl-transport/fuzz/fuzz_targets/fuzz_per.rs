#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use udptl_transport::per::{decode_length, decode_open_type, encode_open_type};

/// Fuzz the PER field decoders and the open-type re-encode path.
fuzz_target!(|data: &[u8]| {
    let mut cursor = 0;
    let _ = decode_length(data, &mut cursor);

    let mut cursor = 0;
    if let Ok(decoded) = decode_open_type(data, &mut cursor) {
        assert!(cursor <= data.len());

        // Whatever decoded must survive a re-encode/re-decode cycle.
        let mut buf = BytesMut::new();
        encode_open_type(&mut buf, &decoded);
        let mut cursor = 0;
        let again = decode_open_type(&buf, &mut cursor).expect("re-decode of own encoding");
        if decoded.is_empty() {
            assert_eq!(again, vec![0]);
        } else {
            assert_eq!(again, decoded);
        }
    }
});
