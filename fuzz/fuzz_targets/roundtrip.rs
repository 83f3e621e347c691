#![no_main]
use libfuzzer_sys::fuzz_target;
use veiled_rs::{decode_run, encode_run};

fuzz_target!(|data: &[u8]| {
    let digits: String = data.iter().take(20).map(|b| char::from(b'0' + b % 10)).collect();
    if digits.len() < 8 {
        return;
    }
    let encoded = encode_run(&digits);
    assert_eq!(encoded.len(), digits.len());
    assert_eq!(decode_run(&encoded).unwrap(), digits);
});
