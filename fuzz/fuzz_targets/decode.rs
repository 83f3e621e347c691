#![no_main]
use libfuzzer_sys::fuzz_target;
use veiled_rs::Codec;

fuzz_target!(|data: &[u8]| {
    let codec = Codec::new();
    let text = String::from_utf8_lossy(data);
    let lenient = codec.decode(&text);
    if let Ok(strict) = codec.try_decode(&text) {
        assert_eq!(strict, lenient);
    }
});
