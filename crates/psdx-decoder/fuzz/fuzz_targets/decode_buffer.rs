#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    use psdx_decoder::zune_core::bytestream::ZCursor;
    let data = ZCursor::new(data);

    let mut decoder = psdx_decoder::PSDDecoder::new(data);
    let _ = decoder.decode();
});
