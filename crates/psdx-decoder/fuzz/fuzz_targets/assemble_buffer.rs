#![no_main]

use libfuzzer_sys::fuzz_target;
use psdx_decoder::assembler::{ImageSink, OutputImage};
use psdx_decoder::errors::PSDDecodeErrors;
use psdx_decoder::zune_core::bytestream::ZCursor;
use psdx_decoder::zune_core::options::DecoderOptions;
use psdx_decoder::{PSDDecoder, PsdOptions};

struct Discard;

impl ImageSink for Discard {
    type Error = PSDDecodeErrors;

    fn write_image(&mut self, image: &OutputImage<'_>) -> Result<(), PSDDecodeErrors> {
        let _ = image.interleave();
        let _ = image.expand_palette();
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    // keep allocations small, a 4 byte rectangle can ask for gigabytes
    let limits = DecoderOptions::default()
        .set_max_width(1 << 12)
        .set_max_height(1 << 12);
    let options = PsdOptions::new(limits).set_split_channels(data.len() % 2 == 1);

    let mut decoder = PSDDecoder::new_with_options(ZCursor::new(data), options);
    let _ = decoder.decode_into("merged", &mut Discard);
});
