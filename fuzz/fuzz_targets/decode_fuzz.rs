//! Decode fuzz target: arbitrary bytes through the default catalogue, then re-encode
//! whatever was decoded. Neither pass may panic.
//! Build with: cargo fuzz run decode_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let codec = layercodec::Codec::default();
    if let Ok(results) = codec.decode(data) {
        let inputs: Vec<layercodec::EncodeInput> = results.into_iter().map(Into::into).collect();
        let _ = codec.encode(&inputs);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run decode_fuzz");
}
