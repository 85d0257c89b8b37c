use gst::prelude::*;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::info;

use three_video_stream::gst_utils::missing_elements;

pub const RUN_TIMEOUT: Duration = Duration::from_secs(20);

/// False (and a note in the output) when the graph cannot be built here.
pub fn plugins_available(with_streaming: bool) -> bool {
    let missing = missing_elements(with_streaming);
    if !missing.is_empty() {
        info!("Skipping, missing elements: {:?}", missing);
        println!("Skipping, missing elements: {:?}", missing);
    }
    missing.is_empty()
}

pub fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write config");
    file
}

/// A free source pad named like a decoder output.
pub fn decoder_pad(name: &str) -> gst::Pad {
    gst::Pad::builder(gst::PadDirection::Src).name(name).build()
}

pub fn peer_element_name(pad: &gst::Pad) -> Option<String> {
    pad.peer()
        .and_then(|peer| peer.parent_element())
        .map(|element| element.name().to_string())
}
