use gst::prelude::*;
use tracing::{debug, info};

use super::link_chain;
use crate::config::StreamingConfig;
use crate::gst_utils::make_element;
use crate::{Error, Result};

/// Split, encode, mux and push to the ingest server.
///
/// Only constructed when streaming is enabled; a local-only run never
/// allocates any of these elements.
pub struct StreamingBranch {
    pub tee: gst::Element,
    pub queue_preview: gst::Element,
    pub queue_streaming: gst::Element,
    pub encoder: gst::Element,
    pub queue_encoded: gst::Element,
    pub muxer: gst::Element,
    pub queue_muxed: gst::Element,
    pub sink: gst::Element,
}

impl std::fmt::Debug for StreamingBranch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingBranch")
            .field("encoder", &self.encoder.name())
            .field("muxer", &self.muxer.name())
            .field("sink", &self.sink.name())
            .finish()
    }
}

impl StreamingBranch {
    pub fn new(config: &StreamingConfig) -> Result<Self> {
        let location = config.location().ok_or_else(|| {
            Error::Config("streaming branch requested without an API key".to_string())
        })?;

        let tune = config.encoder.tune_flags()?;

        let encoder = make_element("x264enc", "encoder_streaming")?;
        encoder.set_property("threads", config.encoder.threads);
        encoder.set_property("bitrate", config.encoder.bitrate_kbps);
        if let Some(tune) = &tune {
            encoder.set_property_from_str("tune", tune);
        }
        encoder.set_property("key-int-max", config.encoder.key_int_max);

        let muxer = make_element("flvmux", "muxer_streaming")?;
        muxer.set_property("streamable", true);

        let sink = make_element("rtmpsink", "sink_streaming")?;
        sink.set_property("location", &location);

        debug!(
            "Encoder configured: {} kbit/s, key-int-max {}, tune {}",
            config.encoder.bitrate_kbps, config.encoder.key_int_max, config.encoder.tune
        );
        info!("Streaming to {}", config.ingest_server);

        Ok(Self {
            tee: make_element("tee", "tee")?,
            queue_preview: make_element("queue", "queue_preview")?,
            queue_streaming: make_element("queue", "queue_streaming")?,
            encoder,
            queue_encoded: make_element("queue", "queue_encoded")?,
            muxer,
            queue_muxed: make_element("queue", "queue_muxed")?,
            sink,
        })
    }

    fn elements(&self) -> [&gst::Element; 8] {
        [
            &self.tee,
            &self.queue_preview,
            &self.queue_streaming,
            &self.encoder,
            &self.queue_encoded,
            &self.muxer,
            &self.queue_muxed,
            &self.sink,
        ]
    }

    pub fn add_to(&self, pipeline: &gst::Pipeline) -> Result<()> {
        pipeline.add_many(self.elements()).map_err(|_| Error::Construction {
            factory: "tee".to_string(),
            name: "streaming branch".to_string(),
        })
    }

    /// mixer -> tee, then one tee output per path:
    /// tee -> queue -> encoder -> queue -> muxer -> queue -> network sink
    /// tee -> queue -> convert -> preview sink
    pub fn link(
        &self,
        mixer: &gst::Element,
        convert: &gst::Element,
        preview: &gst::Element,
    ) -> Result<()> {
        info!("Linking elements for live preview and streaming");

        link_chain(&[mixer, &self.tee])?;
        link_chain(&[
            &self.tee,
            &self.queue_streaming,
            &self.encoder,
            &self.queue_encoded,
            &self.muxer,
            &self.queue_muxed,
            &self.sink,
        ])?;
        link_chain(&[&self.tee, &self.queue_preview, convert, preview])
    }
}
