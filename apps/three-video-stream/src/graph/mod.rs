use gst::prelude::*;
use tracing::{debug, error, info};

use crate::config::StreamConfig;
use crate::gst_utils::{downstream_elements, make_element};
use crate::layout::{self, Layout};
use crate::{Error, Result};

pub mod streaming;

pub use streaming::StreamingBranch;

/// All elements of a built compositing pipeline.
///
/// The decoders expose their source pads only once they have inspected their
/// input, so they are left unlinked here; see [`crate::resolver`].
pub struct CompositorGraph {
    pipeline: gst::Pipeline,
    decoders: [gst::Element; 3],
    scalers: [gst::Element; 3],
    capsfilters: [gst::Element; 3],
    mixer: gst::Element,
    mixer_pads: [gst::Pad; 3],
    convert: gst::Element,
    preview_sink: gst::Element,
    streaming: Option<StreamingBranch>,
    layout: Layout,
}

impl std::fmt::Debug for CompositorGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositorGraph")
            .field("pipeline", &self.pipeline.name())
            .field("layout", &self.layout)
            .field("streaming", &self.streaming)
            .finish()
    }
}

/// Link `elements` pairwise in order, reporting the first pair that fails.
pub(crate) fn link_chain(elements: &[&gst::Element]) -> Result<()> {
    for pair in elements.windows(2) {
        let (src, sink) = (pair[0], pair[1]);
        src.link(sink).map_err(|_| {
            error!("Failed to link {} -> {}", src.name(), sink.name());
            Error::StaticLink {
                src: src.name().to_string(),
                sink: sink.name().to_string(),
            }
        })?;
        debug!("Linked {} -> {}", src.name(), sink.name());
    }
    Ok(())
}

fn make_triple(factory: &str, prefix: &str) -> Result<[gst::Element; 3]> {
    Ok([
        make_element(factory, &format!("{prefix}1"))?,
        make_element(factory, &format!("{prefix}2"))?,
        make_element(factory, &format!("{prefix}3"))?,
    ])
}

/// Assemble the fixed compositing topology.
///
/// Three decoders feed three scalers and capsfilters into the mixer. Without
/// streaming the mixer goes straight to the preview; with streaming a tee splits
/// it into the preview and the encode/mux/network path. Every failure here is
/// fatal: nothing is retried.
pub fn build(config: &StreamConfig, with_streaming: bool) -> Result<CompositorGraph> {
    let layout = layout::plan(config.output.width, config.output.height);
    let uris = config.source_uris()?;

    info!(
        "Building compositor for {}x{} output ({} streaming)",
        config.output.width,
        config.output.height,
        if with_streaming { "with" } else { "without" }
    );

    let pipeline = gst::Pipeline::builder().name("pipeline").build();

    let decoders = make_triple("uridecodebin3", "decodebin")?;
    let scalers = make_triple("videoscale", "videoscale")?;
    let capsfilters = make_triple("capsfilter", "video_scaled_caps")?;
    let mixer = make_element("compositor", "videomixer")?;
    let convert = make_element("videoconvert", "convert_preview")?;
    let preview_sink = make_element("autovideosink", "sink_preview")?;

    let streaming = if with_streaming {
        Some(StreamingBranch::new(&config.streaming)?)
    } else {
        info!("No API key, local preview only");
        None
    };

    for (decoder, uri) in decoders.iter().zip(&uris) {
        decoder.set_property("uri", uri);
        debug!("{} reads {}", decoder.name(), uri);
    }

    let caps = layout.scaled.caps();
    for capsfilter in &capsfilters {
        capsfilter.set_property("caps", &caps);
    }

    pipeline
        .add_many(
            decoders
                .iter()
                .chain(&scalers)
                .chain(&capsfilters)
                .chain([&mixer, &convert, &preview_sink]),
        )
        .map_err(|_| Error::Construction {
            factory: "pipeline".to_string(),
            name: pipeline.name().to_string(),
        })?;

    for (scaler, capsfilter) in scalers.iter().zip(&capsfilters) {
        link_chain(&[scaler, capsfilter])?;
    }

    match &streaming {
        Some(branch) => {
            branch.add_to(&pipeline)?;
            branch.link(&mixer, &convert, &preview_sink)?;
        }
        None => {
            info!("Linking elements without the streaming branch");
            link_chain(&[&mixer, &convert, &preview_sink])?;
        }
    }

    let mixer_pads = place_tiles(&mixer, &capsfilters, &layout)?;

    debug!(
        "Downstream of {}: {:?}",
        mixer.name(),
        downstream_elements(&mixer)
    );

    Ok(CompositorGraph {
        pipeline,
        decoders,
        scalers,
        capsfilters,
        mixer,
        mixer_pads,
        convert,
        preview_sink,
        streaming,
        layout,
    })
}

/// Request one mixer sink pad per tile, link the capsfilters to them and set
/// the placement. The background is made opaque first so uncovered areas are
/// black instead of undefined.
fn place_tiles(
    mixer: &gst::Element,
    capsfilters: &[gst::Element; 3],
    layout: &Layout,
) -> Result<[gst::Pad; 3]> {
    mixer.set_property_from_str("background", "black");

    let request = || {
        mixer
            .request_pad_simple("sink_%u")
            .ok_or_else(|| Error::PadRequest {
                element: mixer.name().to_string(),
            })
    };
    let pads = [request()?, request()?, request()?];

    for ((capsfilter, pad), tile) in capsfilters.iter().zip(&pads).zip(&layout.tiles) {
        let src_pad = capsfilter.static_pad("src").ok_or_else(|| Error::StaticLink {
            src: capsfilter.name().to_string(),
            sink: pad.name().to_string(),
        })?;

        src_pad.link(pad).map_err(|err| {
            error!("Videomixer could not be linked: {:?}", err);
            Error::StaticLink {
                src: capsfilter.name().to_string(),
                sink: format!("{}:{}", mixer.name(), pad.name()),
            }
        })?;

        pad.set_property("xpos", tile.x);
        pad.set_property("ypos", tile.y);
        pad.set_property("width", tile.width);
        pad.set_property("height", tile.height);
        debug!(
            "{} placed at ({}, {}) size {}x{}",
            pad.name(),
            tile.x,
            tile.y,
            tile.width,
            tile.height
        );
    }

    Ok(pads)
}

impl CompositorGraph {
    pub fn pipeline(&self) -> &gst::Pipeline {
        &self.pipeline
    }

    pub fn decoders(&self) -> &[gst::Element; 3] {
        &self.decoders
    }

    pub fn scalers(&self) -> &[gst::Element; 3] {
        &self.scalers
    }

    pub fn capsfilters(&self) -> &[gst::Element; 3] {
        &self.capsfilters
    }

    pub fn mixer(&self) -> &gst::Element {
        &self.mixer
    }

    pub fn mixer_pads(&self) -> &[gst::Pad; 3] {
        &self.mixer_pads
    }

    pub fn convert(&self) -> &gst::Element {
        &self.convert
    }

    pub fn preview_sink(&self) -> &gst::Element {
        &self.preview_sink
    }

    pub fn streaming(&self) -> Option<&StreamingBranch> {
        self.streaming.as_ref()
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Decoder name paired with the scaler sink pad its video output goes to.
    pub fn deferred_links(&self) -> Vec<(String, gst::Pad)> {
        self.decoders
            .iter()
            .zip(&self.scalers)
            .filter_map(|(decoder, scaler)| {
                scaler
                    .static_pad("sink")
                    .map(|pad| (decoder.name().to_string(), pad))
            })
            .collect()
    }
}
