//! Linking of decoder pads that only appear once the input has been probed.
//!
//! The decoders fire `pad-added` from their own streaming threads, in no
//! particular order and possibly more than once per decoder. Each destination
//! sink pad is claimed at most once: the is-linked check and the link attempt
//! run under the slot's lock.

use gst::prelude::*;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::graph::CompositorGraph;
use crate::{Error, Result};

/// Category of a decoder pad, derived from its name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Video,
    Audio,
    Unknown,
}

impl PortKind {
    pub fn from_pad_name(name: &str) -> Self {
        if name.starts_with("audio") {
            PortKind::Audio
        } else if name.starts_with("video") {
            PortKind::Video
        } else {
            PortKind::Unknown
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Unlinked,
    Linked,
}

/// What happened to a newly announced pad that was not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Linked,
    AlreadyLinked,
}

#[derive(Debug)]
struct Slot {
    source: String,
    sink_pad: gst::Pad,
    state: Mutex<LinkState>,
}

/// Fixed table from decoder name to the scaler sink pad it feeds.
#[derive(Debug)]
pub struct PortResolver {
    slots: Vec<Slot>,
}

impl PortResolver {
    pub fn new(links: impl IntoIterator<Item = (String, gst::Pad)>) -> Self {
        let slots = links
            .into_iter()
            .map(|(source, sink_pad)| Slot {
                source,
                sink_pad,
                state: Mutex::new(LinkState::Unlinked),
            })
            .collect();

        Self { slots }
    }

    pub fn for_graph(graph: &CompositorGraph) -> Self {
        Self::new(graph.deferred_links())
    }

    /// Current link state of the slot fed by `source`.
    pub fn link_state(&self, source: &str) -> Option<LinkState> {
        self.slots
            .iter()
            .find(|slot| slot.source == source)
            .map(|slot| *slot.state.lock())
    }

    /// Match `pad`, announced by the decoder named `source`, to its destination
    /// and link it at most once.
    ///
    /// Audio and unrecognised pads come back as [`Error::UnsupportedPort`], a
    /// failed link as [`Error::DynamicLink`]; neither is fatal. A decoder name
    /// outside the table is [`Error::UnknownSource`].
    pub fn resolve(&self, source: &str, pad: &gst::Pad) -> Result<Resolution> {
        let pad_name = pad.name();

        if PortKind::from_pad_name(&pad_name) != PortKind::Video {
            return Err(Error::UnsupportedPort {
                source_name: source.to_string(),
                pad: pad_name.to_string(),
            });
        }

        let slot = self
            .slots
            .iter()
            .find(|slot| slot.source == source)
            .ok_or_else(|| Error::UnknownSource(source.to_string()))?;

        let mut state = slot.state.lock();
        if *state == LinkState::Linked || slot.sink_pad.is_linked() {
            *state = LinkState::Linked;
            return Ok(Resolution::AlreadyLinked);
        }

        pad.link(&slot.sink_pad).map_err(|err| Error::DynamicLink {
            source_name: source.to_string(),
            pad: pad_name.to_string(),
            reason: format!("{:?}", err),
        })?;
        *state = LinkState::Linked;

        Ok(Resolution::Linked)
    }

    /// `pad-added` entry point. Only an unknown decoder aborts the process,
    /// everything else is logged and dropped.
    pub fn on_pad_added(&self, src: &gst::Element, pad: &gst::Pad) {
        let source = src.name();
        info!("Received new pad '{}' from '{}'", pad.name(), source);

        match self.resolve(&source, pad) {
            Ok(Resolution::Linked) => {
                info!("Linked {}:{} into the mixer chain", source, pad.name());
            }
            Ok(Resolution::AlreadyLinked) => {
                debug!("{} already linked, ignoring {}", source, pad.name());
            }
            Err(err @ Error::UnsupportedPort { .. }) => {
                info!("{}, only video is supported", err);
            }
            Err(err @ Error::DynamicLink { .. }) => {
                warn!("{}, tile will stay empty", err);
            }
            Err(err) => {
                error!("{}", err);
                std::process::abort();
            }
        }
    }

    /// Register the resolver on every decoder of `graph`.
    pub fn attach(self: &Arc<Self>, graph: &CompositorGraph) {
        for decoder in graph.decoders() {
            let resolver = Arc::clone(self);
            decoder.connect_pad_added(move |src, pad| resolver.on_pad_added(src, pad));
            debug!("Watching {} for new pads", decoder.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn init() {
        let _ = gst::init();
    }

    fn src_pad(name: &str) -> gst::Pad {
        gst::Pad::builder(gst::PadDirection::Src).name(name).build()
    }

    /// Three identity elements standing in for the scalers.
    fn resolver() -> (PortResolver, Vec<gst::Element>) {
        let scalers: Vec<gst::Element> = (1..=3)
            .map(|i| {
                gst::ElementFactory::make("identity")
                    .name(format!("videoscale{i}"))
                    .build()
                    .unwrap()
            })
            .collect();
        let links = scalers
            .iter()
            .enumerate()
            .map(|(i, s)| (format!("decodebin{}", i + 1), s.static_pad("sink").unwrap()));
        (PortResolver::new(links), scalers)
    }

    fn sink_peer(scaler: &gst::Element) -> Option<gst::Pad> {
        scaler.static_pad("sink").unwrap().peer()
    }

    #[test]
    fn test_port_kind() {
        assert_eq!(PortKind::from_pad_name("video_0"), PortKind::Video);
        assert_eq!(PortKind::from_pad_name("audio_0"), PortKind::Audio);
        assert_eq!(PortKind::from_pad_name("text_0"), PortKind::Unknown);
        assert_eq!(PortKind::from_pad_name("src_0"), PortKind::Unknown);
    }

    #[test]
    fn test_video_pad_links_to_matching_scaler() {
        init();
        let (resolver, scalers) = resolver();

        let pad = src_pad("video_0");
        assert_eq!(resolver.resolve("decodebin2", &pad).unwrap(), Resolution::Linked);

        assert_eq!(sink_peer(&scalers[1]), Some(pad));
        assert!(sink_peer(&scalers[0]).is_none());
        assert!(sink_peer(&scalers[2]).is_none());
        assert_eq!(resolver.link_state("decodebin2"), Some(LinkState::Linked));
        assert_eq!(resolver.link_state("decodebin1"), Some(LinkState::Unlinked));
    }

    #[test]
    fn test_second_video_pad_is_ignored() {
        init();
        let (resolver, scalers) = resolver();

        let first = src_pad("video_0");
        let second = src_pad("video_1");
        assert_eq!(resolver.resolve("decodebin1", &first).unwrap(), Resolution::Linked);
        assert_eq!(
            resolver.resolve("decodebin1", &second).unwrap(),
            Resolution::AlreadyLinked
        );

        assert!(!second.is_linked());
        assert_eq!(sink_peer(&scalers[0]), Some(first));
    }

    #[test]
    fn test_audio_pad_never_links() {
        init();
        let (resolver, scalers) = resolver();

        for source in ["decodebin1", "decodebin2", "decodebin3"] {
            let pad = src_pad("audio_0");
            let err = resolver.resolve(source, &pad).unwrap_err();
            assert!(matches!(err, Error::UnsupportedPort { .. }));
            assert!(!err.is_fatal());
            assert!(!pad.is_linked());
        }
        assert!(scalers.iter().all(|s| sink_peer(s).is_none()));

        // An audio pad arriving first must not block the video pad.
        let video = src_pad("video_0");
        assert_eq!(resolver.resolve("decodebin3", &video).unwrap(), Resolution::Linked);
    }

    #[test]
    fn test_unknown_source() {
        init();
        let (resolver, _scalers) = resolver();

        let err = resolver.resolve("decodebin4", &src_pad("video_0")).unwrap_err();
        assert!(matches!(err, Error::UnknownSource(ref name) if name == "decodebin4"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_failed_link_is_not_fatal() {
        init();
        let (resolver, scalers) = resolver();

        // A pad that already has a peer cannot be linked again.
        let taken = src_pad("video_0");
        let elsewhere = gst::ElementFactory::make("identity").build().unwrap();
        taken.link(&elsewhere.static_pad("sink").unwrap()).unwrap();

        let err = resolver.resolve("decodebin1", &taken).unwrap_err();
        assert!(matches!(err, Error::DynamicLink { .. }));
        assert!(!err.is_fatal());
        assert_eq!(resolver.link_state("decodebin1"), Some(LinkState::Unlinked));

        let video = src_pad("video_0");
        assert_eq!(resolver.resolve("decodebin1", &video).unwrap(), Resolution::Linked);
        assert_eq!(sink_peer(&scalers[0]), Some(video));
    }

    #[test]
    fn test_concurrent_pads_link_once_per_source() {
        init();
        let (resolver, scalers) = resolver();
        let resolver = Arc::new(resolver);

        let handles: Vec<_> = (0..24)
            .map(|i| {
                let resolver = Arc::clone(&resolver);
                thread::spawn(move || {
                    let source = format!("decodebin{}", i % 3 + 1);
                    let kind = if i % 4 == 0 { "audio" } else { "video" };
                    let pad = src_pad(&format!("{kind}_{i}"));
                    resolver.resolve(&source, &pad)
                })
            })
            .collect();

        let linked = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|r| matches!(r, Ok(Resolution::Linked)))
            .count();

        assert_eq!(linked, 3);
        for scaler in &scalers {
            let peer = sink_peer(scaler).unwrap();
            assert!(peer.name().starts_with("video"));
        }
    }
}
