use gst::prelude::*;
use std::collections::HashMap;
use tracing::{debug, error, info};

use crate::{Error, Result};

/// Element factories the compositing graph always needs
pub const REQUIRED_ELEMENTS: &[&str] = &[
    "uridecodebin3",
    "videoscale",
    "capsfilter",
    "compositor",
    "videoconvert",
    "autovideosink",
];

/// Element factories only needed by the streaming branch
pub const STREAMING_ELEMENTS: &[&str] = &["tee", "queue", "x264enc", "flvmux", "rtmpsink"];

/// Availability of every factory the application may instantiate
#[derive(Debug, Clone)]
pub struct GstCapabilities {
    pub available_elements: HashMap<String, bool>,
}

impl GstCapabilities {
    /// Check if a specific element is available
    pub fn has_element(&self, element: &str) -> bool {
        self.available_elements.get(element).copied().unwrap_or(false)
    }

    pub fn can_stream(&self) -> bool {
        STREAMING_ELEMENTS.iter().all(|e| self.has_element(e))
    }
}

/// Initialize GStreamer with error handling and logging
pub fn initialize() -> Result<GstCapabilities> {
    info!("Initializing GStreamer");

    gst::init().map_err(|e| {
        error!("Failed to initialize GStreamer: {}", e);
        Error::Config(format!("GStreamer initialization failed: {}", e))
    })?;

    let (major, minor, micro, nano) = gst::version();
    info!("GStreamer version: {}.{}.{}.{}", major, minor, micro, nano);

    if let Ok(debug_str) = std::env::var("GST_DEBUG") {
        debug!("GST_DEBUG set to: {}", debug_str);
    }

    if let Ok(plugin_path) = std::env::var("GST_PLUGIN_PATH") {
        info!("Using custom GST_PLUGIN_PATH: {}", plugin_path);
    }

    let capabilities = discover_plugins();
    info!("Streaming support: {}", capabilities.can_stream());

    Ok(capabilities)
}

/// Probe the registry for every factory in both lists
pub fn discover_plugins() -> GstCapabilities {
    let available_elements = REQUIRED_ELEMENTS
        .iter()
        .chain(STREAMING_ELEMENTS)
        .map(|element| {
            let found = gst::ElementFactory::find(element).is_some();
            debug!("Element {}: {}", element, if found { "found" } else { "missing" });
            (element.to_string(), found)
        })
        .collect();

    GstCapabilities { available_elements }
}

/// Factories that are not installed, for the graph shape requested.
pub fn missing_elements(with_streaming: bool) -> Vec<&'static str> {
    let streaming: &[&str] = if with_streaming { STREAMING_ELEMENTS } else { &[] };

    REQUIRED_ELEMENTS
        .iter()
        .chain(streaming)
        .copied()
        .filter(|element| gst::ElementFactory::find(element).is_none())
        .collect()
}

/// Print the plugin report for `--check-plugins`
pub fn print_plugin_info(capabilities: &GstCapabilities) {
    println!("\nGStreamer Plugin Discovery Report");
    println!("==================================");

    let (major, minor, micro, nano) = gst::version();
    println!("\nGStreamer Version: {}.{}.{}.{}", major, minor, micro, nano);

    if let Ok(plugin_path) = std::env::var("GST_PLUGIN_PATH") {
        println!("Custom Plugin Path: {}", plugin_path);
    }

    println!("\nRequired Elements:");
    for element in REQUIRED_ELEMENTS {
        let status = if capabilities.has_element(element) { "✓" } else { "✗" };
        println!("  {} {}", status, element);
    }

    println!("\nStreaming Elements:");
    for element in STREAMING_ELEMENTS {
        let status = if capabilities.has_element(element) { "✓" } else { "✗" };
        println!("  {} {}", status, element);
    }

    println!(
        "\nStreaming Support: {}",
        if capabilities.can_stream() { "Yes" } else { "No" }
    );
}

/// Create a named element, mapping a missing factory to a construction error.
pub fn make_element(factory: &str, name: &str) -> Result<gst::Element> {
    gst::ElementFactory::make(factory)
        .name(name)
        .build()
        .map_err(|_| {
            error!("Failed to create element {} ({})", name, factory);
            Error::Construction {
                factory: factory.to_string(),
                name: name.to_string(),
            }
        })
}

/// Names of all elements reachable downstream of `element`, following linked
/// source pads. Ghost and proxy pads are not traversed.
pub fn downstream_elements(element: &gst::Element) -> Vec<String> {
    let mut seen = Vec::new();
    let mut pending = vec![element.clone()];

    while let Some(current) = pending.pop() {
        for pad in current.src_pads() {
            let Some(peer) = pad.peer() else {
                continue;
            };
            let Some(next) = peer.parent_element() else {
                continue;
            };
            let name = next.name().to_string();
            if !seen.contains(&name) {
                seen.push(name);
                pending.push(next);
            }
        }
    }

    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gstreamer_initialization() {
        let result = initialize();
        assert!(result.is_ok(), "GStreamer initialization failed: {:?}", result);

        let capabilities = result.unwrap();
        assert_eq!(
            capabilities.available_elements.len(),
            REQUIRED_ELEMENTS.len() + STREAMING_ELEMENTS.len()
        );
    }

    #[test]
    fn test_missing_elements_consistent_with_registry() {
        gst::init().unwrap();

        let capabilities = discover_plugins();
        let missing = missing_elements(true);

        for element in REQUIRED_ELEMENTS.iter().chain(STREAMING_ELEMENTS) {
            assert_eq!(capabilities.has_element(element), !missing.contains(element));
        }
        assert!(missing_elements(false)
            .iter()
            .all(|e| REQUIRED_ELEMENTS.contains(e)));
    }

    #[test]
    fn test_make_element() {
        gst::init().unwrap();

        let identity = make_element("identity", "probe").unwrap();
        assert_eq!(identity.name(), "probe");

        let err = make_element("no-such-factory", "ghost").unwrap_err();
        assert!(matches!(err, Error::Construction { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_downstream_elements() {
        gst::init().unwrap();

        let pipeline = gst::Pipeline::new();
        let a = make_element("identity", "a").unwrap();
        let b = make_element("identity", "b").unwrap();
        let c = make_element("fakesink", "c").unwrap();
        let d = make_element("fakesink", "d").unwrap();
        pipeline.add_many([&a, &b, &c, &d]).unwrap();
        gst::Element::link_many([&a, &b, &c]).unwrap();

        let reachable = downstream_elements(&a);
        assert_eq!(reachable, vec!["b".to_string(), "c".to_string()]);
        assert!(downstream_elements(&c).is_empty());
        assert!(!reachable.contains(&"d".to_string()));
    }
}
