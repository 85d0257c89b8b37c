use gst::prelude::*;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::info;

use super::common::*;
use three_video_stream::gst_utils::downstream_elements;
use three_video_stream::resolver::LinkState;
use three_video_stream::{LifecycleController, StreamConfig, ThreeVideoStream};

/// Configuration file, then commit, then the preview-only topology
#[tokio::test]
async fn test_preview_pipeline_from_config_file() {
    super::init_test_environment();
    if !plugins_available(false) {
        return;
    }

    let file = write_config(
        r#"
[sources]
location_1 = "/nonexistent/left.mp4"
location_2 = "/nonexistent/top-right.mp4"
location_3 = "rtsp://camera.local/stream"

[output]
width = 640
height = 480
"#,
    );
    let config = StreamConfig::from_file(file.path()).await.unwrap();

    let mut stream = ThreeVideoStream::from_config(config);
    stream.set_ready_to_play(true).unwrap();

    let graph = stream.graph().unwrap();
    let pipeline = stream.pipeline().unwrap();
    assert!(pipeline.by_name("tee").is_none());
    assert_eq!(
        downstream_elements(graph.mixer()),
        vec!["convert_preview".to_string(), "sink_preview".to_string()]
    );

    let placements: Vec<(i32, i32)> = graph
        .mixer_pads()
        .iter()
        .map(|pad| (pad.property::<i32>("xpos"), pad.property::<i32>("ypos")))
        .collect();
    assert_eq!(placements, vec![(0, 120), (320, 0), (320, 240)]);
}

/// The streaming branch only exists when a key is configured
#[tokio::test]
async fn test_streaming_pipeline_from_config_file() {
    super::init_test_environment();
    if !plugins_available(true) {
        return;
    }

    let file = write_config(
        r#"
[sources]
location_1 = "/nonexistent/left.mp4"
location_2 = "/nonexistent/top-right.mp4"
location_3 = "/nonexistent/bottom-right.mp4"

[streaming]
api_key = "live_test"
ingest_server = "rtmp://127.0.0.1/app/"

[streaming.encoder]
bitrate_kbps = 1200
"#,
    );
    let config = StreamConfig::from_file(file.path()).await.unwrap();

    let mut stream = ThreeVideoStream::from_config(config);
    stream.set_ready_to_play(true).unwrap();

    let pipeline = stream.pipeline().unwrap();
    let encoder = pipeline.by_name("encoder_streaming").unwrap();
    assert_eq!(encoder.property::<u32>("bitrate"), 1200);

    let sink = pipeline.by_name("sink_streaming").unwrap();
    assert_eq!(
        sink.property::<Option<String>>("location").as_deref(),
        Some("rtmp://127.0.0.1/app/live_test")
    );

    let reachable = downstream_elements(stream.graph().unwrap().mixer());
    for name in ["tee", "queue_streaming", "muxer_streaming", "sink_streaming", "sink_preview"] {
        assert!(reachable.contains(&name.to_string()), "{} not reachable", name);
    }
}

/// pad-added on the real decoders goes through the attached resolver
#[tokio::test]
async fn test_decoder_pads_are_resolved() {
    super::init_test_environment();
    if !plugins_available(false) {
        return;
    }

    let mut stream = ThreeVideoStream::from_config(super::create_test_config(None));
    stream.set_ready_to_play(true).unwrap();

    let graph = stream.graph().unwrap();
    let resolver = stream.resolver().unwrap();
    let [left, top_right, _] = graph.decoders();

    let audio = decoder_pad("audio_0");
    left.emit_by_name::<()>("pad-added", &[&audio]);
    assert!(!audio.is_linked());
    assert_eq!(resolver.link_state("decodebin1"), Some(LinkState::Unlinked));

    let video = decoder_pad("video_0");
    left.emit_by_name::<()>("pad-added", &[&video]);
    assert_eq!(peer_element_name(&video).as_deref(), Some("videoscale1"));
    assert_eq!(resolver.link_state("decodebin1"), Some(LinkState::Linked));

    let duplicate = decoder_pad("video_1");
    left.emit_by_name::<()>("pad-added", &[&duplicate]);
    assert!(!duplicate.is_linked());

    let other = decoder_pad("video_0");
    top_right.emit_by_name::<()>("pad-added", &[&other]);
    assert_eq!(peer_element_name(&other).as_deref(), Some("videoscale2"));
    assert_eq!(resolver.link_state("decodebin3"), Some(LinkState::Unlinked));
}

/// Unreadable sources end the run with a fatal error and a released pipeline
#[tokio::test]
async fn test_missing_sources_are_fatal() {
    super::init_test_environment();
    if !plugins_available(false) {
        return;
    }

    let mut stream = ThreeVideoStream::from_config(super::create_test_config(None));
    stream.set_ready_to_play(true).unwrap();
    let pipeline = stream.pipeline().unwrap().clone();

    let (_tx, rx) = mpsc::unbounded_channel();
    let result = timeout(RUN_TIMEOUT, LifecycleController::new(pipeline.clone()).run(rx))
        .await
        .expect("event loop did not stop");

    info!("Run finished with {:?}", result);
    let err = result.unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(pipeline.current_state(), gst::State::Null);
}
