pub mod common;
pub mod scenarios;

use three_video_stream::StreamConfig;

pub fn init_test_environment() {
    // Initialize GStreamer once for all tests
    gst::init().ok();

    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

pub fn create_test_config(api_key: Option<&str>) -> StreamConfig {
    let mut config = StreamConfig::default();
    config.sources.location_1 = "/nonexistent/left.mp4".to_string();
    config.sources.location_2 = "/nonexistent/top-right.mp4".to_string();
    config.sources.location_3 = "/nonexistent/bottom-right.mp4".to_string();
    config.streaming.api_key = api_key.map(str::to_string);
    config
}
