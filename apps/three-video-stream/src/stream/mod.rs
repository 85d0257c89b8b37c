use gst::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{StreamConfig, HEIGHT_RANGE, WIDTH_RANGE};
use crate::graph::{self, CompositorGraph};
use crate::resolver::PortResolver;
use crate::{Error, Result};

/// Configuration surface of the compositor.
///
/// Settings accumulate until [`set_ready_to_play`](Self::set_ready_to_play)
/// commits them: the graph is then built once, the decoders get their pad
/// resolver, and the pipeline becomes available to whoever drives its
/// lifecycle. The topology never changes afterwards.
#[derive(Debug, Default)]
pub struct ThreeVideoStream {
    config: StreamConfig,
    ready_to_play: bool,
    graph: Option<CompositorGraph>,
    resolver: Option<Arc<PortResolver>>,
}

impl ThreeVideoStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: StreamConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    fn ensure_uncommitted(&self, setting: &str) -> Result<()> {
        if self.ready_to_play {
            warn!("Ignoring change of {} after the pipeline was built", setting);
            return Err(Error::Config(format!(
                "{} cannot be changed once the pipeline is built",
                setting
            )));
        }
        Ok(())
    }

    /// Source of tile `index`, 1 for the left tile, 2 and 3 for the right column.
    pub fn set_location(&mut self, index: usize, location: &str) -> Result<()> {
        self.ensure_uncommitted("source location")?;

        let sources = &mut self.config.sources;
        let slot = match index {
            1 => &mut sources.location_1,
            2 => &mut sources.location_2,
            3 => &mut sources.location_3,
            _ => {
                return Err(Error::Config(format!(
                    "source index {} outside of [1, 3]",
                    index
                )))
            }
        };
        *slot = location.to_string();
        debug!("location {} set to {}", index, location);
        Ok(())
    }

    pub fn set_api_key(&mut self, api_key: Option<&str>) -> Result<()> {
        self.ensure_uncommitted("api key")?;
        self.config.streaming.api_key = api_key.map(str::to_string);
        Ok(())
    }

    pub fn set_ingest_server(&mut self, server: &str) -> Result<()> {
        self.ensure_uncommitted("ingest server")?;
        self.config.streaming.ingest_server = server.to_string();
        Ok(())
    }

    pub fn set_width(&mut self, width: i32) -> Result<()> {
        self.ensure_uncommitted("width")?;
        if !WIDTH_RANGE.contains(&width) {
            return Err(Error::Config(format!(
                "output width {} outside of [{}, {}]",
                width,
                WIDTH_RANGE.start(),
                WIDTH_RANGE.end()
            )));
        }
        self.config.output.width = width;
        Ok(())
    }

    pub fn set_height(&mut self, height: i32) -> Result<()> {
        self.ensure_uncommitted("height")?;
        if !HEIGHT_RANGE.contains(&height) {
            return Err(Error::Config(format!(
                "output height {} outside of [{}, {}]",
                height,
                HEIGHT_RANGE.start(),
                HEIGHT_RANGE.end()
            )));
        }
        self.config.output.height = height;
        Ok(())
    }

    pub fn ready_to_play(&self) -> bool {
        self.ready_to_play
    }

    /// One-shot commit. `true` validates the accumulated settings and builds
    /// the graph; repeating a value is a no-op, and `false` after a commit only
    /// logs. A failed build leaves the stream uncommitted.
    pub fn set_ready_to_play(&mut self, ready: bool) -> Result<()> {
        if ready == self.ready_to_play {
            return Ok(());
        }

        if !ready {
            info!("Stopping");
            return Ok(());
        }

        self.config.validate()?;
        let with_streaming = self.config.with_streaming();
        if !with_streaming {
            warn!("No API key given, only the local preview will run");
        }

        let graph = graph::build(&self.config, with_streaming)?;
        let resolver = Arc::new(PortResolver::for_graph(&graph));
        resolver.attach(&graph);

        info!("Pipeline {} built", graph.pipeline().name());
        self.graph = Some(graph);
        self.resolver = Some(resolver);
        self.ready_to_play = true;
        Ok(())
    }

    /// The built pipeline, once committed.
    pub fn pipeline(&self) -> Option<&gst::Pipeline> {
        self.graph.as_ref().map(CompositorGraph::pipeline)
    }

    pub fn graph(&self) -> Option<&CompositorGraph> {
        self.graph.as_ref()
    }

    pub fn resolver(&self) -> Option<&Arc<PortResolver>> {
        self.resolver.as_ref()
    }
}
