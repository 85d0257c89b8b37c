//! Tile placement for the three-source grid.
//!
//! Every source is scaled to half the output resolution. The first tile sits on
//! the left, vertically centred, the other two are stacked on the right:
//!
//! ```text
//!  +-----------+-----------+
//!  |           |  tile 2   |
//!  |  tile 1   +-----------+
//!  |           |  tile 3   |
//!  +-----------+-----------+
//! ```
//!
//! All values use truncating integer division, without any rounding fix-up.

use gst_video::VideoFormat;

/// Frame rate every source is normalised to before mixing.
pub const FRAMERATE: (i32, i32) = (25, 1);

/// Size and position of one composited source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGeometry {
    pub width: i32,
    pub height: i32,
    pub x: i32,
    pub y: i32,
}

/// Raw format every source is scaled to, shared by all three tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaledFormat {
    pub width: i32,
    pub height: i32,
    pub format: VideoFormat,
    pub framerate: (i32, i32),
    pub pixel_aspect_ratio: (i32, i32),
}

impl ScaledFormat {
    /// Caps for the per-source capsfilter.
    pub fn caps(&self) -> gst::Caps {
        gst_video::VideoCapsBuilder::new()
            .format(self.format)
            .width(self.width)
            .height(self.height)
            .framerate(gst::Fraction::new(self.framerate.0, self.framerate.1))
            .pixel_aspect_ratio(gst::Fraction::new(
                self.pixel_aspect_ratio.0,
                self.pixel_aspect_ratio.1,
            ))
            .build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub scaled: ScaledFormat,
    pub tiles: [TileGeometry; 3],
}

/// Compute the grid for an output of `width` x `height`.
///
/// Callers pass dimensions that already went through config validation.
pub fn plan(width: i32, height: i32) -> Layout {
    let half_width = width / 2;
    let half_height = height / 2;

    let tile = |x, y| TileGeometry {
        width: half_width,
        height: half_height,
        x,
        y,
    };

    Layout {
        scaled: ScaledFormat {
            width: half_width,
            height: half_height,
            format: VideoFormat::I420,
            framerate: FRAMERATE,
            pixel_aspect_ratio: (1, 1),
        },
        tiles: [
            tile(0, height / 4),
            tile(half_width, 0),
            tile(half_width, half_height),
        ],
    }
}
