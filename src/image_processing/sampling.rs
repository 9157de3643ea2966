use std::fmt;

/// Default bounding box used for the first, downsampled decode
pub const DEFAULT_MAX_WIDTH: u32 = 1024;
pub const DEFAULT_MAX_HEIGHT: u32 = 1024;

/// Raw pixel bounds of a source image, read from its header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl ImageDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn total_pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for ImageDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Maximum width/height an image may occupy after a decode step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    max_width: u32,
    max_height: u32,
}

impl BoundingBox {
    /// Returns `None` when either side is zero
    pub fn new(max_width: u32, max_height: u32) -> Option<Self> {
        if max_width == 0 || max_height == 0 {
            return None;
        }
        Some(Self {
            max_width,
            max_height,
        })
    }

    pub fn max_width(&self) -> u32 {
        self.max_width
    }

    pub fn max_height(&self) -> u32 {
        self.max_height
    }

    /// Parse a `WIDTHxHEIGHT` string such as `1024x1024`
    pub fn parse(value: &str) -> Result<Self, String> {
        let parts: Vec<&str> = value.trim().split('x').collect();
        if parts.len() != 2 {
            return Err(format!(
                "Invalid bounds format '{}'. Use WIDTHxHEIGHT (e.g., 1024x1024)",
                value
            ));
        }

        let width = parts[0]
            .parse::<u32>()
            .map_err(|_| format!("Invalid width: '{}'", parts[0]))?;
        let height = parts[1]
            .parse::<u32>()
            .map_err(|_| format!("Invalid height: '{}'", parts[1]))?;

        Self::new(width, height)
            .ok_or_else(|| format!("Bounds must be greater than zero, got: {}", value))
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
        }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.max_width, self.max_height)
    }
}

/// Compute the decode-time downsampling divisor for an image
///
/// Picks the smaller of the rounded height/width ratios so the decoded image
/// is never smaller than the box on either axis, then keeps increasing the
/// factor while the decoded pixel count would exceed twice the box area.
/// The second step catches panoramas and other extreme aspect ratios.
pub fn calculate_in_sample_size(dimensions: ImageDimensions, bounds: BoundingBox) -> u32 {
    let ImageDimensions { width, height } = dimensions;
    let req_width = bounds.max_width();
    let req_height = bounds.max_height();

    if height <= req_height && width <= req_width {
        return 1;
    }

    // f64::round rounds half away from zero, which is half-up for positive ratios
    let height_ratio = (height as f64 / req_height as f64).round() as u32;
    let width_ratio = (width as f64 / req_width as f64).round() as u32;
    let mut in_sample_size = height_ratio.min(width_ratio).max(1);

    let total_pixels = dimensions.total_pixels() as f64;
    let total_req_pixels_cap = req_width as f64 * req_height as f64 * 2.0;

    while total_pixels / (in_sample_size as f64 * in_sample_size as f64) > total_req_pixels_cap {
        in_sample_size += 1;
    }

    in_sample_size
}

/// Output dimensions after decoding at `factor`
pub fn sampled_dimensions(dimensions: ImageDimensions, factor: u32) -> ImageDimensions {
    let factor = factor.max(1);
    ImageDimensions {
        width: (dimensions.width / factor).max(1),
        height: (dimensions.height / factor).max(1),
    }
}
