use ndarray::ArrayView3;

use super::region::DetectedRegion;

/// A single camera or rendered frame: contiguous RGB bytes in row-major order.
///
/// Pixel format conversion happens where frames enter or leave the process
/// (decoders, GPU readback, encoders); everything in between sees RGB.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    /// A frame filled with a single RGB color.
    pub fn filled(width: u32, height: u32, color: [u8; 3], index: usize) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * 3);
        for _ in 0..pixels {
            data.extend_from_slice(&color);
        }
        Self::new(data, width, height, 3, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// RGB value at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height || self.channels < 3 {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * self.channels as usize;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Draws the outline of `region` with the given stroke thickness.
    ///
    /// The stroke grows inward from the region edges. Parts of the outline
    /// outside the frame are dropped; degenerate regions draw nothing.
    pub fn stroke_rect(&mut self, region: &DetectedRegion, color: [u8; 3], thickness: u32) {
        if region.width <= 0 || region.height <= 0 || thickness == 0 || self.channels < 3 {
            return;
        }
        let t = thickness as i64;
        let x0 = region.x as i64;
        let y0 = region.y as i64;
        let x1 = x0 + region.width as i64;
        let y1 = y0 + region.height as i64;

        self.fill_span(x0, y0, x1, (y0 + t).min(y1), color);
        self.fill_span(x0, (y1 - t).max(y0), x1, y1, color);
        self.fill_span(x0, y0, (x0 + t).min(x1), y1, color);
        self.fill_span((x1 - t).max(x0), y0, x1, y1, color);
    }

    fn fill_span(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: [u8; 3]) {
        let w = self.width as i64;
        let h = self.height as i64;
        let channels = self.channels as usize;
        for y in y0.max(0)..y1.min(h) {
            for x in x0.max(0)..x1.min(w) {
                let idx = (y as usize * self.width as usize + x as usize) * channels;
                self.data[idx..idx + 3].copy_from_slice(&color);
            }
        }
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
