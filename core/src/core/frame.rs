/// Native LCD width in pixels.
pub const FRAME_WIDTH: usize = 160;

/// Native LCD height in pixels.
pub const FRAME_HEIGHT: usize = 144;

/// RGB24: 3 bytes per pixel (R, G, B).
pub const BYTES_PER_PIXEL: usize = 3;

/// Size of one complete frame buffer in bytes.
pub const FRAME_BYTES: usize = FRAME_WIDTH * FRAME_HEIGHT * BYTES_PER_PIXEL;

/// One completed video output.
///
/// Pixels are stored left-to-right, top-to-bottom, 3 bytes per pixel
/// (R, G, B), the same layout `render_frame` style APIs hand to a video
/// backend. The sequence number is stamped by the frame exchange when the
/// frame is published; a fresh buffer starts at 0.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pixels: Box<[u8]>,
    sequence: u64,
}

impl Frame {
    /// Create a black frame.
    pub fn new() -> Self {
        Self {
            pixels: vec![0; FRAME_BYTES].into_boxed_slice(),
            sequence: 0,
        }
    }

    /// Build a frame from raw RGB24 pixels. Returns `None` unless `pixels`
    /// is exactly [`FRAME_BYTES`] long.
    pub fn from_pixels(pixels: &[u8]) -> Option<Self> {
        if pixels.len() != FRAME_BYTES {
            return None;
        }
        Some(Self {
            pixels: pixels.into(),
            sequence: 0,
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Publication order of this frame (1 for the first published frame).
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(crate) fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }

    /// Overwrite the pixel data from `src`.
    ///
    /// A short `src` leaves the rest of the frame black; bytes past
    /// [`FRAME_BYTES`] are ignored. Nothing of the previous contents
    /// survives either way.
    pub fn copy_from(&mut self, src: &[u8]) {
        let len = src.len().min(FRAME_BYTES);
        self.pixels[..len].copy_from_slice(&src[..len]);
        self.pixels[len..].fill(0);
    }

    /// RGB triple at (`x`, `y`). Panics if out of bounds.
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let offset = (y * FRAME_WIDTH + x) * BYTES_PER_PIXEL;
        [
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
        ]
    }

    /// Fill every pixel with one color.
    pub fn fill(&mut self, rgb: [u8; 3]) {
        for px in self.pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&rgb);
        }
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &FRAME_WIDTH)
            .field("height", &FRAME_HEIGHT)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_black() {
        let frame = Frame::new();
        assert_eq!(frame.pixels().len(), FRAME_BYTES);
        assert!(frame.pixels().iter().all(|&b| b == 0));
        assert_eq!(frame.sequence(), 0);
    }

    #[test]
    fn from_pixels_rejects_wrong_size() {
        assert!(Frame::from_pixels(&[0; 10]).is_none());
        assert!(Frame::from_pixels(&vec![7; FRAME_BYTES]).is_some());
    }

    #[test]
    fn copy_from_short_slice_blanks_tail() {
        let mut frame = Frame::new();
        frame.fill([9, 9, 9]);
        frame.copy_from(&[1, 2, 3]);
        assert_eq!(frame.pixel(0, 0), [1, 2, 3]);
        assert_eq!(frame.pixel(1, 0), [0, 0, 0]);
        assert_eq!(frame.pixel(159, 143), [0, 0, 0]);
    }

    #[test]
    fn pixel_addresses_rows() {
        let mut frame = Frame::new();
        let offset = (FRAME_WIDTH + 2) * BYTES_PER_PIXEL;
        frame.pixels_mut()[offset..offset + 3].copy_from_slice(&[10, 20, 30]);
        assert_eq!(frame.pixel(2, 1), [10, 20, 30]);
    }
}
