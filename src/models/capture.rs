// Data structures for camera frames

/// A single video frame, as handed to the inference client
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub timestamp: i64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub format: PixelFormat,
}

/// Pixel format of captured frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    RGBA8,
    BGRA8,
}

impl RawFrame {
    /// Expected byte length for the frame dimensions (4 bytes per pixel)
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// Pixel data in RGBA order, swizzling BGRA frames
    pub fn to_rgba(&self) -> Vec<u8> {
        match self.format {
            PixelFormat::RGBA8 => self.data.clone(),
            PixelFormat::BGRA8 => {
                let mut rgba = Vec::with_capacity(self.data.len());
                for chunk in self.data.chunks_exact(4) {
                    rgba.push(chunk[2]); // R
                    rgba.push(chunk[1]); // G
                    rgba.push(chunk[0]); // B
                    rgba.push(chunk[3]); // A
                }
                rgba
            }
        }
    }
}

/// Error types for frame acquisition
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("No frames available in {0}")]
    NoFrames(String),

    #[error("Failed to read frame: {0}")]
    ReadFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type CaptureResult<T> = Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgra_to_rgba() {
        let frame = RawFrame {
            timestamp: 0,
            width: 2,
            height: 1,
            data: vec![1, 2, 3, 255, 10, 20, 30, 128],
            format: PixelFormat::BGRA8,
        };
        assert_eq!(frame.expected_len(), 8);
        assert_eq!(frame.to_rgba(), vec![3, 2, 1, 255, 30, 20, 10, 128]);
    }

    #[test]
    fn test_rgba_passthrough() {
        let frame = RawFrame {
            timestamp: 0,
            width: 1,
            height: 1,
            data: vec![5, 6, 7, 8],
            format: PixelFormat::RGBA8,
        };
        assert_eq!(frame.to_rgba(), frame.data);
    }
}
