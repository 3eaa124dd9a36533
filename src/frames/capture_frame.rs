/// Number of bytes a single receive can deliver; longer frames are truncated by the kernel.
pub const FRAME_CAPACITY: usize = 65536;

/// Representation of a link-layer frame as delivered by one receive on the capture socket.
/// Frames of this kind are opaque: header bytes included, nothing interpreted.
pub struct CaptureFrame {
    pub frame: Box<[u8]>,
    pub actual_bytes: usize,
}

impl CaptureFrame {
    pub fn new() -> Self {
        Self {
            frame: vec![0; FRAME_CAPACITY].into_boxed_slice(),
            actual_bytes: 0,
        }
    }

    pub fn actual_frame(&self) -> &[u8] {
        &self.frame[..self.actual_bytes]
    }
}

impl Default for CaptureFrame {
    fn default() -> Self {
        Self::new()
    }
}
