use std::io;

pub mod binder;

/// Anything that hands out one link-layer frame per call.
pub trait FrameSource {
    /// Blocks until a frame is available and copies it into `buf`, returning its length.
    ///
    /// A result of `Ok(0)` or an error is not terminal: the caller is expected to try again.
    fn recv_frame(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}
