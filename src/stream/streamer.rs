use std::io::{self, ErrorKind, Write};
use std::thread;

use thiserror::Error;

use crate::capture::FrameSource;
use crate::frames::capture_frame::CaptureFrame;
use crate::stream::record::write_record;
use crate::stream::Shutdown;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("write: cannot emit record on the output stream: {0}")]
    Output(#[source] io::Error),
}

/// What was emitted before the loop was asked to stop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub records: u64,
    pub payload_bytes: u64,
}

/// Moves frames from `source` to `sink` as length-prefixed records until `shutdown` is raised.
///
/// Each record is flushed before the next receive starts. Receives that yield nothing or fail
/// are dropped silently and retried; any failure to write or flush the sink ends the loop.
pub fn stream_frames<S, W>(
    source: &mut S,
    sink: &mut W,
    shutdown: &Shutdown,
) -> Result<StreamSummary, StreamError>
where
    S: FrameSource + ?Sized,
    W: Write + ?Sized,
{
    let mut capture_frame = CaptureFrame::new();
    let mut summary = StreamSummary::default();

    while !shutdown.is_triggered() {
        // wait until a frame shows up on the interface
        capture_frame.actual_bytes = match source.recv_frame(&mut capture_frame.frame) {
            Ok(num_bytes) => num_bytes.min(capture_frame.frame.len()),
            Err(err) => {
                absorb_receive_error(&err);
                0
            }
        };

        if capture_frame.actual_bytes > 0 {
            let payload = capture_frame.actual_frame();
            write_record(sink, payload).map_err(|err| StreamError::Output(err.into()))?;
            sink.flush().map_err(StreamError::Output)?;

            summary.records += 1;
            summary.payload_bytes += payload.len() as u64;
            tracing::trace!(len = payload.len(), "frame forwarded");
        }
    }

    Ok(summary)
}

fn absorb_receive_error(err: &io::Error) {
    match err.kind() {
        // receive timeout or signal: the call did block, go straight back to it
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted => {}
        _ => {
            tracing::trace!(error = %err, "receive failed, retrying");
            thread::yield_now();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::{self, ErrorKind, Write};

    use crate::capture::FrameSource;
    use crate::frames::capture_frame::FRAME_CAPACITY;
    use crate::stream::record::RecordReader;
    use crate::stream::streamer::{stream_frames, StreamError, StreamSummary};
    use crate::stream::Shutdown;

    enum Step {
        Frame(Vec<u8>),
        Fail(ErrorKind),
    }

    /// Replays a fixed receive sequence, then requests shutdown.
    struct ScriptedSource {
        steps: VecDeque<Step>,
        shutdown: Shutdown,
        calls: usize,
    }

    impl ScriptedSource {
        fn new(steps: Vec<Step>, shutdown: &Shutdown) -> Self {
            Self {
                steps: steps.into(),
                shutdown: shutdown.clone(),
                calls: 0,
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn recv_frame(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.calls += 1;
            match self.steps.pop_front() {
                Some(Step::Frame(frame)) => {
                    let len = frame.len().min(buf.len());
                    buf[..len].copy_from_slice(&frame[..len]);
                    Ok(len)
                }
                Some(Step::Fail(kind)) => Err(kind.into()),
                None => {
                    self.shutdown.trigger();
                    Err(ErrorKind::WouldBlock.into())
                }
            }
        }
    }

    /// Keeps every byte written and the output length at each flush.
    #[derive(Default)]
    struct RecordingSink {
        data: Vec<u8>,
        flushed_at: Vec<usize>,
    }

    impl Write for RecordingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushed_at.push(self.data.len());
            Ok(())
        }
    }

    struct ClosedSink;

    impl Write for ClosedSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn record(payload: &[u8]) -> Vec<u8> {
        let mut out = (payload.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(payload);
        out
    }

    fn run(steps: Vec<Step>) -> (StreamSummary, RecordingSink) {
        let shutdown = Shutdown::new();
        let mut source = ScriptedSource::new(steps, &shutdown);
        let mut sink = RecordingSink::default();
        let summary = stream_frames(&mut source, &mut sink, &shutdown).unwrap();
        (summary, sink)
    }

    #[test]
    fn test_zero_length_receive_emits_nothing() {
        let (summary, sink) = run(vec![
            Step::Frame(vec![0x11; 10]),
            Step::Frame(vec![]),
            Step::Frame(vec![0x22; 42]),
        ]);

        let mut expected = record(&[0x11; 10]);
        expected.extend(record(&[0x22; 42]));
        assert_eq!(sink.data, expected);
        assert_eq!(
            summary,
            StreamSummary {
                records: 2,
                payload_bytes: 52
            }
        );
    }

    #[test]
    fn test_records_follow_receive_order() {
        let frames: Vec<Vec<u8>> = (1..=20u8).map(|i| vec![i; usize::from(i) * 3]).collect();
        let (_, sink) = run(frames.iter().cloned().map(Step::Frame).collect());

        let decoded: Vec<Vec<u8>> = RecordReader::with_max_len(sink.data.as_slice(), FRAME_CAPACITY)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(decoded, frames);
    }

    #[test]
    fn test_every_record_is_flushed_whole() {
        let (_, sink) = run(vec![
            Step::Frame(vec![1; 5]),
            Step::Frame(vec![]),
            Step::Frame(vec![2; 7]),
        ]);
        assert_eq!(sink.flushed_at, vec![4 + 5, 4 + 5 + 4 + 7]);
    }

    #[test]
    fn test_receive_errors_are_skipped() {
        let (summary, sink) = run(vec![
            Step::Fail(ErrorKind::WouldBlock),
            Step::Frame(vec![0xaa; 3]),
            Step::Fail(ErrorKind::Interrupted),
            Step::Fail(ErrorKind::Other),
            Step::Fail(ErrorKind::NotConnected),
            Step::Frame(vec![0xbb; 4]),
        ]);

        let mut expected = record(&[0xaa; 3]);
        expected.extend(record(&[0xbb; 4]));
        assert_eq!(sink.data, expected);
        assert_eq!(summary.records, 2);
    }

    #[test]
    fn test_frame_at_capacity_is_not_truncated() {
        let frame: Vec<u8> = (0..FRAME_CAPACITY).map(|i| (i % 251) as u8).collect();
        let (_, sink) = run(vec![Step::Frame(frame.clone())]);

        assert_eq!(sink.data.len(), FRAME_CAPACITY + 4);
        assert_eq!(&sink.data[..4], &[0, 1, 0, 0]);
        assert_eq!(&sink.data[4..], frame.as_slice());
    }

    #[test]
    fn test_oversized_frame_is_cut_at_capacity() {
        let (_, sink) = run(vec![Step::Frame(vec![7; FRAME_CAPACITY + 100])]);
        assert_eq!(&sink.data[..4], &[0, 1, 0, 0]);
        assert_eq!(sink.data.len(), FRAME_CAPACITY + 4);
    }

    #[test]
    fn test_shutdown_before_start_skips_receive() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let mut source = ScriptedSource::new(vec![Step::Frame(vec![1; 8])], &shutdown);
        let mut sink = RecordingSink::default();

        let summary = stream_frames(&mut source, &mut sink, &shutdown).unwrap();
        assert_eq!(summary, StreamSummary::default());
        assert_eq!(source.calls, 0);
        assert!(sink.data.is_empty());
    }

    #[test]
    fn test_closed_output_is_fatal() {
        let shutdown = Shutdown::new();
        let mut source = ScriptedSource::new(
            vec![Step::Frame(vec![1; 8]), Step::Frame(vec![2; 8])],
            &shutdown,
        );

        let err = stream_frames(&mut source, &mut ClosedSink, &shutdown).unwrap_err();
        assert!(matches!(err, StreamError::Output(ref e) if e.kind() == ErrorKind::BrokenPipe));
        assert_eq!(source.calls, 1);
    }
}
