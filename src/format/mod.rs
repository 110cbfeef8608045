//! Container formats: MPEG-TS demultiplexing and fragmented MP4 output.

pub mod mp4;
pub mod ts;

/// A synchronous, push-driven pipeline stage.
///
/// Stages never fail out of `push`: faults that only affect part of the
/// input are reported as output values so the rest of the segment still
/// flows downstream.
pub trait Stream<Input> {
    /// Values emitted for the next stage.
    type Output;

    /// Feeds one input value, appending any completed outputs to `out`.
    fn push(&mut self, input: Input, out: &mut Vec<Self::Output>);

    /// Flushes buffered state at end of input.
    fn end(&mut self, out: &mut Vec<Self::Output>);
}
