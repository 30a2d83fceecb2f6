//! Decoder setup and the frame search loop.
//!
//! The loop reads packets of the selected stream only, drains every frame
//! the decoder yields after each packet, and classifies each frame against
//! the requested position with [`classify_frame`]. It stops at the first
//! accepted frame, or fails once the tier's frame budget or the input is
//! exhausted.

use std::fmt::{Debug, Formatter, Result as FmtResult};

use ffmpeg_next::{
    Rational, codec::context::Context as CodecContext, decoder::Video as VideoDecoder,
    format::Pixel, frame::Video as VideoFrame,
};
use ffmpeg_sys_next::AVCodecContext;

use crate::codec_cache::DecoderDescriptor;
use crate::demux::{DemuxContext, StreamDescriptor};
use crate::error::ThumbnailError;
use crate::hardware::{HardwareDevice, is_hardware_frame, transfer_hardware_frame};
use crate::quality::{DecoderProfile, FrameTolerances, QualityProfile};
use crate::utilities::frame_time_seconds;

/// What to do with a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameVerdict {
    /// Far too early: release without converting and keep decoding.
    Skip,
    /// Between the skip and accept windows: release and keep decoding.
    Reject,
    /// Close enough: convert this frame and stop.
    Accept,
}

/// Classify a frame presented at `frame_time` seconds for a request at
/// `position` seconds.
///
/// A request for position `0` accepts the first frame decoded.
///
/// # Example
///
/// ```
/// use thumbgrab::{FrameTolerances, FrameVerdict, classify_frame};
///
/// let tolerances = FrameTolerances { skip: 1.5, accept: 1.0 };
/// assert_eq!(classify_frame(2.0, 10.0, tolerances), FrameVerdict::Skip);
/// assert_eq!(classify_frame(8.7, 10.0, tolerances), FrameVerdict::Reject);
/// assert_eq!(classify_frame(9.2, 10.0, tolerances), FrameVerdict::Accept);
/// ```
pub fn classify_frame(frame_time: f64, position: f64, tolerances: FrameTolerances) -> FrameVerdict {
    if position > 0.0 && frame_time < position - tolerances.skip {
        FrameVerdict::Skip
    } else if position == 0.0 || frame_time >= position - tolerances.accept {
        FrameVerdict::Accept
    } else {
        FrameVerdict::Reject
    }
}

/// A decoded frame chosen for conversion, in system memory.
pub struct DecodedFrame {
    frame: VideoFrame,
    time: f64,
    frames_decoded: u32,
}

impl DecodedFrame {
    /// The decoded picture.
    pub fn frame(&self) -> &VideoFrame {
        &self.frame
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    /// The decoder's native pixel format.
    pub fn format(&self) -> Pixel {
        self.frame.format()
    }

    /// Number of frames decoded to find this one, itself included.
    pub fn frames_decoded(&self) -> u32 {
        self.frames_decoded
    }
}

impl Debug for DecodedFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DecodedFrame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("format", &self.format())
            .field("time", &self.time)
            .field("frames_decoded", &self.frames_decoded)
            .finish()
    }
}

/// Open a decoder for `stream` configured for the tier, optionally bound
/// to a hardware device.
///
/// # Errors
///
/// Returns [`ThumbnailError::CodecOpenFailure`] if the codec parameters
/// cannot be applied or the decoder refuses to open.
pub(crate) fn open_decoder(
    demux: &DemuxContext,
    stream: &StreamDescriptor,
    descriptor: DecoderDescriptor,
    profile: &DecoderProfile,
    hardware: Option<&HardwareDevice>,
) -> Result<VideoDecoder, ThumbnailError> {
    let container_stream = demux
        .input()
        .stream(stream.index)
        .ok_or(ThumbnailError::NoVideoStream)?;

    let mut codec_context = CodecContext::from_parameters(container_stream.parameters())
        .map_err(|error| {
            ThumbnailError::CodecOpenFailure(format!(
                "Failed to copy codec parameters for stream {}: {error}",
                stream.index
            ))
        })?;

    configure_decoder(&mut codec_context, profile);

    if let Some(device) = hardware {
        device.attach(&mut codec_context)?;
        log::debug!(
            "Binding {} decoder to {} device",
            descriptor.name(),
            device.device_type().name()
        );
    }

    let opened = codec_context
        .decoder()
        .open_as(descriptor.codec())
        .map_err(|error| {
            ThumbnailError::CodecOpenFailure(format!("{}: {error}", descriptor.name()))
        })?;

    opened
        .video()
        .map_err(|error| ThumbnailError::CodecOpenFailure(format!("{}: {error}", descriptor.name())))
}

fn configure_decoder(codec_context: &mut CodecContext, profile: &DecoderProfile) {
    let mut thread_type = 0;
    if profile.frame_threads {
        thread_type |= ffmpeg_sys_next::FF_THREAD_FRAME as i32;
    }
    if profile.slice_threads {
        thread_type |= ffmpeg_sys_next::FF_THREAD_SLICE as i32;
    }

    unsafe {
        let context_pointer = codec_context.as_mut_ptr() as *mut AVCodecContext;
        (*context_pointer).thread_count = i32::try_from(profile.thread_count).unwrap_or(0);
        (*context_pointer).thread_type = thread_type;
        if profile.low_delay {
            (*context_pointer).flags |= ffmpeg_sys_next::AV_CODEC_FLAG_LOW_DELAY as i32;
        }
        if profile.fast {
            (*context_pointer).flags2 |= ffmpeg_sys_next::AV_CODEC_FLAG2_FAST as i32;
        }
        (*context_pointer).skip_loop_filter = profile.skip_loop_filter.into();
        (*context_pointer).skip_idct = profile.skip_idct.into();
        (*context_pointer).skip_frame = profile.skip_frame.into();
    }
}

/// Search state for one extraction.
pub(crate) struct FrameSearch {
    position: f64,
    tolerances: FrameTolerances,
    frame_budget: u32,
    time_base: Rational,
    frames_decoded: u32,
    frames_skipped: u32,
}

impl FrameSearch {
    pub(crate) fn new(position: f64, stream: &StreamDescriptor, profile: &QualityProfile) -> Self {
        Self {
            position,
            tolerances: profile.tolerances,
            frame_budget: profile.frame_budget.max(1),
            time_base: stream.time_base,
            frames_decoded: 0,
            frames_skipped: 0,
        }
    }

    /// Decode from the current read position until a frame is accepted.
    ///
    /// # Errors
    ///
    /// - [`ThumbnailError::NoFrameFound`] when the budget or the input runs
    ///   out first.
    /// - [`ThumbnailError::ConversionFailure`] if an accepted hardware frame
    ///   cannot be copied to system memory.
    pub(crate) fn run(
        mut self,
        demux: &mut DemuxContext,
        stream_index: usize,
        decoder: &mut VideoDecoder,
    ) -> Result<DecodedFrame, ThumbnailError> {
        let mut frame = VideoFrame::empty();

        for (packet_stream, packet) in demux.input_mut().packets() {
            if packet_stream.index() != stream_index {
                continue;
            }

            if let Err(error) = decoder.send_packet(&packet) {
                log::debug!("Decoder rejected packet: {error}");
                continue;
            }

            if let Some(found) = self.drain(decoder, &mut frame)? {
                return Ok(found);
            }
            if self.budget_exhausted() {
                return Err(self.not_found());
            }
        }

        // End of input: collect whatever the decoder still buffers.
        if decoder.send_eof().is_ok() {
            if let Some(found) = self.drain(decoder, &mut frame)? {
                return Ok(found);
            }
        }

        Err(self.not_found())
    }

    fn drain(
        &mut self,
        decoder: &mut VideoDecoder,
        frame: &mut VideoFrame,
    ) -> Result<Option<DecodedFrame>, ThumbnailError> {
        while !self.budget_exhausted() && decoder.receive_frame(frame).is_ok() {
            self.frames_decoded += 1;
            let frame_time = frame_time_seconds(frame, self.time_base);

            match classify_frame(frame_time, self.position, self.tolerances) {
                FrameVerdict::Skip => self.frames_skipped += 1,
                FrameVerdict::Reject => {}
                FrameVerdict::Accept => {
                    log::debug!(
                        "Found frame at {frame_time:.3}s (target {:.3}s) after {} frames, {} skipped",
                        self.position,
                        self.frames_decoded,
                        self.frames_skipped
                    );
                    let accepted = std::mem::replace(frame, VideoFrame::empty());
                    let accepted = if is_hardware_frame(&accepted) {
                        transfer_hardware_frame(&accepted)?
                    } else {
                        accepted
                    };
                    return Ok(Some(DecodedFrame {
                        frame: accepted,
                        time: frame_time,
                        frames_decoded: self.frames_decoded,
                    }));
                }
            }
        }
        Ok(None)
    }

    fn budget_exhausted(&self) -> bool {
        self.frames_decoded >= self.frame_budget
    }

    fn not_found(&self) -> ThumbnailError {
        ThumbnailError::NoFrameFound {
            position: self.position,
            frames_decoded: self.frames_decoded,
        }
    }
}
