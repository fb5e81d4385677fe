//! Decoded and encoded media frames.
//!
//! Frames are built by the transport, owned by the engine, and lent to the
//! event handler as `&AudioFrame` / `&VideoFrame` for exactly one callback.
//! None of the frame types implement `Clone`; a handler that needs the data
//! after returning copies it out (`buffer().to_vec()`).

use super::error::RecordingError;

/// Wire tag of an audio frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum AudioFrameType {
    RawPcm = 0,
    Aac = 1,
}

/// Wire tag of a video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum VideoFrameType {
    RawYuv = 0,
    H264 = 1,
}

/// Raw interleaved PCM audio.
#[derive(Debug, PartialEq, Eq)]
pub struct AudioPcmFrame {
    /// Timestamp of the frame in milliseconds.
    pub frame_ms: u32,
    pub channels: u32,
    pub sample_bits: u32,
    pub sample_rate: u32,
    /// Samples per channel.
    pub samples: u32,
    buffer: Vec<u8>,
}

impl AudioPcmFrame {
    /// Zeroed mono 16-bit frame sized for `samples` samples.
    pub fn new(frame_ms: u32, sample_rate: u32, samples: u32) -> Self {
        let channels = 1;
        let sample_bits = 16;
        let size = Self::expected_size(channels, sample_bits, samples);
        Self {
            frame_ms,
            channels,
            sample_bits,
            sample_rate,
            samples,
            buffer: vec![0; size],
        }
    }

    /// Wrap decoded PCM. The buffer length must match the sample layout.
    pub fn with_buffer(
        frame_ms: u32,
        channels: u32,
        sample_bits: u32,
        sample_rate: u32,
        samples: u32,
        buffer: Vec<u8>,
    ) -> Result<Self, RecordingError> {
        if channels == 0 || sample_bits == 0 || sample_bits % 8 != 0 {
            return Err(RecordingError::InvalidArgument(format!(
                "bad pcm layout: {} channels, {} bits",
                channels, sample_bits
            )));
        }
        let expected = Self::expected_size(channels, sample_bits, samples);
        if buffer.len() != expected {
            return Err(RecordingError::InvalidArgument(format!(
                "pcm buffer is {} bytes, layout needs {}",
                buffer.len(),
                expected
            )));
        }
        Ok(Self {
            frame_ms,
            channels,
            sample_bits,
            sample_rate,
            samples,
            buffer,
        })
    }

    fn expected_size(channels: u32, sample_bits: u32, samples: u32) -> usize {
        samples as usize * (sample_bits / 8) as usize * channels as usize
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }
}

/// AAC-encoded audio, opaque to the engine.
#[derive(Debug, PartialEq, Eq)]
pub struct AudioAacFrame {
    pub frame_ms: u32,
    buffer: Vec<u8>,
}

impl AudioAacFrame {
    pub fn new(frame_ms: u32, buffer: Vec<u8>) -> Self {
        Self { frame_ms, buffer }
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }
}

/// One audio frame; the variant decides which fields exist.
#[derive(Debug, PartialEq, Eq)]
pub enum AudioFrame {
    Pcm(AudioPcmFrame),
    Aac(AudioAacFrame),
}

impl AudioFrame {
    pub fn frame_type(&self) -> AudioFrameType {
        match self {
            Self::Pcm(_) => AudioFrameType::RawPcm,
            Self::Aac(_) => AudioFrameType::Aac,
        }
    }

    pub fn frame_ms(&self) -> u32 {
        match self {
            Self::Pcm(f) => f.frame_ms,
            Self::Aac(f) => f.frame_ms,
        }
    }

    pub fn buffer(&self) -> &[u8] {
        match self {
            Self::Pcm(f) => f.buffer(),
            Self::Aac(f) => f.buffer(),
        }
    }
}

/// Planar I420 video: a Y plane followed by U and V planes at half resolution.
///
/// Geometry is fixed at construction and always matches the buffer, so the
/// plane accessors never go out of bounds.
#[derive(Debug, PartialEq, Eq)]
pub struct VideoYuvFrame {
    pub frame_ms: u32,
    width: u32,
    height: u32,
    y_stride: u32,
    u_stride: u32,
    v_stride: u32,
    buffer: Vec<u8>,
}

impl VideoYuvFrame {
    /// Zeroed frame with the given geometry. Strides narrower than the
    /// plane they describe are widened to fit.
    pub fn new(frame_ms: u32, width: u32, height: u32, y_stride: u32, u_stride: u32, v_stride: u32) -> Self {
        let chroma_width = width.div_ceil(2);
        let (y_stride, u_stride, v_stride) =
            (y_stride.max(width), u_stride.max(chroma_width), v_stride.max(chroma_width));
        let size = Self::plane_sizes(height, y_stride, u_stride, v_stride).iter().sum();
        Self {
            frame_ms,
            width,
            height,
            y_stride,
            u_stride,
            v_stride,
            buffer: vec![0; size],
        }
    }

    /// Zeroed frame with tightly packed planes.
    pub fn packed(frame_ms: u32, width: u32, height: u32) -> Self {
        let chroma = width.div_ceil(2);
        Self::new(frame_ms, width, height, width, chroma, chroma)
    }

    /// Wrap a decoded picture. The buffer holds Y, U and V back to back.
    pub fn with_buffer(
        frame_ms: u32,
        width: u32,
        height: u32,
        strides: [u32; 3],
        buffer: Vec<u8>,
    ) -> Result<Self, RecordingError> {
        let [y_stride, u_stride, v_stride] = strides;
        let chroma_width = width.div_ceil(2);
        if y_stride < width || u_stride < chroma_width || v_stride < chroma_width {
            return Err(RecordingError::InvalidArgument(format!(
                "strides {:?} too small for width {}",
                strides, width
            )));
        }
        let expected: usize = Self::plane_sizes(height, y_stride, u_stride, v_stride).iter().sum();
        if buffer.len() != expected {
            return Err(RecordingError::InvalidArgument(format!(
                "yuv buffer is {} bytes, geometry needs {}",
                buffer.len(),
                expected
            )));
        }
        Ok(Self {
            frame_ms,
            width,
            height,
            y_stride,
            u_stride,
            v_stride,
            buffer,
        })
    }

    fn plane_sizes(height: u32, y_stride: u32, u_stride: u32, v_stride: u32) -> [usize; 3] {
        let chroma_height = height.div_ceil(2) as usize;
        [
            y_stride as usize * height as usize,
            u_stride as usize * chroma_height,
            v_stride as usize * chroma_height,
        ]
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Y, U and V strides in bytes.
    pub fn strides(&self) -> [u32; 3] {
        [self.y_stride, self.u_stride, self.v_stride]
    }

    fn split_points(&self) -> (usize, usize) {
        let [y, u, _] = Self::plane_sizes(self.height, self.y_stride, self.u_stride, self.v_stride);
        (y, y + u)
    }

    pub fn y_plane(&self) -> &[u8] {
        let (u_start, _) = self.split_points();
        &self.buffer[..u_start]
    }

    pub fn u_plane(&self) -> &[u8] {
        let (u_start, v_start) = self.split_points();
        &self.buffer[u_start..v_start]
    }

    pub fn v_plane(&self) -> &[u8] {
        let (_, v_start) = self.split_points();
        &self.buffer[v_start..]
    }

    /// Mutable Y, U and V planes at once.
    pub fn planes_mut(&mut self) -> (&mut [u8], &mut [u8], &mut [u8]) {
        let (u_start, v_start) = self.split_points();
        let (y, rest) = self.buffer.split_at_mut(u_start);
        let (u, v) = rest.split_at_mut(v_start - u_start);
        (y, u, v)
    }

    /// All planes as one contiguous buffer.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }
}

/// H264 access unit, opaque to the engine.
#[derive(Debug, PartialEq, Eq)]
pub struct VideoH264Frame {
    pub frame_ms: u32,
    /// Sequence number of the frame within the stream.
    pub frame_num: u32,
    buffer: Vec<u8>,
}

impl VideoH264Frame {
    pub fn new(frame_ms: u32, frame_num: u32, buffer: Vec<u8>) -> Self {
        Self {
            frame_ms,
            frame_num,
            buffer,
        }
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }
}

/// Clockwise rotation to apply when displaying a video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> i32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }
}

impl TryFrom<i32> for Rotation {
    type Error = RecordingError;

    fn try_from(degrees: i32) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Self::Deg0),
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            other => Err(RecordingError::InvalidArgument(format!("unsupported rotation: {}", other))),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum VideoFrameData {
    Yuv(VideoYuvFrame),
    H264(VideoH264Frame),
}

/// One video frame plus its display rotation.
#[derive(Debug, PartialEq, Eq)]
pub struct VideoFrame {
    pub data: VideoFrameData,
    pub rotation: Rotation,
}

impl VideoFrame {
    pub fn yuv(frame: VideoYuvFrame) -> Self {
        Self {
            data: VideoFrameData::Yuv(frame),
            rotation: Rotation::Deg0,
        }
    }

    pub fn h264(frame: VideoH264Frame) -> Self {
        Self {
            data: VideoFrameData::H264(frame),
            rotation: Rotation::Deg0,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn frame_type(&self) -> VideoFrameType {
        match self.data {
            VideoFrameData::Yuv(_) => VideoFrameType::RawYuv,
            VideoFrameData::H264(_) => VideoFrameType::H264,
        }
    }

    pub fn frame_ms(&self) -> u32 {
        match &self.data {
            VideoFrameData::Yuv(f) => f.frame_ms,
            VideoFrameData::H264(f) => f.frame_ms,
        }
    }

    pub fn buffer(&self) -> &[u8] {
        match &self.data {
            VideoFrameData::Yuv(f) => f.buffer(),
            VideoFrameData::H264(f) => f.buffer(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_frame_default_layout() {
        let frame = AudioPcmFrame::new(20, 16000, 320);
        assert_eq!(frame.channels, 1);
        assert_eq!(frame.sample_bits, 16);
        assert_eq!(frame.buffer_size(), 640);
    }

    #[test]
    fn pcm_buffer_length_is_checked() {
        assert!(AudioPcmFrame::with_buffer(0, 2, 16, 48000, 480, vec![0; 1920]).is_ok());
        assert!(AudioPcmFrame::with_buffer(0, 2, 16, 48000, 480, vec![0; 1919]).is_err());
        assert!(AudioPcmFrame::with_buffer(0, 2, 12, 48000, 480, vec![]).is_err());
    }

    #[test]
    fn yuv_planes_follow_strides() {
        let frame = VideoYuvFrame::new(0, 4, 3, 8, 4, 6);
        // Chroma height rounds up to 2 rows.
        assert_eq!(frame.y_plane().len(), 24);
        assert_eq!(frame.u_plane().len(), 8);
        assert_eq!(frame.v_plane().len(), 12);
        assert_eq!(frame.buffer_size(), 44);
    }

    #[test]
    fn narrow_strides_are_widened() {
        let frame = VideoYuvFrame::new(0, 4, 2, 1, 1, 0);
        assert_eq!(frame.strides(), [4, 2, 2]);
        assert_eq!((frame.width(), frame.height()), (4, 2));
        assert_eq!(frame.y_plane().len(), 8);
        assert_eq!(frame.v_plane().len(), 2);
    }

    #[test]
    fn pcm_buffer_mut_writes_through() {
        let mut frame = AudioPcmFrame::new(0, 8000, 2);
        frame.buffer_mut().copy_from_slice(&[1, 0, 2, 0]);
        assert_eq!(AudioFrame::Pcm(frame).buffer(), &[1, 0, 2, 0]);
    }

    #[test]
    fn yuv_planes_mut_are_disjoint() {
        let mut frame = VideoYuvFrame::packed(0, 2, 2);
        {
            let (y, u, v) = frame.planes_mut();
            y.fill(1);
            u.fill(2);
            v.fill(3);
        }
        assert_eq!(frame.buffer(), &[1, 1, 1, 1, 2, 3]);
    }

    #[test]
    fn yuv_with_buffer_validates_geometry() {
        assert!(VideoYuvFrame::with_buffer(0, 4, 4, [4, 2, 2], vec![0; 24]).is_ok());
        assert!(VideoYuvFrame::with_buffer(0, 4, 4, [4, 2, 2], vec![0; 23]).is_err());
        assert!(VideoYuvFrame::with_buffer(0, 4, 4, [3, 2, 2], vec![0; 22]).is_err());
    }

    #[test]
    fn rotation_accepts_right_angles_only() {
        assert_eq!(Rotation::try_from(270).unwrap(), Rotation::Deg270);
        assert!(Rotation::try_from(45).is_err());
        assert_eq!(Rotation::Deg90.degrees(), 90);
    }

    #[test]
    fn frame_tags_match_variant() {
        let audio = AudioFrame::Aac(AudioAacFrame::new(40, vec![1, 2, 3]));
        assert_eq!(audio.frame_type(), AudioFrameType::Aac);
        assert_eq!(audio.frame_ms(), 40);
        assert_eq!(audio.buffer(), &[1, 2, 3]);

        let video = VideoFrame::h264(VideoH264Frame::new(33, 7, vec![0; 10])).with_rotation(Rotation::Deg180);
        assert_eq!(video.frame_type(), VideoFrameType::H264);
        assert_eq!(video.frame_ms(), 33);
        assert_eq!(video.rotation.degrees(), 180);
    }
}
