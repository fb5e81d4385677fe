use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::RecordingError;

/// Channel profile the recorder joins with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelProfile {
    #[default]
    Communication,
    LiveBroadcasting,
}

/// Which simulcast layer to request from remote senders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteVideoStreamType {
    #[default]
    High,
    Low,
}

/// Media decryption mode. Only selects the mode; decryption itself happens
/// in the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecryptionMode {
    #[serde(rename = "aes-128-xts")]
    Aes128Xts,
    #[serde(rename = "aes-128-ecb")]
    Aes128Ecb,
    #[serde(rename = "aes-256-xts")]
    Aes256Xts,
}

impl DecryptionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aes128Xts => "aes-128-xts",
            Self::Aes128Ecb => "aes-128-ecb",
            Self::Aes256Xts => "aes-256-xts",
        }
    }
}

impl FromStr for DecryptionMode {
    type Err = RecordingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aes-128-xts" => Ok(Self::Aes128Xts),
            "aes-128-ecb" => Ok(Self::Aes128Ecb),
            "aes-256-xts" => Ok(Self::Aes256Xts),
            other => Err(RecordingError::InvalidArgument(format!("unsupported decryption mode: {}", other))),
        }
    }
}

/// Decryption mode plus the shared secret it needs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decryption {
    pub mode: DecryptionMode,
    pub secret: String,
}

impl Decryption {
    /// Short SHA-256 fingerprint of the secret, safe to log.
    pub fn secret_fingerprint(&self) -> String {
        let digest = Sha256::digest(self.secret.as_bytes());
        digest.iter().take(4).map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for Decryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decryption")
            .field("mode", &self.mode)
            .field("secret", &format_args!("<{}>", self.secret_fingerprint()))
            .finish()
    }
}

/// Largest mixed canvas edge accepted, in pixels.
pub const MAX_MIX_DIMENSION: u32 = 4096;

/// Output resolution of the mixed stream, written as `"width,height,fps,kbps"`.
/// A mixing layout's canvas must fit inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixResolution {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub kbps: u32,
}

impl FromStr for MixResolution {
    type Err = RecordingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<u32> = s
            .split(',')
            .map(|part| part.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|e| RecordingError::InvalidArgument(format!("bad mix resolution {:?}: {}", s, e)))?;
        match fields.as_slice() {
            [width, height, fps, kbps] => Ok(Self {
                width: *width,
                height: *height,
                fps: *fps,
                kbps: *kbps,
            }),
            _ => Err(RecordingError::InvalidArgument(format!(
                "mix resolution must be \"width,height,fps,kbps\", got {:?}",
                s
            ))),
        }
    }
}

impl fmt::Display for MixResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.width, self.height, self.fps, self.kbps)
    }
}

/// Join-time configuration of a recording session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub channel_profile: ChannelProfile,

    /// Record audio only; every video frame is dropped.
    pub is_audio_only: bool,

    /// Composite participant video onto one canvas.
    pub is_mixing_enabled: bool,

    /// Required when mixing is enabled.
    pub mix_resolution: Option<MixResolution>,

    pub decryption: Option<Decryption>,

    /// Seconds without any participant before the engine leaves on its own.
    /// Zero disables the watchdog.
    pub idle_limit_sec: u32,

    /// Directory of the transport's helper binaries, passed through untouched.
    pub applite_dir: Option<PathBuf>,

    /// Root under which per-session recording directories are derived.
    pub record_file_root_dir: Option<PathBuf>,

    pub low_udp_port: Option<u16>,
    pub high_udp_port: Option<u16>,

    /// Deliver PCM (true) or AAC (false) audio frames.
    pub decode_audio: bool,

    /// Deliver YUV (true) or H264 (false) video frames.
    pub decode_video: bool,

    pub stream_type: RemoteVideoStreamType,
}

impl RecordingConfig {
    pub fn validate(&self) -> Result<(), RecordingError> {
        if self.low_udp_port == Some(0) || self.high_udp_port == Some(0) {
            return Err(RecordingError::InvalidArgument("udp port must be non-zero".into()));
        }
        if let (Some(low), Some(high)) = (self.low_udp_port, self.high_udp_port) {
            if low > high {
                return Err(RecordingError::InvalidArgument(format!(
                    "low udp port {} is above high udp port {}",
                    low, high
                )));
            }
        }
        if self.is_mixing_enabled {
            let Some(resolution) = self.mix_resolution else {
                return Err(RecordingError::InvalidArgument(
                    "mix resolution is required when mixing is enabled".into(),
                ));
            };
            if resolution.width == 0 || resolution.height == 0 || resolution.fps == 0 {
                return Err(RecordingError::InvalidArgument(format!(
                    "mix resolution must be non-zero, got {}",
                    resolution
                )));
            }
            if resolution.width > MAX_MIX_DIMENSION || resolution.height > MAX_MIX_DIMENSION {
                return Err(RecordingError::InvalidArgument(format!(
                    "mix resolution {} exceeds {} pixels per side",
                    resolution, MAX_MIX_DIMENSION
                )));
            }
        }
        if let Some(ref decryption) = self.decryption {
            if decryption.secret.is_empty() {
                return Err(RecordingError::InvalidArgument(format!(
                    "decryption mode {} requires a secret",
                    decryption.mode.as_str()
                )));
            }
        }
        Ok(())
    }

    /// UDP port range, when both ends are configured.
    pub fn udp_port_range(&self) -> Option<RangeInclusive<u16>> {
        match (self.low_udp_port, self.high_udp_port) {
            (Some(low), Some(high)) => Some(low..=high),
            _ => None,
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            channel_profile: ChannelProfile::Communication,
            is_audio_only: false,
            is_mixing_enabled: false,
            mix_resolution: None,
            decryption: None,
            idle_limit_sec: 300,
            applite_dir: None,
            record_file_root_dir: None,
            low_udp_port: None,
            high_udp_port: None,
            decode_audio: true,
            decode_video: true,
            stream_type: RemoteVideoStreamType::High,
        }
    }
}
