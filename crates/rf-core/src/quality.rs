//! Built-in quality presets.
//!
//! [`QualityId`] is the one ranking used everywhere a quality is compared:
//! its `Ord` follows the preset table, so resolution and bitrate grow with
//! the identifier. Lookups are exhaustive matches, so adding a variant
//! without a preset does not compile.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Identifier of a built-in quality preset, ordered lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityId {
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "4K")]
    Uhd4k,
}

impl QualityId {
    /// Every preset, highest quality first.
    pub const ALL: [QualityId; 5] = [
        QualityId::Uhd4k,
        QualityId::P1080,
        QualityId::P720,
        QualityId::P480,
        QualityId::P360,
    ];

    /// Canonical identifier string ("4K", "1080p", ...).
    pub fn as_str(self) -> &'static str {
        match self {
            QualityId::Uhd4k => "4K",
            QualityId::P1080 => "1080p",
            QualityId::P720 => "720p",
            QualityId::P480 => "480p",
            QualityId::P360 => "360p",
        }
    }

    /// The encoder preset for this quality.
    pub fn profile(self) -> &'static QualityProfile {
        let idx = match self {
            QualityId::Uhd4k => 0,
            QualityId::P1080 => 1,
            QualityId::P720 => 2,
            QualityId::P480 => 3,
            QualityId::P360 => 4,
        };
        &PROFILES[idx]
    }

    /// Highest quality among `ready`, if any.
    pub fn best_of(ready: impl IntoIterator<Item = QualityId>) -> Option<QualityId> {
        ready.into_iter().max()
    }
}

impl fmt::Display for QualityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        QualityId::ALL
            .into_iter()
            .find(|q| q.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| Error::UnknownQuality(s.to_string()))
    }
}

/// Encoder settings for one named quality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityProfile {
    pub id: QualityId,
    pub width: u32,
    pub height: u32,
    /// Target video bitrate in kbit/s.
    pub bitrate_kbps: u32,
    /// x264 constant rate factor; lower is higher quality.
    pub crf: u8,
    /// x264 speed/effort preset.
    pub preset: &'static str,
    /// Appended to the base filename of the rendition.
    pub suffix: &'static str,
}

impl QualityProfile {
    /// `WIDTHxHEIGHT`, as ffmpeg's `-s` expects it.
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Bitrate label such as `1500k`.
    pub fn bitrate(&self) -> String {
        format!("{}k", self.bitrate_kbps)
    }

    /// `{base}{suffix}.mp4`
    pub fn output_file_name(&self, base_name: &str) -> String {
        format!("{base_name}{}.mp4", self.suffix)
    }
}

static PROFILES: [QualityProfile; 5] = [
    QualityProfile {
        id: QualityId::Uhd4k,
        width: 3840,
        height: 2160,
        bitrate_kbps: 8000,
        crf: 18,
        preset: "slower",
        suffix: "_4k",
    },
    QualityProfile {
        id: QualityId::P1080,
        width: 1920,
        height: 1080,
        bitrate_kbps: 3000,
        crf: 20,
        preset: "slower",
        suffix: "_1080p",
    },
    QualityProfile {
        id: QualityId::P720,
        width: 1280,
        height: 720,
        bitrate_kbps: 1500,
        crf: 23,
        preset: "slow",
        suffix: "_720p",
    },
    QualityProfile {
        id: QualityId::P480,
        width: 854,
        height: 480,
        bitrate_kbps: 800,
        crf: 25,
        preset: "slow",
        suffix: "_480p",
    },
    QualityProfile {
        id: QualityId::P360,
        width: 640,
        height: 360,
        bitrate_kbps: 400,
        crf: 28,
        preset: "medium",
        suffix: "_360p",
    },
];

/// Resolve a caller-supplied identifier to its preset.
pub fn resolve(identifier: &str) -> crate::Result<&'static QualityProfile> {
    identifier.parse::<QualityId>().map(QualityId::profile)
}
