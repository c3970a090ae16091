use serde::{Deserialize, Serialize};

/// Dynamic range compression settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorSettings {
    pub threshold_db: f64,
    pub ratio: f64,
    pub attack_ms: f64,
    pub release_ms: f64,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            threshold_db: -20.0,
            ratio: 2.0,
            attack_ms: 5.0,
            release_ms: 120.0,
        }
    }
}

/// EBU R128 loudness normalization targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoudnessTarget {
    /// Integrated loudness in LUFS
    pub integrated_lufs: f64,
    /// Loudness range in LU
    pub range_lu: f64,
    /// True peak ceiling in dBTP
    pub true_peak_dbtp: f64,
}

impl Default for LoudnessTarget {
    fn default() -> Self {
        Self {
            integrated_lufs: -23.0,
            range_lu: 7.0,
            true_peak_dbtp: -1.0,
        }
    }
}

/// The mastering chain applied to every synthesized clip
///
/// Stages run in a fixed order: high-pass, compression, loudness
/// normalization, resample/downmix, then MP3 encode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteringChain {
    pub highpass_hz: u32,
    pub compressor: CompressorSettings,
    pub loudness: LoudnessTarget,
    pub sample_rate: u32,
    pub channels: u8,
    pub codec: String,
    /// VBR quality for the encoder (0 best, 9 worst)
    pub quality: u8,
}

impl Default for MasteringChain {
    fn default() -> Self {
        Self {
            highpass_hz: 80,
            compressor: CompressorSettings::default(),
            loudness: LoudnessTarget::default(),
            sample_rate: 48_000,
            channels: 1,
            codec: "libmp3lame".to_string(),
            quality: 3,
        }
    }
}

impl MasteringChain {
    /// Audio filter graph for the filtering stages
    pub fn filter_graph(&self) -> String {
        let c = &self.compressor;
        let l = &self.loudness;
        format!(
            "highpass=f={},acompressor=threshold={}dB:ratio={}:attack={}:release={},loudnorm=I={}:LRA={}:TP={:.1}",
            self.highpass_hz,
            c.threshold_db,
            c.ratio,
            c.attack_ms,
            c.release_ms,
            l.integrated_lufs,
            l.range_lu,
            l.true_peak_dbtp,
        )
    }

    /// Output arguments for the resample and encode stages
    pub fn output_args(&self) -> Vec<String> {
        vec![
            "-ar".to_string(),
            self.sample_rate.to_string(),
            "-ac".to_string(),
            self.channels.to_string(),
            "-c:a".to_string(),
            self.codec.clone(),
            "-q:a".to_string(),
            self.quality.to_string(),
        ]
    }
}
