//! Operation descriptors: what a pipeline step does and with which parameters.
//!
//! Descriptors arrive as loosely typed JSON records (`{"type": "resize",
//! "mode": "fit", "maxside": "256"}`) and are turned into a closed
//! [`Operation`] enum with one strongly typed params struct per variant.
//! Parameters are never rejected: numbers may come as strings, booleans as
//! `"TRUE"`, and anything missing or unparseable takes its documented default.
//!
//! | type | defaults |
//! |---|---|
//! | `reset` | (none) |
//! | `resize` | mode=size, keep=false, w=h=256, maxside=256, pct=100 |
//! | `crop_center` | w=h=224 |
//! | `pad` | w=h=256, mode=constant, r=g=b=0 |
//! | `brightness_contrast` | b=c=0 (clamped to ±50) |
//! | `blur_sharpen` | blur=sharp=0 |
//! | `edges` | method=canny, threshold=100, overlay=false |
//! | `to_grayscale` | (none) |
//! | `normalize` | mode=zero_one |
//!
//! Every side length (`w`, `h`, `maxside`) is clamped into `1..=MAX_SIDE`.
//!
//! A record whose `type` is not in the table becomes
//! [`OperationSpec::Unknown`]; the pipeline decides what to do with it.

use super::calculations::MAX_SIDE;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One parsed pipeline step: either a known operation or an unrecognized type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OperationSpec {
    Known(Operation),
    Unknown(UnknownOperation),
}

/// A descriptor whose `type` is not recognized (kept for diagnostics).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnknownOperation {
    #[serde(rename = "type")]
    pub op_type: String,
}

impl OperationSpec {
    /// The descriptor's `type` string.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Known(op) => op.type_name(),
            Self::Unknown(u) => &u.op_type,
        }
    }
}

impl From<Operation> for OperationSpec {
    fn from(op: Operation) -> Self {
        Self::Known(op)
    }
}

const KNOWN_TYPES: &[&str] = &[
    "reset",
    "resize",
    "crop_center",
    "pad",
    "brightness_contrast",
    "blur_sharpen",
    "edges",
    "to_grayscale",
    "normalize",
];

impl<'de> Deserialize<'de> for OperationSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let op_type = value
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();
        if KNOWN_TYPES.contains(&op_type.as_str()) {
            serde_json::from_value(value)
                .map(Self::Known)
                .map_err(serde::de::Error::custom)
        } else {
            Ok(Self::Unknown(UnknownOperation { op_type }))
        }
    }
}

/// A known pipeline step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Restart from the original image.
    Reset,
    Resize(ResizeParams),
    CropCenter(CropParams),
    Pad(PadParams),
    BrightnessContrast(BrightnessContrastParams),
    BlurSharpen(BlurSharpenParams),
    Edges(EdgesParams),
    ToGrayscale,
    Normalize(NormalizeParams),
}

impl Operation {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::Resize(_) => "resize",
            Self::CropCenter(_) => "crop_center",
            Self::Pad(_) => "pad",
            Self::BrightnessContrast(_) => "brightness_contrast",
            Self::BlurSharpen(_) => "blur_sharpen",
            Self::Edges(_) => "edges",
            Self::ToGrayscale => "to_grayscale",
            Self::Normalize(_) => "normalize",
        }
    }
}

// =============================================================================
// Lenient scalars
// =============================================================================

/// A number as browsers send it: JSON number, numeric string, or bool.
#[derive(Debug, Clone, Copy, Default)]
struct Scalar(Option<f64>);

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde_json::Value;
        Ok(Scalar(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
            _ => None,
        }
        .filter(|v| v.is_finite())))
    }
}

impl Scalar {
    fn or(self, default: f64) -> f64 {
        self.0.unwrap_or(default)
    }

    /// Missing or zero falls back to `default`; others clamp into `1..=MAX_SIDE`.
    fn dimension_or(self, default: u32) -> u32 {
        match self.0 {
            Some(v) if v.trunc() != 0.0 => v.trunc().clamp(1.0, MAX_SIDE as f64) as u32,
            _ => default,
        }
    }

    /// Missing falls back to `default`; present values clamp into `1..=MAX_SIDE`.
    fn size_or(self, default: u32) -> u32 {
        self.0
            .map(|v| v.trunc().clamp(1.0, MAX_SIDE as f64) as u32)
            .unwrap_or(default)
    }

    fn channel_or(self, default: u8) -> u8 {
        self.0
            .map(|v| v.trunc().clamp(0.0, 255.0) as u8)
            .unwrap_or(default)
    }
}

/// A boolean as browsers send it: JSON bool, `"TRUE"`/`"false"`, or 0/1.
#[derive(Debug, Clone, Copy, Default)]
struct Flag(Option<bool>);

impl<'de> Deserialize<'de> for Flag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde_json::Value;
        Ok(Flag(match Value::deserialize(deserializer)? {
            Value::Bool(b) => Some(b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" | "" => Some(false),
                _ => None,
            },
            Value::Number(n) => n.as_f64().map(|v| v != 0.0),
            _ => None,
        }))
    }
}

/// A mode string; non-strings are treated as missing.
#[derive(Debug, Clone, Default)]
struct Text(Option<String>);

impl<'de> Deserialize<'de> for Text {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Text(match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            _ => None,
        }))
    }
}

impl Text {
    fn or(self, default: &str) -> String {
        self.0
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| default.to_string())
    }
}

fn serialize_as_str<S: Serializer>(value: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(value)
}

// =============================================================================
// resize
// =============================================================================

/// How `resize` computes its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResizeMode {
    /// Exact `(w, h)`, or contained within it when `keep` is set.
    Size,
    /// Longer side equals `maxside`.
    Fit,
    /// Both sides scaled by `pct` percent.
    Scale,
    /// Unrecognized mode; the image passes through unchanged.
    Other(String),
}

impl ResizeMode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Size => "size",
            Self::Fit => "fit",
            Self::Scale => "scale",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ResizeMode {
    fn from(s: String) -> Self {
        match s.as_str() {
            "size" => Self::Size,
            "fit" => Self::Fit,
            "scale" => Self::Scale,
            _ => Self::Other(s),
        }
    }
}

impl Serialize for ResizeMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_as_str(self.as_str(), serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawResize")]
pub struct ResizeParams {
    pub mode: ResizeMode,
    pub keep: bool,
    pub w: u32,
    pub h: u32,
    pub maxside: u32,
    pub pct: f64,
}

impl Default for ResizeParams {
    fn default() -> Self {
        RawResize::default().into()
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct RawResize {
    mode: Text,
    keep: Flag,
    w: Scalar,
    h: Scalar,
    maxside: Scalar,
    pct: Scalar,
}

impl From<RawResize> for ResizeParams {
    fn from(raw: RawResize) -> Self {
        Self {
            mode: ResizeMode::from(raw.mode.or("size")),
            keep: raw.keep.0.unwrap_or(false),
            w: raw.w.dimension_or(256),
            h: raw.h.dimension_or(256),
            maxside: raw.maxside.dimension_or(256),
            pct: match raw.pct.0 {
                Some(p) if p != 0.0 => p.max(0.0),
                _ => 100.0,
            },
        }
    }
}

// =============================================================================
// crop_center
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawCrop")]
pub struct CropParams {
    pub w: u32,
    pub h: u32,
}

impl Default for CropParams {
    fn default() -> Self {
        RawCrop::default().into()
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct RawCrop {
    w: Scalar,
    h: Scalar,
}

impl From<RawCrop> for CropParams {
    fn from(raw: RawCrop) -> Self {
        Self {
            w: raw.w.size_or(224),
            h: raw.h.size_or(224),
        }
    }
}

// =============================================================================
// pad
// =============================================================================

/// How `pad` fills the border.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PadMode {
    /// Solid `(r, g, b)`.
    Constant,
    /// Replicate the outermost pixels.
    Edge,
    /// Mirror, including the edge pixel (`cba|abc|cba`).
    Reflect,
    /// Unrecognized mode; the image passes through unchanged.
    Other(String),
}

impl PadMode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Constant => "constant",
            Self::Edge => "edge",
            Self::Reflect => "reflect",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for PadMode {
    fn from(s: String) -> Self {
        match s.as_str() {
            "constant" => Self::Constant,
            "edge" => Self::Edge,
            "reflect" => Self::Reflect,
            _ => Self::Other(s),
        }
    }
}

impl Serialize for PadMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_as_str(self.as_str(), serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPad")]
pub struct PadParams {
    pub w: u32,
    pub h: u32,
    pub mode: PadMode,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Default for PadParams {
    fn default() -> Self {
        RawPad::default().into()
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct RawPad {
    w: Scalar,
    h: Scalar,
    mode: Text,
    r: Scalar,
    g: Scalar,
    b: Scalar,
}

impl From<RawPad> for PadParams {
    fn from(raw: RawPad) -> Self {
        Self {
            w: raw.w.size_or(256),
            h: raw.h.size_or(256),
            mode: PadMode::from(raw.mode.or("constant")),
            r: raw.r.channel_or(0),
            g: raw.g.channel_or(0),
            b: raw.b.channel_or(0),
        }
    }
}

// =============================================================================
// brightness_contrast
// =============================================================================

/// Slider range for brightness and contrast.
pub const SLIDER_LIMIT: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(from = "RawBrightnessContrast")]
pub struct BrightnessContrastParams {
    /// Brightness in `[-50, 50]`.
    pub b: f64,
    /// Contrast in `[-50, 50]`.
    pub c: f64,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct RawBrightnessContrast {
    b: Scalar,
    c: Scalar,
}

impl From<RawBrightnessContrast> for BrightnessContrastParams {
    fn from(raw: RawBrightnessContrast) -> Self {
        Self {
            b: raw.b.or(0.0).clamp(-SLIDER_LIMIT, SLIDER_LIMIT),
            c: raw.c.or(0.0).clamp(-SLIDER_LIMIT, SLIDER_LIMIT),
        }
    }
}

// =============================================================================
// blur_sharpen
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(from = "RawBlurSharpen")]
pub struct BlurSharpenParams {
    /// Gaussian sigma; 0 disables the blur.
    pub blur: f64,
    /// Unsharp-mask amount (capped at 3 when applied); 0 disables it.
    pub sharp: f64,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct RawBlurSharpen {
    blur: Scalar,
    sharp: Scalar,
}

impl From<RawBlurSharpen> for BlurSharpenParams {
    fn from(raw: RawBlurSharpen) -> Self {
        Self {
            blur: raw.blur.or(0.0).max(0.0),
            sharp: raw.sharp.or(0.0).max(0.0),
        }
    }
}

// =============================================================================
// edges
// =============================================================================

/// Edge detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeMethod {
    Canny,
    Sobel,
    Laplacian,
    Prewitt,
    /// Unrecognized method; detected with Canny at fixed 100/160 thresholds.
    Other(String),
}

impl EdgeMethod {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Canny => "canny",
            Self::Sobel => "sobel",
            Self::Laplacian => "laplacian",
            Self::Prewitt => "prewitt",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for EdgeMethod {
    fn from(s: String) -> Self {
        match s.as_str() {
            "canny" => Self::Canny,
            "sobel" => Self::Sobel,
            "laplacian" => Self::Laplacian,
            "prewitt" => Self::Prewitt,
            _ => Self::Other(s),
        }
    }
}

impl Serialize for EdgeMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_as_str(self.as_str(), serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawEdges")]
pub struct EdgesParams {
    pub method: EdgeMethod,
    pub threshold: i32,
    /// Paint edges red over the image instead of rendering a mask.
    pub overlay: bool,
}

impl Default for EdgesParams {
    fn default() -> Self {
        RawEdges::default().into()
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct RawEdges {
    method: Text,
    threshold: Scalar,
    overlay: Flag,
}

impl From<RawEdges> for EdgesParams {
    fn from(raw: RawEdges) -> Self {
        Self {
            method: EdgeMethod::from(raw.method.or("canny")),
            threshold: raw
                .threshold
                .or(100.0)
                .trunc()
                .clamp(i32::MIN as f64, i32::MAX as f64) as i32,
            overlay: raw.overlay.0.unwrap_or(false),
        }
    }
}

// =============================================================================
// normalize
// =============================================================================

/// Display-range normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeMode {
    /// Scale to `[0, 1]` and back; a display no-op.
    ZeroOne,
    /// Scale to `[-1, 1]` and back; a display no-op.
    MinusOneOne,
    /// Per-channel standardization clipped to ±2σ.
    Zscore,
    /// Unrecognized mode; the image passes through unchanged.
    Other(String),
}

impl NormalizeMode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ZeroOne => "zero_one",
            Self::MinusOneOne => "minus_one_one",
            Self::Zscore => "zscore",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for NormalizeMode {
    fn from(s: String) -> Self {
        match s.as_str() {
            "zero_one" => Self::ZeroOne,
            "minus_one_one" => Self::MinusOneOne,
            "zscore" => Self::Zscore,
            _ => Self::Other(s),
        }
    }
}

impl Serialize for NormalizeMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_as_str(self.as_str(), serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawNormalize")]
pub struct NormalizeParams {
    pub mode: NormalizeMode,
}

impl Default for NormalizeParams {
    fn default() -> Self {
        RawNormalize::default().into()
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct RawNormalize {
    mode: Text,
}

impl From<RawNormalize> for NormalizeParams {
    fn from(raw: RawNormalize) -> Self {
        Self {
            mode: NormalizeMode::from(raw.mode.or("zero_one")),
        }
    }
}

/// Parse a JSON operation list.
pub fn parse_operations(json: &str) -> Result<Vec<OperationSpec>, serde_json::Error> {
    serde_json::from_str(json)
}
