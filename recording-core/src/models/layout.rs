use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::RecordingError;

/// How a participant's video fills its region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Scale to cover the region and crop the overflow.
    #[default]
    Hidden,
    /// Scale to fit inside the region, leaving background bars.
    Fit,
}

impl RenderMode {
    pub fn code(self) -> i32 {
        match self {
            Self::Hidden => 1,
            Self::Fit => 2,
        }
    }
}

impl TryFrom<i32> for RenderMode {
    type Error = RecordingError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Hidden),
            2 => Ok(Self::Fit),
            other => Err(RecordingError::InvalidArgument(format!("unknown render mode: {}", other))),
        }
    }
}

/// 24-bit RGB colour, written as `"#RRGGBB"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl FromStr for Rgb {
    type Err = RecordingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || RecordingError::InvalidArgument(format!("background colour must be \"#RRGGBB\", got {:?}", s));
        let hex = s.strip_prefix('#').ok_or_else(bad)?;
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(bad());
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).map_err(|_| bad());
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn default_alpha() -> f64 {
    1.0
}

/// One participant's placement on the canvas, in normalized coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub uid: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// 0 is bottom-most, 100 top-most.
    #[serde(default)]
    pub z_order: u8,
    /// 0.0 is fully transparent, 1.0 opaque.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default)]
    pub render_mode: RenderMode,
}

impl Region {
    pub const MAX_Z_ORDER: u8 = 100;

    pub fn new(uid: u32, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            uid,
            x,
            y,
            width,
            height,
            z_order: 0,
            alpha: 1.0,
            render_mode: RenderMode::Hidden,
        }
    }

    pub fn with_z_order(mut self, z_order: u8) -> Self {
        self.z_order = z_order;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_render_mode(mut self, render_mode: RenderMode) -> Self {
        self.render_mode = render_mode;
        self
    }

    fn validate(&self, index: usize) -> Result<(), RecordingError> {
        let unit = |name: &str, value: f64| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(RecordingError::InvalidArgument(format!(
                    "region {} (uid {}): {} {} outside [0, 1]",
                    index, self.uid, name, value
                )))
            }
        };
        unit("x", self.x)?;
        unit("y", self.y)?;
        unit("width", self.width)?;
        unit("height", self.height)?;
        unit("alpha", self.alpha)?;
        if self.z_order > Self::MAX_Z_ORDER {
            return Err(RecordingError::InvalidArgument(format!(
                "region {} (uid {}): z order {} above {}",
                index,
                self.uid,
                self.z_order,
                Self::MAX_Z_ORDER
            )));
        }
        Ok(())
    }
}

/// Declarative composition of participant regions onto one canvas.
///
/// Always replaced wholesale; regions keep their insertion order, which
/// breaks ties between equal z orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMixingLayout {
    pub canvas_width: u32,
    pub canvas_height: u32,
    #[serde(default)]
    pub background_color: Option<Rgb>,
    #[serde(default)]
    pub regions: Vec<Region>,
    /// Opaque application payload carried alongside the layout.
    #[serde(default)]
    pub app_data: Option<Vec<u8>>,
}

impl VideoMixingLayout {
    pub fn new(canvas_width: u32, canvas_height: u32) -> Self {
        Self {
            canvas_width,
            canvas_height,
            background_color: None,
            regions: Vec::new(),
            app_data: None,
        }
    }

    pub fn with_background(mut self, color: Rgb) -> Self {
        self.background_color = Some(color);
        self
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.regions.push(region);
        self
    }

    /// Parse and validate a layout pushed as JSON.
    pub fn from_json(json: &str) -> Result<Self, RecordingError> {
        let layout: Self = serde_json::from_str(json)
            .map_err(|e| RecordingError::InvalidArgument(format!("failed to parse layout: {}", e)))?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn validate(&self) -> Result<(), RecordingError> {
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(RecordingError::InvalidArgument(format!(
                "canvas must be non-empty, got {}x{}",
                self.canvas_width, self.canvas_height
            )));
        }
        self.regions
            .iter()
            .enumerate()
            .try_for_each(|(index, region)| region.validate(index))
    }

    pub fn background(&self) -> Rgb {
        self.background_color.unwrap_or_default()
    }

    /// Regions in paint order: z order ascending, insertion order within a tie.
    pub fn paint_order(&self) -> Vec<&Region> {
        let mut ordered: Vec<&Region> = self.regions.iter().collect();
        // sort_by_key is stable.
        ordered.sort_by_key(|region| region.z_order);
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_mode_codes_round_trip() {
        for mode in [RenderMode::Hidden, RenderMode::Fit] {
            assert_eq!(RenderMode::try_from(mode.code()).unwrap(), mode);
        }
        assert!(RenderMode::try_from(0).is_err());
        assert!(RenderMode::try_from(3).is_err());
    }

    #[test]
    fn empty_canvas_is_rejected() {
        assert!(VideoMixingLayout::new(0, 480).validate().is_err());
        assert!(VideoMixingLayout::new(640, 0).validate().is_err());
        assert!(VideoMixingLayout::new(640, 480).validate().is_ok());
    }

    #[test]
    fn out_of_range_region_is_rejected() {
        for region in [
            Region::new(1, -0.1, 0.0, 0.5, 0.5),
            Region::new(1, 0.0, 1.1, 0.5, 0.5),
            Region::new(1, 0.0, 0.0, 1.5, 0.5),
            Region::new(1, 0.0, 0.0, 0.5, f64::NAN),
            Region::new(1, 0.0, 0.0, 0.5, 0.5).with_alpha(2.0),
            Region::new(1, 0.0, 0.0, 0.5, 0.5).with_z_order(101),
        ] {
            let layout = VideoMixingLayout::new(640, 480).with_region(region);
            assert!(layout.validate().is_err(), "{:?}", layout.regions);
        }
    }

    #[test]
    fn paint_order_is_stable_within_z() {
        let layout = VideoMixingLayout::new(640, 480)
            .with_region(Region::new(1, 0.0, 0.0, 1.0, 1.0).with_z_order(5))
            .with_region(Region::new(2, 0.0, 0.0, 1.0, 1.0).with_z_order(5))
            .with_region(Region::new(3, 0.0, 0.0, 1.0, 1.0).with_z_order(0));
        let uids: Vec<u32> = layout.paint_order().iter().map(|r| r.uid).collect();
        assert_eq!(uids, vec![3, 1, 2]);
    }

    #[test]
    fn rgb_parsing() {
        let c: Rgb = "#C0C0C0".parse().unwrap();
        assert_eq!(c, Rgb { r: 192, g: 192, b: 192 });
        assert_eq!(c.to_string(), "#C0C0C0");
        assert!("C0C0C0".parse::<Rgb>().is_err());
        assert!("#C0C0".parse::<Rgb>().is_err());
        assert!("#GGGGGG".parse::<Rgb>().is_err());
    }

    #[test]
    fn layout_from_json_applies_defaults() {
        let layout = VideoMixingLayout::from_json(
            r##"{
                "canvas_width": 640,
                "canvas_height": 360,
                "background_color": "#FF0000",
                "regions": [
                    {"uid": 7, "x": 0.0, "y": 0.0, "width": 0.5, "height": 1.0},
                    {"uid": 8, "x": 0.5, "y": 0.0, "width": 0.5, "height": 1.0, "z_order": 3, "alpha": 0.5, "render_mode": "fit"}
                ]
            }"##,
        )
        .unwrap();
        assert_eq!(layout.background(), Rgb { r: 255, g: 0, b: 0 });
        assert_eq!(layout.regions[0].alpha, 1.0);
        assert_eq!(layout.regions[0].render_mode, RenderMode::Hidden);
        assert_eq!(layout.regions[1].render_mode, RenderMode::Fit);
        assert_eq!(layout.regions[1].z_order, 3);
    }

    #[test]
    fn layout_from_json_validates() {
        let err = VideoMixingLayout::from_json(
            r#"{"canvas_width": 640, "canvas_height": 360, "regions": [{"uid": 1, "x": 2.0, "y": 0.0, "width": 0.5, "height": 0.5}]}"#,
        );
        assert!(matches!(err, Err(RecordingError::InvalidArgument(_))));
    }
}
