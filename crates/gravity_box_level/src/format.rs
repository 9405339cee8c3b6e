use bevy::math::Vec2;
use serde::{Deserialize, Serialize};

use crate::PPM;

/// Top-level level file structure.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LevelFile {
    pub id: i32,
    pub padding: Padding,
    pub player: MarkerData,
    pub finish: MarkerData,
    /// Always sorted by ascending `id`.
    #[serde(default)]
    pub objects: Vec<ObjectData>,
}

impl LevelFile {
    pub fn to_pretty_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Padding {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

impl Default for Padding {
    fn default() -> Self {
        Self {
            left: 2,
            right: 2,
            top: 5,
            bottom: 5,
        }
    }
}

/// A position in pixels.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn from_meters(meters: Vec2) -> Self {
        Self {
            x: meters.x * PPM,
            y: meters.y * PPM,
        }
    }

    pub fn to_meters(self) -> Vec2 {
        Vec2::new(self.x / PPM, self.y / PPM)
    }
}

/// The player and the finish point: exactly one of each per level.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct MarkerData {
    pub id: i32,
    pub position: Position,
    pub rotation: i32,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Platform,
    Point,
    #[serde(other)]
    Unknown,
}

/// Target of a moving platform, in pixels. Non-finite components mean the
/// platform does not move.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct MovingTo {
    #[serde(with = "non_finite")]
    pub x: f32,
    #[serde(with = "non_finite")]
    pub y: f32,
}

impl MovingTo {
    pub const NONE: Self = Self {
        x: f32::INFINITY,
        y: f32::INFINITY,
    };

    pub fn from_meters(target: Option<Vec2>) -> Self {
        match target {
            Some(meters) => {
                let position = Position::from_meters(meters);
                Self {
                    x: position.x,
                    y: position.y,
                }
            }
            None => Self::NONE,
        }
    }

    pub fn to_meters(self) -> Option<Vec2> {
        self.is_moving()
            .then(|| Position { x: self.x, y: self.y }.to_meters())
    }

    pub fn is_moving(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Default for MovingTo {
    fn default() -> Self {
        Self::NONE
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectData {
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    pub id: i32,
    pub position: Position,
    #[serde(default)]
    pub rotation: i32,
    #[serde(default)]
    pub moving_to: MovingTo,
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub is_destroyable: bool,
    #[serde(default)]
    pub is_rotating: bool,
}

/// JSON has no infinity literal: non-finite floats are written as strings and
/// read back from a number, `"Infinity"`, `"-Infinity"` or `null`.
mod non_finite {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f32(*value)
        } else if value.is_sign_negative() {
            serializer.serialize_str("-Infinity")
        } else {
            serializer.serialize_str("Infinity")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f32),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(f32::INFINITY),
            Some(Raw::Number(value)) => Ok(value),
            Some(Raw::Text(text)) => match text.as_str() {
                "Infinity" | "inf" => Ok(f32::INFINITY),
                "-Infinity" | "-inf" => Ok(f32::NEG_INFINITY),
                other => Err(D::Error::custom(format!("invalid float `{other}`"))),
            },
        }
    }
}
