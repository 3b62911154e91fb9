use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single point on the canvas.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// RGBA stroke color.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

/// One completed drawing stroke. Immutable once created; identified by a
/// globally unique id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Stroke {
    pub id: String,
    pub points: Vec<Point>,
    pub color: Color,
    pub width: f32,
    /// Site id of the peer that drew the stroke.
    pub site: String,
    pub time: DateTime<Utc>,
}

impl Stroke {
    /// Build a new stroke with a fresh random id.
    pub fn new(points: Vec<Point>, color: Color, width: f32, site: &str) -> Self {
        Stroke {
            id: Uuid::new_v4().to_string(),
            points,
            color,
            width,
            site: site.to_string(),
            time: Utc::now(),
        }
    }
}
