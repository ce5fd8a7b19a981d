use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgba(0, 0, 0, 255);
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parses `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn parse_hex(input: &str) -> Option<Self> {
        let hex = input.trim().strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let mut out = [0u8; 3];
                for (i, c) in hex.chars().enumerate() {
                    let v = c.to_digit(16)? as u8;
                    out[i] = v * 16 + v;
                }
                Some(Self::rgba(out[0], out[1], out[2], 255))
            }
            6 => Some(Self::rgba(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                255,
            )),
            8 => Some(Self::rgba(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                channel(&hex[6..8])?,
            )),
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        // Canvas defaults to black when a colour keyword is sent instead of hex.
        if value.eq_ignore_ascii_case("black") {
            return Ok(Self::BLACK);
        }
        Self::parse_hex(&value).ok_or_else(|| format!("invalid stroke colour '{value}'"))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineCap {
    Butt,
    #[default]
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineJoin {
    Bevel,
    Miter,
    #[default]
    Round,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeStyle {
    #[serde(default = "default_color")]
    pub color: Color,
    #[serde(default = "default_line_width", deserialize_with = "bounded_line_width")]
    pub line_width: u32,
    #[serde(default)]
    pub line_cap: LineCap,
    #[serde(default)]
    pub line_join: LineJoin,
}

fn default_color() -> Color {
    Color::BLACK
}

fn default_line_width() -> u32 {
    2
}

/// Widest stroke accepted off the wire. Anything wider already covers a
/// full canvas.
pub const MAX_LINE_WIDTH: u32 = 1024;

fn bounded_line_width<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let width = u32::deserialize(deserializer)?;
    if width > MAX_LINE_WIDTH {
        tracing::debug!(width, max = MAX_LINE_WIDTH, "clamping stroke width");
    }
    Ok(width.min(MAX_LINE_WIDTH))
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: default_color(),
            line_width: default_line_width(),
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
        }
    }
}

/// Canvas-space position, already rounded to whole pixels by the input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point(pub i32, pub i32);

impl Point {
    pub fn scaled(self, factor: f32) -> Self {
        if (factor - 1.0).abs() <= f32::EPSILON {
            return self;
        }
        Point(
            (self.0 as f32 * factor).round() as i32,
            (self.1 as f32 * factor).round() as i32,
        )
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Point(x, y)
    }
}

/// A committed stroke. Fields are private so a stroke cannot change after
/// [`ActiveStroke::commit`] or after it arrives over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokePath {
    #[serde(rename = "path")]
    points: Vec<Point>,
    canvas_size: u32,
    #[serde(rename = "opts", default)]
    style: StrokeStyle,
    #[serde(rename = "timestamp", with = "crate::protocol::types::timestamp")]
    committed_at: DateTime<Utc>,
}

impl StrokePath {
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn canvas_size(&self) -> u32 {
        self.canvas_size
    }

    pub fn style(&self) -> &StrokeStyle {
        &self.style
    }

    pub fn committed_at(&self) -> DateTime<Utc> {
        self.committed_at
    }
}

/// The stroke currently under the pointer. Grows point by point and is
/// consumed by [`ActiveStroke::commit`].
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveStroke {
    points: Vec<Point>,
    canvas_size: u32,
    style: StrokeStyle,
}

impl ActiveStroke {
    pub fn begin(start: Point, canvas_size: u32, style: StrokeStyle) -> Self {
        Self {
            points: vec![start],
            canvas_size,
            style,
        }
    }

    pub fn append(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn last_point(&self) -> Option<Point> {
        self.points.last().copied()
    }

    pub fn style(&self) -> &StrokeStyle {
        &self.style
    }

    pub fn canvas_size(&self) -> u32 {
        self.canvas_size
    }

    pub fn commit(mut self, committed_at: DateTime<Utc>) -> StrokePath {
        self.points.shrink_to_fit();
        StrokePath {
            points: self.points,
            canvas_size: self.canvas_size,
            style: self.style,
            committed_at,
        }
    }
}
