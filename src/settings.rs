use crate::draw::model::{Color, StrokeStyle};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidthRange {
    pub min: u32,
    pub max: u32,
}

impl Default for WidthRange {
    fn default() -> Self {
        Self { min: 1, max: 50 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default)]
    pub username: String,
    /// Run as the shared host display instead of a player device.
    #[serde(default)]
    pub is_host: bool,
    /// Logical canvas edge in pixels; strokes are recorded in this space.
    #[serde(default = "default_canvas_size")]
    pub canvas_size: u32,
    #[serde(default = "default_brush_color")]
    pub brush_color: String,
    #[serde(default = "default_brush_width")]
    pub brush_width: u32,
    #[serde(default)]
    pub brush_width_range: WidthRange,
    #[serde(default = "default_title_max_len")]
    pub title_max_len: usize,
    /// How far into a drawing phase the submit reminder fires.
    #[serde(default = "default_reminder_fraction")]
    pub reminder_fraction: f64,
    #[serde(default = "default_poll_early_close_ms")]
    pub poll_early_close_ms: u64,
    #[serde(default = "default_storage_budget_bytes")]
    pub storage_budget_bytes: usize,
    #[serde(default)]
    pub debug_logging: bool,
}

fn default_canvas_size() -> u32 {
    375
}

fn default_brush_color() -> String {
    "#000000".into()
}

fn default_brush_width() -> u32 {
    10
}

fn default_title_max_len() -> usize {
    64
}

fn default_reminder_fraction() -> f64 {
    0.9
}

fn default_poll_early_close_ms() -> u64 {
    500
}

fn default_storage_budget_bytes() -> usize {
    5 * 1024 * 1024
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            username: String::new(),
            is_host: false,
            canvas_size: default_canvas_size(),
            brush_color: default_brush_color(),
            brush_width: default_brush_width(),
            brush_width_range: WidthRange::default(),
            title_max_len: default_title_max_len(),
            reminder_fraction: default_reminder_fraction(),
            poll_early_close_ms: default_poll_early_close_ms(),
            storage_budget_bytes: default_storage_budget_bytes(),
            debug_logging: false,
        }
    }
}

impl ClientSettings {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&content).with_context(|| format!("parse settings file {path}"))
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("write settings file {path}"))?;
        Ok(())
    }

    pub fn brush_width_range(&self) -> RangeInclusive<u32> {
        let WidthRange { min, max } = self.brush_width_range;
        let min = min.max(1);
        min..=max.max(min)
    }

    /// Initial brush. An unparseable colour falls back to black.
    pub fn brush_style(&self) -> StrokeStyle {
        let color = match Color::parse_hex(&self.brush_color) {
            Some(color) => color,
            None => {
                tracing::warn!(
                    "provided brush colour '{}' is invalid; using black",
                    self.brush_color
                );
                Color::BLACK
            }
        };
        StrokeStyle {
            color,
            line_width: self.brush_width,
            ..StrokeStyle::default()
        }
    }
}
