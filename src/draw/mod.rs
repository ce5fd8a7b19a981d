//! Stroke model, rasterizer and the capture controller that turns pointer
//! input into PATH/CLEAR/IMAGE messages.

pub mod capture;
pub mod history;
pub mod model;
pub mod render;
pub mod snapshot;

pub use capture::DrawingCapture;
pub use history::{DrawingSurface, StrokeHistory};
pub use model::{ActiveStroke, Color, LineCap, LineJoin, Point, StrokePath, StrokeStyle};
pub use render::{render, DrawTarget, RgbaCanvas};
