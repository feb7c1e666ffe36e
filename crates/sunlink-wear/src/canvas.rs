//! Drawing primitives and the canvas the face renders onto.

use sunlink_weather::IconKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Drawable area in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Black,
    /// Interactive background.
    Primary,
    White,
    /// Secondary text such as the date and the minimum temperature.
    Muted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Weight {
    #[default]
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

/// A run of text sharing one style.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub weight: Weight,
    pub color: Color,
}

impl TextSpan {
    pub fn new(text: impl Into<String>, color: Color) -> Self {
        Self {
            text: text.into(),
            weight: Weight::Normal,
            color,
        }
    }

    pub fn bold(mut self) -> Self {
        self.weight = Weight::Bold;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Fill(Color),
    Text {
        spans: Vec<TextSpan>,
        origin: Point,
        size: f32,
        align: Align,
        anti_alias: bool,
    },
    Rule {
        from: Point,
        to: Point,
        color: Color,
    },
    Icon {
        kind: IconKind,
        origin: Point,
        width: f32,
        height: f32,
    },
}

impl DrawOp {
    /// Concatenated text of a text op.
    pub fn text(&self) -> Option<String> {
        match self {
            DrawOp::Text { spans, .. } => Some(spans.iter().map(|s| s.text.as_str()).collect()),
            _ => None,
        }
    }
}

/// Render target supplied by the host.
pub trait Canvas {
    fn bounds(&self) -> Bounds;
    fn draw(&mut self, op: &DrawOp);
}

/// Canvas that keeps the draw operations of the last frame.
#[derive(Debug, Clone)]
pub struct RecordingCanvas {
    bounds: Bounds,
    ops: Vec<DrawOp>,
    frames: usize,
}

impl RecordingCanvas {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            bounds: Bounds::new(width, height),
            ops: Vec::new(),
            frames: 0,
        }
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Number of frames drawn so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn texts(&self) -> Vec<String> {
        self.ops.iter().filter_map(DrawOp::text).collect()
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.texts().iter().any(|t| t.contains(needle))
    }

    pub fn icons(&self) -> Vec<IconKind> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Icon { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect()
    }
}

impl Canvas for RecordingCanvas {
    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn draw(&mut self, op: &DrawOp) {
        // A fill starts a new frame.
        if matches!(op, DrawOp::Fill(_)) {
            self.ops.clear();
            self.frames += 1;
        }
        self.ops.push(op.clone());
    }
}
