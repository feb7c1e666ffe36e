//! Wearable display controller.
//!
//! Keeps the latest weather snapshot from the paired handheld and renders
//! it on a watch face with an interactive and an ambient mode.

pub mod canvas;
pub mod clock;
pub mod face;
pub mod frame;
pub mod icons;
pub mod throttle;

pub use canvas::{Align, Bounds, Canvas, Color, DrawOp, Point, RecordingCanvas, TextSpan, Weight};
pub use clock::{delay_to_next_second, FixedClock, SystemClock, WallClock};
pub use face::{DisplayState, FaceEvent, FaceOptions, WatchFace};
pub use frame::{compose_ambient, compose_interactive, Frame, Layout, WAITING_FOR_DATA};
pub use icons::{BundledIcons, IconBitmap, IconCache, IconError, IconLoader, ScaledIcon};
pub use throttle::{RequestThrottle, REQUEST_COOLDOWN};
