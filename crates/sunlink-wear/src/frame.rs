//! Frame composition for the two render modes.
//!
//! Composition is pure: it turns the time, the cached snapshot and an
//! optional icon into a list of draw operations. Side effects such as
//! requesting data for an empty frame are left to the caller.

use chrono::NaiveDateTime;
use sunlink_weather::{format_date, format_temperature, format_time, TimeFormat, WeatherSnapshot};

use crate::canvas::{Align, Bounds, Canvas, Color, DrawOp, Point, TextSpan};
use crate::icons::ScaledIcon;

/// Placeholder shown in interactive mode until a snapshot arrives.
pub const WAITING_FOR_DATA: &str = "waiting for data";

/// Half-width of the rule drawn under the date.
const RULE_HALF_WIDTH: f32 = 20.0;

/// Text sizes, all derived from the date line height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub time_size: f32,
    pub date_size: f32,
    pub temp_size: f32,
    pub spacing: f32,
}

impl Layout {
    pub fn new(date_size: f32) -> Self {
        Self {
            time_size: date_size * 2.5,
            date_size,
            temp_size: date_size * 1.5,
            spacing: date_size * 0.5,
        }
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(20.0)
    }
}

/// One composed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    ops: Vec<DrawOp>,
    waiting_for_data: bool,
}

impl Frame {
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// True if the frame shows the placeholder instead of weather.
    pub fn waiting_for_data(&self) -> bool {
        self.waiting_for_data
    }

    pub fn texts(&self) -> Vec<String> {
        self.ops.iter().filter_map(DrawOp::text).collect()
    }

    pub fn render(&self, canvas: &mut dyn Canvas) {
        for op in &self.ops {
            canvas.draw(op);
        }
    }
}

/// Black background with `HH:MM` centred.
///
/// Low-bit ambient displays get aliased text.
pub fn compose_ambient(now: NaiveDateTime, bounds: Bounds, layout: &Layout, low_bit: bool) -> Frame {
    let center = bounds.center();
    let ops = vec![
        DrawOp::Fill(Color::Black),
        DrawOp::Text {
            spans: vec![TextSpan::new(format_time(now, TimeFormat::Ambient), Color::White)],
            origin: Point::new(center.x, center.y + layout.time_size / 2.0),
            size: layout.time_size,
            align: Align::Center,
            anti_alias: !low_bit,
        },
    ];
    Frame {
        ops,
        waiting_for_data: false,
    }
}

/// Time, date, rule and either the weather line or the placeholder.
pub fn compose_interactive(
    now: NaiveDateTime,
    bounds: Bounds,
    layout: &Layout,
    weather: Option<(&WeatherSnapshot, Option<ScaledIcon>)>,
) -> Frame {
    let cx = bounds.center().x;
    let mut ops = vec![DrawOp::Fill(Color::Primary)];

    let time_y = bounds.height * 0.25 + layout.time_size;
    let time = format_time(now, TimeFormat::Interactive);
    let (hour, rest) = time.split_at(2);
    ops.push(DrawOp::Text {
        spans: vec![
            TextSpan::new(hour, Color::White).bold(),
            TextSpan::new(rest, Color::White),
        ],
        origin: Point::new(cx, time_y),
        size: layout.time_size,
        align: Align::Center,
        anti_alias: true,
    });

    let date_y = time_y + layout.spacing + layout.date_size;
    ops.push(DrawOp::Text {
        spans: vec![TextSpan::new(format_date(now), Color::Muted)],
        origin: Point::new(cx, date_y),
        size: layout.date_size,
        align: Align::Center,
        anti_alias: true,
    });

    let rule_y = date_y + layout.spacing;
    ops.push(DrawOp::Rule {
        from: Point::new(cx - RULE_HALF_WIDTH, rule_y),
        to: Point::new(cx + RULE_HALF_WIDTH, rule_y),
        color: Color::Muted,
    });

    let line_y = rule_y + layout.spacing + layout.temp_size;
    let waiting_for_data = weather.is_none();
    match weather {
        Some((snapshot, icon)) => {
            let metric = snapshot.is_metric_preferred;
            let spans = vec![
                TextSpan::new(format_temperature(snapshot.max_temperature, metric), Color::White)
                    .bold(),
                TextSpan::new("/", Color::Muted),
                TextSpan::new(format_temperature(snapshot.min_temperature, metric), Color::Muted),
            ];
            let (text_x, align) = match icon {
                Some(icon) => {
                    ops.push(DrawOp::Icon {
                        kind: icon.kind,
                        origin: Point::new(cx - icon.width - layout.spacing, line_y - icon.height),
                        width: icon.width,
                        height: icon.height,
                    });
                    (cx, Align::Left)
                }
                None => (cx, Align::Center),
            };
            ops.push(DrawOp::Text {
                spans,
                origin: Point::new(text_x, line_y),
                size: layout.temp_size,
                align,
                anti_alias: true,
            });
        }
        None => {
            ops.push(DrawOp::Text {
                spans: vec![TextSpan::new(WAITING_FOR_DATA, Color::Muted)],
                origin: Point::new(cx, line_y),
                size: layout.date_size,
                align: Align::Center,
                anti_alias: true,
            });
        }
    }

    Frame {
        ops,
        waiting_for_data,
    }
}
