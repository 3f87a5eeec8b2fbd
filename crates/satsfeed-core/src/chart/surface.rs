use std::fmt::Write as _;

/// Horizontal text anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Start,
    Middle,
    End,
}

/// Canvas-like 2D drawing target. Coordinates are CSS pixels; the surface
/// applies its scale to reach device pixels.
pub trait Surface: Send {
    fn set_pixel_size(&mut self, width: u32, height: u32);
    fn set_scale(&mut self, ratio: f64);
    /// Starts a new frame; everything drawn before is discarded.
    fn clear(&mut self);
    fn begin_path(&mut self);
    fn move_to(&mut self, x: f64, y: f64);
    fn line_to(&mut self, x: f64, y: f64);
    fn close_path(&mut self);
    fn stroke(&mut self, color: &str, width: f64);
    fn fill(&mut self, color: &str);
    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: &str);
    fn fill_text(&mut self, text: &str, x: f64, y: f64, color: &str, align: TextAlign);
}

/// One recorded drawing call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    BeginPath,
    MoveTo(f64, f64),
    LineTo(f64, f64),
    ClosePath,
    Stroke { color: String, width: f64 },
    Fill { color: String },
    FillRect { x: f64, y: f64, width: f64, height: f64, color: String },
    Text { text: String, x: f64, y: f64, align: TextAlign },
}

/// Surface that records the current frame for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSurface {
    pixel_size: (u32, u32),
    scale: f64,
    frames: usize,
    ops: Vec<DrawOp>,
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self {
            pixel_size: (0, 0),
            scale: 1.0,
            frames: 0,
            ops: Vec::new(),
        }
    }
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        self.pixel_size
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Number of `clear` calls, i.e. frames drawn.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Operations of the current frame only.
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&DrawOp) -> bool) -> usize {
        self.ops.iter().filter(|op| predicate(op)).count()
    }
}

impl Surface for RecordingSurface {
    fn set_pixel_size(&mut self, width: u32, height: u32) {
        self.pixel_size = (width, height);
    }

    fn set_scale(&mut self, ratio: f64) {
        self.scale = ratio;
    }

    fn clear(&mut self) {
        self.frames += 1;
        self.ops.clear();
    }

    fn begin_path(&mut self) {
        self.ops.push(DrawOp::BeginPath);
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.ops.push(DrawOp::MoveTo(x, y));
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.ops.push(DrawOp::LineTo(x, y));
    }

    fn close_path(&mut self) {
        self.ops.push(DrawOp::ClosePath);
    }

    fn stroke(&mut self, color: &str, width: f64) {
        self.ops.push(DrawOp::Stroke {
            color: color.to_owned(),
            width,
        });
    }

    fn fill(&mut self, color: &str) {
        self.ops.push(DrawOp::Fill {
            color: color.to_owned(),
        });
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: &str) {
        self.ops.push(DrawOp::FillRect {
            x,
            y,
            width,
            height,
            color: color.to_owned(),
        });
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, _color: &str, align: TextAlign) {
        self.ops.push(DrawOp::Text {
            text: text.to_owned(),
            x,
            y,
            align,
        });
    }
}

/// Surface that renders the current frame as an SVG document.
#[derive(Debug, Clone, PartialEq)]
pub struct SvgSurface {
    pixel_size: (u32, u32),
    scale: f64,
    path: String,
    elements: Vec<String>,
}

impl Default for SvgSurface {
    fn default() -> Self {
        Self {
            pixel_size: (0, 0),
            scale: 1.0,
            path: String::new(),
            elements: Vec::new(),
        }
    }
}

impl SvgSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_svg(&self) -> String {
        let (width, height) = self.pixel_size;
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
        );
        let _ = write!(svg, r#"<g transform="scale({})">"#, trim_float(self.scale));
        for element in &self.elements {
            svg.push_str(element);
        }
        svg.push_str("</g></svg>\n");
        svg
    }
}

impl Surface for SvgSurface {
    fn set_pixel_size(&mut self, width: u32, height: u32) {
        self.pixel_size = (width, height);
    }

    fn set_scale(&mut self, ratio: f64) {
        self.scale = ratio;
    }

    fn clear(&mut self) {
        self.path.clear();
        self.elements.clear();
    }

    fn begin_path(&mut self) {
        self.path.clear();
    }

    fn move_to(&mut self, x: f64, y: f64) {
        let _ = write!(self.path, "M{} {} ", trim_float(x), trim_float(y));
    }

    fn line_to(&mut self, x: f64, y: f64) {
        let _ = write!(self.path, "L{} {} ", trim_float(x), trim_float(y));
    }

    fn close_path(&mut self) {
        self.path.push_str("Z ");
    }

    fn stroke(&mut self, color: &str, width: f64) {
        self.elements.push(format!(
            r#"<path d="{}" fill="none" stroke="{}" stroke-width="{}" stroke-linejoin="round" stroke-linecap="round"/>"#,
            self.path.trim_end(),
            escape(color),
            trim_float(width)
        ));
    }

    fn fill(&mut self, color: &str) {
        self.elements.push(format!(
            r#"<path d="{}" fill="{}" stroke="none"/>"#,
            self.path.trim_end(),
            escape(color)
        ));
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: &str) {
        self.elements.push(format!(
            r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{}"/>"#,
            trim_float(x),
            trim_float(y),
            trim_float(width),
            trim_float(height),
            escape(color)
        ));
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, color: &str, align: TextAlign) {
        let anchor = match align {
            TextAlign::Start => "start",
            TextAlign::Middle => "middle",
            TextAlign::End => "end",
        };
        self.elements.push(format!(
            r#"<text x="{}" y="{}" fill="{}" text-anchor="{anchor}" font-family="sans-serif" font-size="11">{}</text>"#,
            trim_float(x),
            trim_float(y),
            escape(color),
            escape(text)
        ));
    }
}

fn trim_float(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{rounded:.0}")
    } else {
        rounded.to_string()
    }
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_surface_keeps_only_current_frame() {
        let mut surface = RecordingSurface::new();
        surface.clear();
        surface.fill_rect(0.0, 0.0, 1.0, 1.0, "#000");
        surface.clear();
        surface.fill_text("hi", 1.0, 2.0, "#000", TextAlign::Start);

        assert_eq!(surface.frames(), 2);
        assert_eq!(surface.texts(), vec!["hi"]);
        assert_eq!(surface.ops().len(), 1);
    }

    #[test]
    fn svg_surface_emits_scaled_document() {
        let mut surface = SvgSurface::new();
        surface.set_pixel_size(200, 100);
        surface.set_scale(2.0);
        surface.clear();
        surface.begin_path();
        surface.move_to(0.0, 0.0);
        surface.line_to(10.5, 20.0);
        surface.stroke("#0c63ff", 2.0);
        surface.fill_text("<$1k>", 5.0, 5.0, "#111", TextAlign::End);

        let svg = surface.to_svg();

        assert!(svg.starts_with(r#"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="100""#));
        assert!(svg.contains(r#"<g transform="scale(2)">"#));
        assert!(svg.contains(r#"d="M0 0 L10.5 20""#));
        assert!(svg.contains("&lt;$1k&gt;"));
    }
}
