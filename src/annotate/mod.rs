//! Draws match results onto frames.

use image::Rgb;
use opencv::core::{Mat, Point, Rect, Scalar, CV_8UC3};
use opencv::imgproc;
use opencv::prelude::*;

use crate::camera::Frame;
use crate::config::DisplayConfig;
use crate::faces::{BoundingBox, MatchResult};

pub const KNOWN_COLOR: Rgb<u8> = Rgb([0, 200, 0]);
pub const UNKNOWN_COLOR: Rgb<u8> = Rgb([220, 0, 0]);
pub const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const FONT: i32 = imgproc::FONT_HERSHEY_DUPLEX;
const TEXT_THICKNESS: i32 = 1;
/// Space between the strip edge and the label text
const PADDING: i32 = 3;

#[derive(Debug, Clone)]
pub struct AnnotateStyle {
    pub known_color: Rgb<u8>,
    pub unknown_color: Rgb<u8>,
    pub text_color: Rgb<u8>,
    /// Outline thickness in pixels
    pub thickness: u32,
    pub font_scale: f64,
    /// Append the match distance to the label
    pub show_distance: bool,
}

impl Default for AnnotateStyle {
    fn default() -> Self {
        Self {
            known_color: KNOWN_COLOR,
            unknown_color: UNKNOWN_COLOR,
            text_color: TEXT_COLOR,
            thickness: 2,
            font_scale: 1.0,
            show_distance: false,
        }
    }
}

impl From<&DisplayConfig> for AnnotateStyle {
    fn from(config: &DisplayConfig) -> Self {
        let font_scale = if config.text_scale.is_finite() && config.text_scale > 0.0 {
            config.text_scale
        } else {
            1.0
        };
        Self {
            thickness: config.box_thickness.max(1),
            font_scale,
            show_distance: config.show_distance,
            ..Self::default()
        }
    }
}

/// Frame bytes are RGB, so channel order is kept as is.
fn scalar(color: Rgb<u8>) -> Scalar {
    Scalar::new(color[0] as f64, color[1] as f64, color[2] as f64, 0.0)
}

fn frame_to_mat(frame: &Frame) -> opencv::Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        frame.height() as i32,
        frame.width() as i32,
        CV_8UC3,
        Scalar::all(0.0),
    )?;
    mat.data_bytes_mut()?.copy_from_slice(frame.as_raw());
    Ok(mat)
}

/// Intersection of a face box with the frame, `None` when nothing is left
fn clamp_box(bbox: &BoundingBox, width: i32, height: i32) -> Option<Rect> {
    let x0 = bbox.left.max(0);
    let y0 = bbox.top.max(0);
    let x1 = bbox.right.min(width);
    let y1 = bbox.bottom.min(height);
    (x0 < x1 && y0 < y1).then(|| Rect::new(x0, y0, x1 - x0, y1 - y0))
}

/// Height of the filled label strip for a font scale
pub fn strip_height(font_scale: f64) -> opencv::Result<i32> {
    let mut baseline = 0;
    let size = imgproc::get_text_size("Ag", FONT, font_scale, TEXT_THICKNESS, &mut baseline)?;
    Ok(size.height + baseline + 2 * PADDING)
}

/// Longest prefix of `text` that renders within `max_width` pixels
fn fit_text(text: &str, max_width: i32, font_scale: f64) -> opencv::Result<String> {
    let mut fitted = text.to_string();
    let mut baseline = 0;
    while !fitted.is_empty()
        && imgproc::get_text_size(&fitted, FONT, font_scale, TEXT_THICKNESS, &mut baseline)?.width > max_width
    {
        fitted.pop();
    }
    Ok(fitted)
}

/// Text shown under a face
pub fn label_text(result: &MatchResult, show_distance: bool) -> String {
    match (show_distance, result.distance) {
        (true, Some(distance)) => format!("{} {:.2}", result.display_label(), distance),
        _ => result.display_label().to_string(),
    }
}

/// Draw a box and a label strip for every observation.
///
/// Known identities are outlined in the known colour, everything else in
/// the unknown colour. The strip sits directly below the box, or inside
/// the bottom of the box when the frame has no room below it. Boxes that
/// lie entirely outside the frame are skipped. The frame is left untouched
/// when drawing fails.
pub fn annotate(
    frame: &mut Frame,
    items: &[(BoundingBox, &MatchResult)],
    style: &AnnotateStyle,
) -> opencv::Result<()> {
    if items.is_empty() || frame.width() == 0 || frame.height() == 0 {
        return Ok(());
    }

    let (width, height) = (frame.width() as i32, frame.height() as i32);
    let thickness = style.thickness.max(1) as i32;
    let strip_height = strip_height(style.font_scale)?;
    let mut mat = frame_to_mat(frame)?;

    for (bbox, result) in items {
        let Some(face) = clamp_box(bbox, width, height) else {
            continue;
        };

        let color = scalar(if result.is_known() {
            style.known_color
        } else {
            style.unknown_color
        });

        imgproc::rectangle(&mut mat, face, color, thickness, imgproc::LINE_8, 0)?;

        let face_bottom = face.y + face.height;
        let strip_top = if face_bottom + strip_height <= height {
            face_bottom
        } else {
            (face_bottom - strip_height).max(face.y)
        };
        let strip = Rect::new(face.x, strip_top, face.width, strip_height.min(height - strip_top));
        imgproc::rectangle(&mut mat, strip, color, imgproc::FILLED, imgproc::LINE_8, 0)?;

        let text = fit_text(
            &label_text(result, style.show_distance),
            strip.width - 2 * PADDING,
            style.font_scale,
        )?;
        if text.is_empty() {
            continue;
        }

        let mut baseline = 0;
        let text_size = imgproc::get_text_size(&text, FONT, style.font_scale, TEXT_THICKNESS, &mut baseline)?;
        imgproc::put_text(
            &mut mat,
            &text,
            Point::new(strip.x + PADDING, strip.y + PADDING + text_size.height),
            FONT,
            style.font_scale,
            scalar(style.text_color),
            TEXT_THICKNESS,
            imgproc::LINE_8,
            false,
        )?;
    }

    (**frame).copy_from_slice(mat.data_bytes()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    fn known(label: &str) -> MatchResult {
        MatchResult {
            label: Some(label.to_string()),
            distance: Some(0.25),
            compared: 1,
        }
    }

    fn unknown() -> MatchResult {
        MatchResult {
            label: None,
            distance: Some(0.9),
            compared: 1,
        }
    }

    fn style() -> AnnotateStyle {
        AnnotateStyle {
            thickness: 1,
            font_scale: 0.4,
            ..AnnotateStyle::default()
        }
    }

    fn count(frame: &Frame, color: Rgb<u8>) -> usize {
        frame.pixels().filter(|p| **p == color).count()
    }

    #[test]
    fn test_known_face_green_box_and_strip_below() {
        let mut frame = Frame::new(100, 100);
        let result = known("AL");
        annotate(&mut frame, &[(BoundingBox::new(10, 60, 40, 20), &result)], &style()).unwrap();
        let strip = strip_height(0.4).unwrap() as u32;

        // Corners of the outline
        assert_eq!(*frame.get_pixel(20, 10), KNOWN_COLOR);
        assert_eq!(*frame.get_pixel(59, 39), KNOWN_COLOR);
        // Interior untouched
        assert_eq!(*frame.get_pixel(40, 25), BLACK);
        // Strip starts at the box bottom
        assert_eq!(*frame.get_pixel(59, 40), KNOWN_COLOR);
        assert_eq!(*frame.get_pixel(59, 40 + strip - 1), KNOWN_COLOR);
        assert_eq!(*frame.get_pixel(59, 40 + strip), BLACK);
        // Label text is white inside the strip
        assert!(count(&frame, TEXT_COLOR) > 0);
        assert!(frame
            .enumerate_pixels()
            .filter(|(_, _, p)| **p == TEXT_COLOR)
            .all(|(x, y, _)| (20..60).contains(&x) && (40..40 + strip).contains(&y)));
    }

    #[test]
    fn test_unknown_face_red() {
        let mut frame = Frame::new(50, 50);
        let result = unknown();
        annotate(&mut frame, &[(BoundingBox::new(5, 30, 20, 5), &result)], &style()).unwrap();

        assert_eq!(*frame.get_pixel(5, 5), UNKNOWN_COLOR);
        assert_eq!(count(&frame, KNOWN_COLOR), 0);
    }

    #[test]
    fn test_strip_moves_inside_at_frame_bottom() {
        let mut frame = Frame::new(60, 60);
        let result = known("B");
        annotate(&mut frame, &[(BoundingBox::new(10, 50, 60, 20), &result)], &style()).unwrap();
        let strip = strip_height(0.4).unwrap() as u32;

        // Strip occupies the bottom rows of the box
        assert_eq!(*frame.get_pixel(48, 59), KNOWN_COLOR);
        assert_eq!(*frame.get_pixel(48, 60 - strip), KNOWN_COLOR);
        assert_eq!(*frame.get_pixel(48, 60 - strip - 1), BLACK);
    }

    #[test]
    fn test_box_outside_frame_skipped() {
        let mut frame = Frame::new(20, 20);
        let result = known("X");
        annotate(&mut frame, &[(BoundingBox::new(30, 50, 40, 25), &result)], &style()).unwrap();
        assert_eq!(count(&frame, BLACK), 400);
    }

    #[test]
    fn test_partially_outside_box_is_clamped() {
        let mut frame = Frame::new(20, 20);
        let result = unknown();
        annotate(&mut frame, &[(BoundingBox::new(-5, 30, 10, -10), &result)], &style()).unwrap();

        assert_eq!(*frame.get_pixel(0, 0), UNKNOWN_COLOR);
        assert_eq!(*frame.get_pixel(19, 0), UNKNOWN_COLOR);
    }

    #[test]
    fn test_long_label_clipped_to_strip() {
        let mut frame = Frame::new(100, 60);
        let result = known("A VERY LONG NAME INDEED");
        annotate(&mut frame, &[(BoundingBox::new(0, 30, 10, 0), &result)], &style()).unwrap();

        assert!(count(&frame, TEXT_COLOR) > 0);
        assert!(frame
            .enumerate_pixels()
            .filter(|(_, _, p)| **p == TEXT_COLOR)
            .all(|(x, _, _)| x < 30));
    }

    #[test]
    fn test_no_items_leaves_frame_alone() {
        let mut frame = Frame::from_pixel(8, 8, Rgb([10, 20, 30]));
        annotate(&mut frame, &[], &style()).unwrap();
        assert_eq!(count(&frame, Rgb([10, 20, 30])), 64);
    }

    #[test]
    fn test_label_text() {
        assert_eq!(label_text(&known("Alice"), false), "Alice");
        assert_eq!(label_text(&known("Alice"), true), "Alice 0.25");
        assert_eq!(label_text(&unknown(), false), "Unknown");
        assert_eq!(label_text(&MatchResult::unknown(), true), "Unknown");
    }

    #[test]
    fn test_style_from_config() {
        let config = DisplayConfig {
            box_thickness: 0,
            text_scale: 0.7,
            show_distance: true,
            ..DisplayConfig::default()
        };
        let style = AnnotateStyle::from(&config);
        assert_eq!(style.thickness, 1);
        assert!((style.font_scale - 0.7).abs() < f64::EPSILON);
        assert!(style.show_distance);

        let broken = DisplayConfig {
            text_scale: -1.0,
            ..DisplayConfig::default()
        };
        assert!((AnnotateStyle::from(&broken).font_scale - 1.0).abs() < f64::EPSILON);
    }
}
