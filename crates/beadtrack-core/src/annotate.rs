//! Overlay of tracked centroids onto frame copies for visual verification.

use image::{DynamicImage, Rgb, RgbImage};

use crate::frame::Frame;

/// Marker dot color used for tracked-frame exports.
const DOT_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

/// Return an RGB copy of `frame` with a filled square dot of half-size
/// `dot_radius` centered on the rounded centroid. Dot pixels falling outside
/// the frame are skipped.
pub fn annotate(frame: &Frame, centroid: [f64; 2], dot_radius: u32) -> RgbImage {
    let mut out = match frame {
        Frame::Gray(img) => DynamicImage::ImageLuma8(img.clone()).to_rgb8(),
        Frame::Rgb(img) => img.clone(),
    };
    let (width, height) = out.dimensions();
    let cx = centroid[0].round() as i64;
    let cy = centroid[1].round() as i64;
    let d = i64::from(dot_radius);
    for y in (cy - d)..=(cy + d) {
        for x in (cx - d)..=(cx + d) {
            if (0..i64::from(width)).contains(&x) && (0..i64::from(height)).contains(&y) {
                out.put_pixel(x as u32, y as u32, DOT_COLOR);
            }
        }
    }
    out
}
