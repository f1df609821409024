//! Pixel classification: decides which pixels in a window belong to the marker.

use crate::frame::{Channel, Frame};
use crate::tracker::TrackError;
use crate::window::SearchWindow;

/// Collect the coordinates of every pixel in `window` that qualifies as part
/// of the marker.
///
/// Gray frames qualify a pixel when its intensity exceeds `threshold`. RGB
/// frames qualify a pixel when the nominated channel exceeds the mean of the
/// other two channels by more than `threshold`; classifying an RGB frame
/// without a nominated channel is a configuration error.
///
/// The window is clamped to the frame bounds, silently excluding pixels that
/// fall outside. An empty result is a valid outcome, not an error.
pub fn classify(
    frame: &Frame,
    window: &SearchWindow,
    channel: Option<Channel>,
    threshold: f64,
) -> Result<Vec<[f64; 2]>, TrackError> {
    let (width, height) = frame.dimensions();
    let (xs, ys) = window.clamped(width, height);
    let mut points = Vec::new();

    match frame {
        Frame::Gray(img) => {
            for x in xs {
                for y in ys.clone() {
                    if f64::from(img.get_pixel(x, y)[0]) > threshold {
                        points.push([f64::from(x), f64::from(y)]);
                    }
                }
            }
        }
        Frame::Rgb(img) => {
            let channel = channel.ok_or(TrackError::MissingChannel)?;
            for x in xs {
                for y in ys.clone() {
                    let [r, g, b] = img.get_pixel(x, y).0;
                    let (sel, other_a, other_b) = match channel {
                        Channel::R => (r, g, b),
                        Channel::G => (g, r, b),
                        Channel::B => (b, g, r),
                    };
                    let excess =
                        f64::from(sel) - (f64::from(other_a) + f64::from(other_b)) / 2.0;
                    if excess > threshold {
                        points.push([f64::from(x), f64::from(y)]);
                    }
                }
            }
        }
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn gray_with_spot(w: u32, h: u32, spot: (u32, u32), value: u8) -> Frame {
        let mut img = GrayImage::from_pixel(w, h, Luma([10]));
        img.put_pixel(spot.0, spot.1, Luma([value]));
        Frame::Gray(img)
    }

    #[test]
    fn gray_pixel_above_threshold_qualifies() {
        let frame = gray_with_spot(5, 5, (2, 3), 200);
        let window = SearchWindow::centered([2.0, 2.0], 5);
        let points = classify(&frame, &window, None, 150.0).unwrap();
        assert_eq!(points, vec![[2.0, 3.0]]);
    }

    #[test]
    fn gray_threshold_is_strict() {
        let frame = gray_with_spot(5, 5, (2, 3), 150);
        let window = SearchWindow::centered([2.0, 2.0], 5);
        let points = classify(&frame, &window, None, 150.0).unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn rgb_channel_excess_over_other_two() {
        let mut img = RgbImage::from_pixel(5, 5, Rgb([10, 10, 10]));
        img.put_pixel(1, 1, Rgb([200, 10, 30]));
        let frame = Frame::Rgb(img);
        let window = SearchWindow::centered([2.0, 2.0], 5);

        // 200 - (10 + 30) / 2 = 180 for the red channel
        let red = classify(&frame, &window, Some(Channel::R), 150.0).unwrap();
        assert_eq!(red, vec![[1.0, 1.0]]);

        let green = classify(&frame, &window, Some(Channel::G), 150.0).unwrap();
        assert!(green.is_empty());
    }

    #[test]
    fn rgb_without_channel_is_a_configuration_error() {
        let frame = Frame::Rgb(RgbImage::from_pixel(5, 5, Rgb([10, 10, 10])));
        let window = SearchWindow::centered([2.0, 2.0], 5);
        let err = classify(&frame, &window, None, 150.0).unwrap_err();
        assert!(matches!(err, TrackError::MissingChannel));
    }

    #[test]
    fn window_outside_the_frame_is_silently_excluded() {
        let frame = gray_with_spot(5, 5, (0, 0), 200);
        let window = SearchWindow::centered([0.0, 0.0], 3);
        let points = classify(&frame, &window, None, 150.0).unwrap();
        assert_eq!(points, vec![[0.0, 0.0]]);
    }
}
