//! Gaussian blur stage (`gegl:gaussian-blur`).
//!
//! Small deviations run the exact separable kernel through
//! [`imageproc::filter::horizontal_filter`] and
//! [`imageproc::filter::vertical_filter`]. Large ones switch to three
//! running-sum box passes, whose cost per pixel does not depend on the
//! deviation. The pixel wheel relies on that: its stretch blurs rows with
//! a deviation of 1500, far wider than most images.
//!
//! Borders are clamped to the edge pixel on both paths.

use image::{GrayImage, Rgba32FImage};
use imageproc::filter::{horizontal_filter, vertical_filter};

use crate::schema::{ParamSpec, Schema};
use crate::types::{Params, RgbaImage, WheelError};

/// Declared parameters.
pub const SCHEMA: Schema = Schema::new(&[
    ParamSpec::double("std-dev-x", "Size X", 1.5, 0.0, 1500.0)
        .description("Standard deviation for the horizontal axis"),
    ParamSpec::double("std-dev-y", "Size Y", 1.5, 0.0, 1500.0)
        .description("Standard deviation for the vertical axis"),
]);

/// Deviations above this use the box approximation.
const DIRECT_MAX_SIGMA: f32 = 16.0;

/// Box passes that stand in for one Gaussian.
const BOX_PASSES: usize = 3;

/// Read `(std-dev-x, std-dev-y)` from a stage's parameter set.
///
/// # Errors
///
/// Propagates missing or mistyped parameters.
#[allow(clippy::cast_possible_truncation)]
pub fn deviations_from_params(params: &Params) -> Result<(f32, f32), WheelError> {
    Ok((
        params.double("std-dev-x")? as f32,
        params.double("std-dev-y")? as f32,
    ))
}

/// True when a deviation blurs nothing at 8-bit precision, including
/// values so small that `2 * sigma^2` underflows.
fn is_negligible(sigma: f32) -> bool {
    !(sigma > 0.0 && (2.0 * sigma * sigma).is_normal())
}

/// Apply Gaussian blur with independent horizontal and vertical
/// deviations. Negligible deviations skip that axis.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur_xy(image: &RgbaImage, std_dev_x: f32, std_dev_y: f32) -> RgbaImage {
    let blur_x = !is_negligible(std_dev_x);
    let blur_y = !is_negligible(std_dev_y);
    if !(blur_x || blur_y) || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    if (std_dev_x - std_dev_y).abs() < f32::EPSILON && std_dev_x <= DIRECT_MAX_SIGMA {
        return gaussian_blur_rgba(image, std_dev_x);
    }

    let mut buffer = to_float(image);
    if blur_x {
        buffer = blur_axis(&buffer, std_dev_x, Axis::Horizontal);
    }
    if blur_y {
        buffer = blur_axis(&buffer, std_dev_y, Axis::Vertical);
    }
    to_bytes(&buffer)
}

/// Apply Gaussian blur to an RGBA image by blurring each channel
/// independently.
///
/// Negligible sigma values return the image unchanged, since
/// `imageproc`'s underlying function panics on `sigma <= 0.0` and builds a
/// NaN kernel once `2 * sigma^2` underflows.
#[must_use = "returns the blurred RGBA image"]
pub fn gaussian_blur_rgba(image: &RgbaImage, sigma: f32) -> RgbaImage {
    if is_negligible(sigma) {
        return image.clone();
    }

    let (w, h) = (image.width(), image.height());

    let channels: [GrayImage; 4] = std::array::from_fn(|c| {
        GrayImage::from_fn(w, h, |x, y| image::Luma([image.get_pixel(x, y).0[c]]))
    });

    let blurred: [GrayImage; 4] =
        std::array::from_fn(|c| imageproc::filter::gaussian_blur_f32(&channels[c], sigma));

    RgbaImage::from_fn(w, h, |x, y| {
        image::Rgba([
            blurred[0].get_pixel(x, y).0[0],
            blurred[1].get_pixel(x, y).0[0],
            blurred[2].get_pixel(x, y).0[0],
            blurred[3].get_pixel(x, y).0[0],
        ])
    })
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    Horizontal,
    Vertical,
}

fn to_float(image: &RgbaImage) -> Rgba32FImage {
    Rgba32FImage::from_fn(image.width(), image.height(), |x, y| {
        image::Rgba(image.get_pixel(x, y).0.map(f32::from))
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_bytes(image: &Rgba32FImage) -> RgbaImage {
    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        image::Rgba(image.get_pixel(x, y).0.map(|v| v.round().clamp(0.0, 255.0) as u8))
    })
}

fn blur_axis(image: &Rgba32FImage, sigma: f32, axis: Axis) -> Rgba32FImage {
    if sigma <= DIRECT_MAX_SIGMA {
        return direct_blur_axis(image, sigma, axis);
    }
    box_radii(sigma)
        .into_iter()
        .fold(image.clone(), |acc, radius| box_pass(&acc, radius, axis))
}

fn direct_blur_axis(image: &Rgba32FImage, sigma: f32, axis: Axis) -> Rgba32FImage {
    let weights = kernel(sigma);
    match axis {
        Axis::Horizontal => horizontal_filter(image, &weights),
        Axis::Vertical => vertical_filter(image, &weights),
    }
}

/// Normalized 1-D Gaussian kernel of radius `ceil(3 * sigma)`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn kernel(sigma: f32) -> Vec<f32> {
    let radius = (3.0 * sigma).ceil() as usize;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut weights: Vec<f32> = (0..=2 * radius)
        .map(|i| {
            let d = i as f32 - radius as f32;
            (-(d * d) / two_sigma_sq).exp()
        })
        .collect();
    let total: f32 = weights.iter().sum();
    for w in &mut weights {
        *w /= total;
    }
    weights
}

/// Radii of the box passes whose combined variance best matches `sigma^2`.
///
/// Widths are odd and differ by at most two between passes.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn box_radii(sigma: f32) -> [u32; BOX_PASSES] {
    let passes = BOX_PASSES as f64;
    let variance = 12.0 * f64::from(sigma) * f64::from(sigma);
    let ideal = (variance / passes + 1.0).sqrt();
    let mut lower = (ideal.floor() as u32).max(1);
    if lower % 2 == 0 {
        lower -= 1;
    }
    let l = f64::from(lower);
    let narrow = ((variance - passes * l * l - 4.0 * passes * l - 3.0 * passes) / (-4.0 * l - 4.0))
        .round()
        .clamp(0.0, passes) as usize;
    std::array::from_fn(|i| {
        let width = if i < narrow { lower } else { lower + 2 };
        (width - 1) / 2
    })
}

/// One mean filter of width `2 * radius + 1` along `axis`, with the edge
/// pixel repeated past each border. Prefix sums keep it O(1) per pixel for
/// any radius.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn box_pass(image: &Rgba32FImage, radius: u32, axis: Axis) -> Rgba32FImage {
    let (w, h) = image.dimensions();
    let (len, lines) = match axis {
        Axis::Horizontal => (w, h),
        Axis::Vertical => (h, w),
    };
    let coords = |line: u32, i: u32| match axis {
        Axis::Horizontal => (i, line),
        Axis::Vertical => (line, i),
    };
    let mut out = Rgba32FImage::new(w, h);
    if len == 0 {
        return out;
    }

    let last = i64::from(len) - 1;
    let r = i64::from(radius);
    let width = f64::from(2 * radius + 1);
    let mut prefix = vec![[0f64; 4]; len as usize + 1];

    for line in 0..lines {
        for i in 0..len {
            let (x, y) = coords(line, i);
            let p = image.get_pixel(x, y).0;
            let prev = prefix[i as usize];
            prefix[i as usize + 1] = std::array::from_fn(|c| prev[c] + f64::from(p[c]));
        }
        let (x0, y0) = coords(line, 0);
        let (xn, yn) = coords(line, len - 1);
        let first = image.get_pixel(x0, y0).0;
        let end = image.get_pixel(xn, yn).0;

        for i in 0..len {
            let lo = i64::from(i) - r;
            let hi = i64::from(i) + r;
            let before = (-lo).max(0) as f64;
            let after = (hi - last).max(0) as f64;
            let inner_hi = hi.min(last) as usize + 1;
            let inner_lo = lo.max(0) as usize;
            let value: [f32; 4] = std::array::from_fn(|c| {
                let inner = prefix[inner_hi][c] - prefix[inner_lo][c];
                let sum = before.mul_add(f64::from(first[c]), inner);
                (after.mul_add(f64::from(end[c]), sum) / width) as f32
            });
            let (x, y) = coords(line, i);
            out.put_pixel(x, y, image::Rgba(value));
        }
    }
    out
}
