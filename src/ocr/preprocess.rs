use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbaImage};
use imageproc::contrast::adaptive_threshold;

/// Contrast limit for CLAHE, as a multiple of the mean histogram bin height.
const CLAHE_CLIP_LIMIT: f32 = 2.0;
/// CLAHE tile grid (columns, rows).
const CLAHE_TILES: (u32, u32) = (8, 8);

/// Adaptive threshold neighbourhood radius (an 11x11 block).
const THRESHOLD_BLOCK_RADIUS: u32 = 5;
const THRESHOLD_DELTA: i32 = 2;

/// Captures smaller than this are upscaled before OCR.
pub const MIN_OCR_WIDTH: u32 = 400;
pub const MIN_OCR_HEIGHT: u32 = 200;

/// Prepares a capture for the enhanced OCR profile.
///
/// Grayscale → local contrast enhancement → adaptive binarization → upscale.
/// The result is always dark text on a light background.
pub fn preprocess_for_ocr(img: &RgbaImage) -> GrayImage {
    let gray = imageops::grayscale(img);
    let enhanced = clahe(&gray, CLAHE_CLIP_LIMIT, CLAHE_TILES);
    let binary = adaptive_threshold(&enhanced, THRESHOLD_BLOCK_RADIUS, THRESHOLD_DELTA);
    let binary = ensure_dark_text_on_light(binary);
    upscale_to_min(&binary, MIN_OCR_WIDTH, MIN_OCR_HEIGHT)
}

/// Contrast-limited adaptive histogram equalization.
///
/// Builds a clipped, equalized lookup table per tile and bilinearly blends
/// the four nearest tiles for each pixel, so tile borders do not show.
pub fn clahe(img: &GrayImage, clip_limit: f32, tiles: (u32, u32)) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }

    let tiles_x = tiles.0.clamp(1, width) as usize;
    let tiles_y = tiles.1.clamp(1, height) as usize;
    let tile_w = (width as usize).div_ceil(tiles_x);
    let tile_h = (height as usize).div_ceil(tiles_y);

    let mut luts = vec![[0u8; 256]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width as usize);
            let y1 = (y0 + tile_h).min(height as usize);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[img.get_pixel(x as u32, y as u32)[0] as usize] += 1;
                }
            }
            let count = ((x1.saturating_sub(x0)) * (y1.saturating_sub(y0))) as u32;
            luts[ty * tiles_x + tx] = equalized_lut(&mut hist, count, clip_limit);
        }
    }

    let mut out = GrayImage::new(width, height);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let v = img.get_pixel(x, y)[0] as usize;

        let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
        let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let tx0 = (fx.floor().max(0.0) as usize).min(tiles_x - 1);
        let ty0 = (fy.floor().max(0.0) as usize).min(tiles_y - 1);
        let tx1 = (tx0 + 1).min(tiles_x - 1);
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let ax = (fx - tx0 as f32).clamp(0.0, 1.0);
        let ay = (fy - ty0 as f32).clamp(0.0, 1.0);

        let at = |tx: usize, ty: usize| luts[ty * tiles_x + tx][v] as f32;
        let top = at(tx0, ty0) * (1.0 - ax) + at(tx1, ty0) * ax;
        let bottom = at(tx0, ty1) * (1.0 - ax) + at(tx1, ty1) * ax;
        let value = top * (1.0 - ay) + bottom * ay;

        *pixel = Luma([value.round().clamp(0.0, 255.0) as u8]);
    }
    out
}

/// Clips the histogram, redistributes the excess evenly, and returns the CDF as a LUT.
fn equalized_lut(hist: &mut [u32; 256], count: u32, clip_limit: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    if count == 0 {
        return lut;
    }

    let limit = ((clip_limit * count as f32 / 256.0) as u32).max(1);
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }
    let share = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, bin) in hist.iter_mut().enumerate() {
        *bin += share + u32::from(i < remainder);
    }

    let mut cdf = 0u32;
    for (i, bin) in hist.iter().enumerate() {
        cdf += bin;
        lut[i] = ((cdf as f32 * 255.0) / count as f32).round().min(255.0) as u8;
    }
    lut
}

/// Inverts a binary image if most of it is black, so text ends up dark on light.
pub fn ensure_dark_text_on_light(mut img: GrayImage) -> GrayImage {
    let total = img.width() as usize * img.height() as usize;
    let dark = img.pixels().filter(|p| p[0] < 128).count();
    if dark * 2 > total {
        imageops::invert(&mut img);
    }
    img
}

/// Scales the image up (never down) so it is at least `min_w` x `min_h`,
/// preserving aspect ratio. Uses a bicubic filter.
pub fn upscale_to_min(img: &GrayImage, min_w: u32, min_h: u32) -> GrayImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || (w >= min_w && h >= min_h) {
        return img.clone();
    }

    let scale = (min_w as f32 / w as f32).max(min_h as f32 / h as f32);
    let new_w = (w as f32 * scale).round() as u32;
    let new_h = (h as f32 * scale).round() as u32;
    imageops::resize(img, new_w, new_h, FilterType::CatmullRom)
}
