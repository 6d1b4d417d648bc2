//! Grabbing screen pixels.

use anyhow::{Result, anyhow};
use image::RgbaImage;
use image::imageops;

use crate::geometry::Rect;

/// Copies a screen rectangle into an image.
pub trait ScreenGrabber: Send + Sync {
    fn grab(&self, rect: Rect) -> Result<RgbaImage>;
}

/// Serves rectangles of a still image, as if it covered the screen from (0, 0).
///
/// Lets saved screenshots go through the same capture path as the live screen.
pub struct StillImageGrabber {
    image: RgbaImage,
}

impl StillImageGrabber {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.image.width() as i32, self.image.height() as i32)
    }
}

impl ScreenGrabber for StillImageGrabber {
    fn grab(&self, rect: Rect) -> Result<RgbaImage> {
        let clipped = rect.intersect(&self.bounds()).ok_or_else(|| {
            anyhow!(
                "{} lies outside the {}x{} image",
                rect,
                self.image.width(),
                self.image.height()
            )
        })?;
        Ok(imageops::crop_imm(
            &self.image,
            clipped.left as u32,
            clipped.top as u32,
            clipped.width() as u32,
            clipped.height() as u32,
        )
        .to_image())
    }
}

#[cfg(windows)]
pub use gdi::GdiGrabber;

#[cfg(windows)]
mod gdi {
    use anyhow::{Result, anyhow};
    use image::RgbaImage;
    use std::mem;

    use windows::Win32::Foundation::HWND;
    use windows::Win32::Graphics::Gdi::{
        BI_RGB, BITMAPINFO, BITMAPINFOHEADER, BitBlt, CreateCompatibleBitmap, CreateCompatibleDC,
        DIB_RGB_COLORS, DeleteDC, DeleteObject, GetDC, GetDIBits, ReleaseDC, SRCCOPY, SelectObject,
    };

    use super::ScreenGrabber;
    use crate::geometry::Rect;

    /// Desktop capture via GDI `BitBlt`.
    ///
    /// Works for any window the compositor shows, including borderless
    /// fullscreen games, and needs no capture session.
    #[derive(Default)]
    pub struct GdiGrabber;

    impl ScreenGrabber for GdiGrabber {
        fn grab(&self, rect: Rect) -> Result<RgbaImage> {
            if rect.is_degenerate() {
                return Err(anyhow!("Cannot capture empty region {}", rect));
            }
            let width = rect.width();
            let height = rect.height();

            unsafe {
                let screen_dc = GetDC(HWND::default());
                if screen_dc.is_invalid() {
                    return Err(anyhow!("GetDC failed"));
                }
                let mem_dc = CreateCompatibleDC(screen_dc);
                let bitmap = CreateCompatibleBitmap(screen_dc, width, height);
                let old = SelectObject(mem_dc, bitmap);

                let blit = BitBlt(
                    mem_dc, 0, 0, width, height, screen_dc, rect.left, rect.top, SRCCOPY,
                );

                let mut bmi = BITMAPINFO {
                    bmiHeader: BITMAPINFOHEADER {
                        biSize: mem::size_of::<BITMAPINFOHEADER>() as u32,
                        biWidth: width,
                        // Negative height = top-down rows
                        biHeight: -height,
                        biPlanes: 1,
                        biBitCount: 32,
                        biCompression: BI_RGB.0,
                        ..Default::default()
                    },
                    ..Default::default()
                };
                let mut buffer = vec![0u8; width as usize * height as usize * 4];
                let lines = if blit.is_ok() {
                    GetDIBits(
                        mem_dc,
                        bitmap,
                        0,
                        height as u32,
                        Some(buffer.as_mut_ptr().cast()),
                        &mut bmi,
                        DIB_RGB_COLORS,
                    )
                } else {
                    0
                };

                SelectObject(mem_dc, old);
                let _ = DeleteObject(bitmap);
                let _ = DeleteDC(mem_dc);
                ReleaseDC(HWND::default(), screen_dc);

                blit.map_err(|e| anyhow!("BitBlt failed for {}: {}", rect, e))?;
                if lines == 0 {
                    return Err(anyhow!("GetDIBits failed for {}", rect));
                }

                // BGRA -> RGBA, force opaque
                for px in buffer.chunks_exact_mut(4) {
                    px.swap(0, 2);
                    px[3] = 255;
                }

                RgbaImage::from_raw(width as u32, height as u32, buffer)
                    .ok_or_else(|| anyhow!("Captured buffer has the wrong size"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_still_image_crops_and_clips() {
        let mut img = RgbaImage::from_pixel(100, 50, Rgba([0, 0, 0, 255]));
        img.put_pixel(60, 10, Rgba([255, 0, 0, 255]));
        let grabber = StillImageGrabber::new(img);

        let part = grabber.grab(Rect::new(50, 0, 150, 20)).unwrap();
        assert_eq!(part.dimensions(), (50, 20));
        assert_eq!(part.get_pixel(10, 10), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_still_image_outside() {
        let grabber = StillImageGrabber::new(RgbaImage::new(10, 10));
        assert!(grabber.grab(Rect::new(20, 20, 30, 30)).is_err());
    }
}
