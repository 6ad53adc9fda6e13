//! Render surfaces: the pixel sinks that frames are committed to.
//!
//! Widgets write BGRA scanlines into an off-screen [`FrameBuffer`]; `commit`
//! pushes the finished frame to its destination in one go and starts the next
//! frame from a blank buffer, so the visible image never tears.

use crate::error::SurfaceError;
use memmap2::{MmapMut, MmapOptions};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// A double-buffered pixel sink.
pub trait RenderSurface {
    /// Width and height in pixels.
    fn size(&self) -> (u32, u32);

    /// Copy a run of BGRA pixels into the off-screen buffer at row `y`, column `x`.
    /// The caller keeps the run within the row.
    fn write_scanline(&mut self, x: u32, y: u32, bgra: &[u8]);

    /// Publish the off-screen buffer as the visible frame and reset it.
    fn commit(&mut self) -> Result<(), SurfaceError>;
}

/// Off-screen pixel storage in the device's native layout.
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    bytes_per_pixel: usize,
    data: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32, bits_per_pixel: u32) -> Result<Self, SurfaceError> {
        let bytes_per_pixel = match bits_per_pixel {
            32 => 4,
            24 => 3,
            other => return Err(SurfaceError::UnsupportedDepth(other)),
        };
        let mut fb = Self {
            width,
            height,
            bytes_per_pixel,
            data: vec![0; width as usize * height as usize * bytes_per_pixel],
        };
        fb.reset();
        Ok(fb)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Blank the buffer to opaque black.
    pub fn reset(&mut self) {
        match self.bytes_per_pixel {
            4 => {
                for px in self.data.chunks_exact_mut(4) {
                    px.copy_from_slice(&[0x00, 0x00, 0x00, 0xFF]);
                }
            }
            _ => self.data.fill(0),
        }
    }

    /// Copy BGRA pixels starting at `(x, y)`. Runs past the end of a row spill
    /// into the next one; anything past the end of the buffer is dropped.
    pub fn write_line(&mut self, x: u32, y: u32, bgra: &[u8]) {
        let bpp = self.bytes_per_pixel;
        let offset = (y as usize * self.width as usize + x as usize) * bpp;
        if offset >= self.data.len() {
            return;
        }
        let dest = &mut self.data[offset..];

        if bpp == 4 {
            let n = bgra.len().min(dest.len());
            dest[..n].copy_from_slice(&bgra[..n]);
        } else {
            for (src, dst) in bgra.chunks_exact(4).zip(dest.chunks_exact_mut(3)) {
                dst.copy_from_slice(&src[..3]);
            }
        }
    }

    /// Read the pixel at `(x, y)` as BGRA.
    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * self.bytes_per_pixel;
        let p = &self.data[offset..offset + self.bytes_per_pixel];
        Some(match p {
            [b, g, r, a] => [*b, *g, *r, *a],
            [b, g, r] => [*b, *g, *r, 0xFF],
            _ => return None,
        })
    }

    /// The buffer as tightly packed RGBA, for image export.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for px in self.data.chunks_exact(self.bytes_per_pixel) {
            let a = if self.bytes_per_pixel == 4 { px[3] } else { 0xFF };
            out.extend_from_slice(&[px[2], px[1], px[0], a]);
        }
        out
    }
}

/// A Linux framebuffer device (`/dev/fbN`) mapped into memory.
pub struct LinuxFrameBuffer {
    back: FrameBuffer,
    map: MmapMut,
}

impl LinuxFrameBuffer {
    pub fn open(name: &str) -> Result<Self, SurfaceError> {
        let sys = Path::new("/sys/class/graphics").join(name);

        let virtual_size = read_attr(&sys.join("virtual_size"))?;
        let (w, h) = virtual_size
            .split_once(',')
            .and_then(|(w, h)| Some((w.trim().parse::<u32>().ok()?, h.trim().parse::<u32>().ok()?)))
            .ok_or_else(|| SurfaceError::Attribute { name: "virtual_size", value: virtual_size.clone() })?;

        let bpp_text = read_attr(&sys.join("bits_per_pixel"))?;
        let bpp: u32 = bpp_text
            .parse()
            .map_err(|_| SurfaceError::Attribute { name: "bits_per_pixel", value: bpp_text.clone() })?;

        let back = FrameBuffer::new(w, h, bpp)?;
        let file = OpenOptions::new().read(true).write(true).open(Path::new("/dev").join(name))?;
        // SAFETY: the device file stays open for the life of the mapping and
        // nothing else in this process maps it.
        let map = unsafe { MmapOptions::new().len(back.data().len()).map_mut(&file)? };

        tracing::info!("opened framebuffer /dev/{} ({}x{}, {} bpp)", name, w, h, bpp);
        Ok(Self { back, map })
    }
}

fn read_attr(path: &Path) -> Result<String, SurfaceError> {
    Ok(fs::read_to_string(path)?.trim().to_string())
}

impl RenderSurface for LinuxFrameBuffer {
    fn size(&self) -> (u32, u32) {
        (self.back.width, self.back.height)
    }

    fn write_scanline(&mut self, x: u32, y: u32, bgra: &[u8]) {
        self.back.write_line(x, y, bgra);
    }

    fn commit(&mut self) -> Result<(), SurfaceError> {
        self.map.copy_from_slice(self.back.data());
        self.back.reset();
        Ok(())
    }
}

/// Writes every committed frame to a PNG file. Used when there is no device.
pub struct PngSurface {
    path: PathBuf,
    back: FrameBuffer,
}

impl PngSurface {
    pub fn new(path: impl Into<PathBuf>, width: u32, height: u32) -> Result<Self, SurfaceError> {
        Ok(Self { path: path.into(), back: FrameBuffer::new(width, height, 32)? })
    }
}

impl RenderSurface for PngSurface {
    fn size(&self) -> (u32, u32) {
        (self.back.width, self.back.height)
    }

    fn write_scanline(&mut self, x: u32, y: u32, bgra: &[u8]) {
        self.back.write_line(x, y, bgra);
    }

    fn commit(&mut self) -> Result<(), SurfaceError> {
        image::save_buffer_with_format(
            &self.path,
            &self.back.to_rgba(),
            self.back.width,
            self.back.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )?;
        self.back.reset();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_opaque_black() {
        let fb = FrameBuffer::new(3, 2, 32).unwrap();
        assert_eq!(fb.data().len(), 24);
        assert_eq!(fb.pixel(2, 1), Some([0, 0, 0, 0xFF]));
        assert!(FrameBuffer::new(3, 2, 16).is_err());
    }

    #[test]
    fn test_write_line_places_pixels() {
        let mut fb = FrameBuffer::new(4, 4, 32).unwrap();
        fb.write_line(1, 2, &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(fb.pixel(0, 2), Some([0, 0, 0, 0xFF]));
        assert_eq!(fb.pixel(1, 2), Some([1, 2, 3, 4]));
        assert_eq!(fb.pixel(2, 2), Some([5, 6, 7, 8]));
        assert_eq!(fb.pixel(3, 2), Some([0, 0, 0, 0xFF]));
    }

    #[test]
    fn test_write_past_end_is_truncated() {
        let mut fb = FrameBuffer::new(2, 2, 32).unwrap();
        fb.write_line(1, 1, &[9; 16]);
        assert_eq!(fb.pixel(1, 1), Some([9; 4]));
        fb.write_line(0, 5, &[9; 4]);
        assert_eq!(fb.data().len(), 16);
    }

    #[test]
    fn test_24bpp_drops_alpha() {
        let mut fb = FrameBuffer::new(2, 1, 24).unwrap();
        fb.write_line(0, 0, &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(fb.data(), &[1, 2, 3, 5, 6, 7]);
        assert_eq!(fb.to_rgba(), vec![3, 2, 1, 0xFF, 7, 6, 5, 0xFF]);
    }

    #[test]
    fn test_reset_blanks_buffer() {
        let mut fb = FrameBuffer::new(2, 2, 32).unwrap();
        fb.write_line(0, 0, &[200; 16]);
        fb.reset();
        assert!(fb.data().chunks(4).all(|p| p == [0, 0, 0, 0xFF]));
    }

    #[test]
    fn test_png_surface_commit_writes_file_and_resets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let mut surface = PngSurface::new(&path, 4, 3).unwrap();
        surface.write_scanline(0, 0, &[255, 0, 0, 255]);
        surface.commit().unwrap();

        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (4, 3));
        // BGRA blue written, RGBA blue read back
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(img.get_pixel(1, 0).0, [0, 0, 0, 255]);
        assert_eq!(surface.back.pixel(0, 0), Some([0, 0, 0, 0xFF]));
    }
}
