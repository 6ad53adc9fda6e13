//! Desktop preview window.
//!
//! Shows committed frames in a fixed-size window instead of a framebuffer
//! device, which is handy when working on a dashboard away from the panel.

use crate::dashboard::Dashboard;
use crate::error::SurfaceError;
use crate::surface::{FrameBuffer, RenderSurface};
use softbuffer::{Context, Surface};
use std::num::NonZeroU32;
use std::time::{Duration, Instant};
use winit::{
    dpi::PhysicalSize,
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::WindowBuilder,
};

/// Render surface whose committed frames are presented by the preview window.
pub struct WindowSurface {
    back: FrameBuffer,
    front: Vec<u32>,
}

impl WindowSurface {
    pub fn new(width: u32, height: u32) -> Result<Self, SurfaceError> {
        Ok(Self {
            back: FrameBuffer::new(width, height, 32)?,
            front: vec![0; width as usize * height as usize],
        })
    }

    /// The last committed frame as softbuffer `0RGB` words.
    pub fn front(&self) -> &[u32] {
        &self.front
    }
}

impl RenderSurface for WindowSurface {
    fn size(&self) -> (u32, u32) {
        (self.back.width, self.back.height)
    }

    fn write_scanline(&mut self, x: u32, y: u32, bgra: &[u8]) {
        self.back.write_line(x, y, bgra);
    }

    fn commit(&mut self) -> Result<(), SurfaceError> {
        for (dst, px) in self.front.iter_mut().zip(self.back.data().chunks_exact(4)) {
            *dst = u32::from_le_bytes([px[0], px[1], px[2], 0]);
        }
        self.back.reset();
        Ok(())
    }
}

/// Run the frame loop inside a window event loop. Only returns on setup failure.
pub fn run(mut dashboard: Dashboard<WindowSurface>, frame_interval: Duration, exit_when_rendered: bool) -> anyhow::Result<()> {
    let (width, height) = dashboard.surface().size();

    let event_loop = EventLoop::new();
    let window = WindowBuilder::new()
        .with_inner_size(PhysicalSize::new(width, height))
        .with_resizable(false)
        .with_title("fbdash preview")
        .build(&event_loop)?;

    // SAFETY: the window and context live until the process exits; the event loop never returns.
    let context = unsafe { Context::new(&window) }.map_err(|e| anyhow::anyhow!("softbuffer context: {}", e))?;
    let mut surface = unsafe { Surface::new(&context, &window) }.map_err(|e| anyhow::anyhow!("softbuffer surface: {}", e))?;
    let (w, h) = match (NonZeroU32::new(width), NonZeroU32::new(height)) {
        (Some(w), Some(h)) => (w, h),
        _ => anyhow::bail!("preview window needs a non-empty canvas"),
    };
    surface.resize(w, h).map_err(|e| anyhow::anyhow!("softbuffer resize: {}", e))?;

    let mut next_frame = Instant::now();

    event_loop.run(move |event, _, control_flow| {
        match event {
            Event::WindowEvent { event: WindowEvent::CloseRequested, .. } => {
                *control_flow = ControlFlow::Exit;
                return;
            }
            Event::MainEventsCleared => {
                let now = Instant::now();
                if now >= next_frame {
                    match dashboard.frame(now) {
                        Ok(report) => {
                            window.request_redraw();
                            if exit_when_rendered && report.all_rendered {
                                tracing::info!("all widgets rendered, exiting");
                                *control_flow = ControlFlow::Exit;
                                return;
                            }
                        }
                        Err(e) => {
                            tracing::error!("frame failed: {}", e);
                            *control_flow = ControlFlow::Exit;
                            return;
                        }
                    }
                    next_frame = now + frame_interval;
                }
            }
            Event::RedrawRequested(_) => {
                let presented = surface.buffer_mut().and_then(|mut buffer| {
                    buffer.copy_from_slice(dashboard.surface().front());
                    buffer.present()
                });
                if let Err(e) = presented {
                    tracing::error!("failed to present frame: {}", e);
                    *control_flow = ControlFlow::Exit;
                    return;
                }
            }
            _ => {}
        }
        *control_flow = ControlFlow::WaitUntil(next_frame);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_converts_bgra_to_0rgb() {
        let mut surface = WindowSurface::new(2, 1).unwrap();
        surface.write_scanline(0, 0, &[0x11, 0x22, 0x33, 0xFF]);
        surface.commit().unwrap();
        assert_eq!(surface.front(), &[0x0033_2211, 0]);
        // back buffer reset; next commit shows black
        surface.commit().unwrap();
        assert_eq!(surface.front(), &[0, 0]);
    }
}
