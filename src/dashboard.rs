//! The frame loop: refresh what is due, composite everything, commit.

use crate::error::SurfaceError;
use crate::surface::RenderSurface;
use crate::widgets::WidgetSlot;
use std::thread;
use std::time::{Duration, Instant};

/// What happened during one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// Every widget had published a buffer before this frame was composited,
    /// so the committed frame shows all of them.
    pub all_rendered: bool,
    pub refreshes_started: usize,
}

pub struct Dashboard<S: RenderSurface> {
    surface: S,
    widgets: Vec<WidgetSlot>,
}

impl<S: RenderSurface> Dashboard<S> {
    pub fn new(surface: S, widgets: Vec<WidgetSlot>) -> Self {
        Self { surface, widgets }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn widgets(&self) -> &[WidgetSlot] {
        &self.widgets
    }

    pub fn all_rendered(&self) -> bool {
        self.widgets.iter().all(WidgetSlot::should_render)
    }

    /// Run one frame. Never waits on a widget refresh.
    pub fn frame(&mut self, now: Instant) -> Result<FrameReport, SurfaceError> {
        let all_rendered = self.all_rendered();

        let refreshes_started = self
            .widgets
            .iter()
            .filter(|slot| slot.maybe_start_refresh(now))
            .count();

        for slot in &self.widgets {
            slot.write_into_surface(&mut self.surface);
        }
        self.surface.commit()?;

        if refreshes_started > 0 {
            let in_flight = self.widgets.iter().filter(|slot| slot.refresher().in_flight()).count();
            tracing::debug!("frame started {} refreshes, {} in flight", refreshes_started, in_flight);
        }
        Ok(FrameReport { all_rendered, refreshes_started })
    }

    /// Headless loop: one frame every `frame_interval`. With `exit_when_rendered`
    /// it returns after the first frame that shows every widget.
    pub fn run(&mut self, frame_interval: Duration, exit_when_rendered: bool) -> Result<(), SurfaceError> {
        let (width, height) = self.surface.size();
        tracing::info!("running {} widgets on a {}x{} surface", self.widgets().len(), width, height);
        loop {
            let report = self.frame(Instant::now())?;
            if exit_when_rendered && report.all_rendered {
                tracing::info!("all widgets rendered, exiting");
                return Ok(());
            }
            thread::sleep(frame_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::tests::wait_idle;
    use crate::surface::PngSurface;
    use crate::widgets::tests::{solid_slot, Recorder};

    #[test]
    fn test_first_frame_starts_every_refresh() {
        let mut dashboard = Dashboard::new(
            Recorder::default(),
            vec![solid_slot(0, 0, 2, 2, Ok(1)), solid_slot(2, 0, 2, 2, Ok(2))],
        );
        let report = dashboard.frame(Instant::now()).unwrap();
        assert_eq!(report.refreshes_started, 2);
        assert!(!report.all_rendered);
        assert_eq!(dashboard.surface().commits, 1);
    }

    #[test]
    fn test_rendered_widgets_are_composited() {
        let mut dashboard = Dashboard::new(
            Recorder::default(),
            vec![solid_slot(0, 0, 2, 2, Ok(1)), solid_slot(2, 0, 2, 3, Ok(2))],
        );
        dashboard.frame(Instant::now()).unwrap();
        for slot in dashboard.widgets() {
            wait_idle(slot.refresher());
        }

        dashboard.surface.writes.clear();
        let report = dashboard.frame(Instant::now()).unwrap();
        assert!(report.all_rendered);
        assert_eq!(report.refreshes_started, 0);
        assert_eq!(dashboard.surface().writes.len(), 5);
        assert_eq!(dashboard.surface().commits, 2);
    }

    #[test]
    fn test_failing_widget_blocks_all_rendered() {
        let mut dashboard = Dashboard::new(
            Recorder::default(),
            vec![solid_slot(0, 0, 2, 2, Ok(1)), solid_slot(2, 0, 2, 2, Err(()))],
        );
        dashboard.frame(Instant::now()).unwrap();
        for slot in dashboard.widgets() {
            wait_idle(slot.refresher());
        }
        let report = dashboard.frame(Instant::now()).unwrap();
        assert!(!report.all_rendered);
        // only the healthy widget wrote its two rows
        assert_eq!(dashboard.surface().writes.len(), 2);
    }

    #[test]
    fn test_run_exits_once_rendered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let surface = PngSurface::new(&path, 4, 4).unwrap();
        let mut dashboard = Dashboard::new(surface, vec![solid_slot(1, 1, 2, 2, Ok(0xFF))]);

        dashboard.run(Duration::from_millis(10), true).unwrap();

        let img = ::image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(1, 1).0, [0xFF; 4]);
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 0xFF]);
    }
}
