use std::time::{Duration, Instant};
use winit::window::Window;

pub struct FrameTiming {
    start: Instant,
    last_frame_time: Option<Instant>,
    last_fps_time: Instant,
    frame_count: u32,
    pub frame_dt: f32,
    elapsed: f32,
    base_title: String,
}

impl FrameTiming {
    pub fn new(base_title: String, now: Instant) -> Self {
        Self {
            start: now,
            last_frame_time: None,
            last_fps_time: now,
            frame_count: 0,
            frame_dt: 1.0 / 60.0,
            elapsed: 0.0,
            base_title,
        }
    }

    /// Seconds since start, as seen by the last [`update`](Self::update).
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn update(&mut self, window: Option<&Window>, now: Instant) {
        let dt_duration = if let Some(last) = self.last_frame_time {
            now.saturating_duration_since(last)
        } else {
            Duration::from_millis(16)
        };
        self.last_frame_time = Some(now);
        self.frame_dt = dt_duration.as_secs_f32().max(0.0);
        self.elapsed = now.saturating_duration_since(self.start).as_secs_f32();

        self.frame_count = self.frame_count.saturating_add(1);
        let window_elapsed = now.saturating_duration_since(self.last_fps_time);
        if window_elapsed.as_secs_f32() >= 0.5 {
            let fps = self.frame_count as f32 / window_elapsed.as_secs_f32();
            if let Some(window) = window {
                window.set_title(&format!(
                    "{} - {:.1} fps ({:.2} ms)",
                    self.base_title,
                    fps,
                    self.frame_dt * 1000.0
                ));
            }
            self.frame_count = 0;
            self.last_fps_time = now;
        }
    }
}
