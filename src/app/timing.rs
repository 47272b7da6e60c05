use std::time::Instant;
use winit::window::Window;

/// What the title bar reports besides frame rate.
#[derive(Debug, Clone, Default)]
pub struct TitleInfo {
    pub draw_calls: usize,
    pub objects: usize,
    pub selected: Option<String>,
    pub loading: bool,
}

pub struct FrameTiming {
    last_fps_time: Instant,
    frame_count: u32,
    render_ms: f32,
    base_title: String,
}

impl FrameTiming {
    pub fn new(base_title: String) -> Self {
        Self {
            last_fps_time: Instant::now(),
            frame_count: 0,
            render_ms: 0.0,
            base_title,
        }
    }

    pub fn set_render_ms(&mut self, render_ms: f32) {
        self.render_ms = render_ms;
    }

    pub fn update(&mut self, window: Option<&Window>, now: Instant, info: &TitleInfo) {
        self.frame_count = self.frame_count.saturating_add(1);
        let elapsed = now.saturating_duration_since(self.last_fps_time);
        if elapsed.as_secs_f32() >= 0.5 {
            let fps = self.frame_count as f32 / elapsed.as_secs_f32();
            if let Some(window) = window {
                window.set_title(&self.title(fps, info));
            }
            self.frame_count = 0;
            self.last_fps_time = now;
        }
    }

    pub fn title(&self, fps: f32, info: &TitleInfo) -> String {
        let mut title = format!(
            "{} - {:.1} fps (render {:.2} ms) - {} objects in {} draw calls",
            self.base_title, fps, self.render_ms, info.objects, info.draw_calls
        );
        if info.loading {
            title.push_str(" - loading...");
        }
        if let Some(selected) = &info.selected {
            title.push_str(&format!(" - selected: {selected}"));
        }
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn title_reports_draw_calls_and_selection() {
        let mut timing = FrameTiming::new("scenepick".to_string());
        timing.set_render_ms(1.5);
        let info = TitleInfo {
            draw_calls: 3,
            objects: 400,
            selected: Some("box-1-2".to_string()),
            loading: false,
        };
        assert_eq!(
            timing.title(60.0, &info),
            "scenepick - 60.0 fps (render 1.50 ms) - 400 objects in 3 draw calls - selected: box-1-2"
        );
    }

    #[test]
    fn frame_count_restarts_every_half_second() {
        let start = Instant::now();
        let mut timing = FrameTiming::new("scenepick".to_string());
        timing.last_fps_time = start;
        let info = TitleInfo::default();

        timing.update(None, start + Duration::from_millis(100), &info);
        timing.update(None, start + Duration::from_millis(200), &info);
        assert_eq!(timing.frame_count, 2);

        timing.update(None, start + Duration::from_millis(500), &info);
        assert_eq!(timing.frame_count, 0);
        assert_eq!(timing.last_fps_time, start + Duration::from_millis(500));
    }
}
