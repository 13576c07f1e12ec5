/// Maps between timeline seconds and pixels of the track lane.
#[derive(Debug, Clone, Copy)]
pub struct TimelineView {
    pub duration: f64,
    pub width_px: f64,
}

impl TimelineView {
    pub fn new(duration: f64, width_px: f64) -> Self {
        Self { duration, width_px }
    }

    pub fn pixels_per_second(&self) -> f64 {
        if self.duration > 0.0 {
            self.width_px / self.duration
        } else {
            0.0
        }
    }

    pub fn seconds_to_pixels(&self, seconds: f64) -> f64 {
        seconds * self.pixels_per_second()
    }

    pub fn pixels_to_seconds(&self, pixels: f64) -> f64 {
        if self.width_px > 0.0 {
            pixels / self.width_px * self.duration
        } else {
            0.0
        }
    }
}

/// Round `value` to the nearest multiple of `quantum`. A non-positive
/// quantum disables snapping.
pub fn snap(value: f64, quantum: f64) -> f64 {
    if quantum > 0.0 && quantum.is_finite() {
        (value / quantum).round() * quantum
    } else {
        value
    }
}

pub fn format_position(seconds: f64) -> Position {
    let total_tenths = (seconds.max(0.0) * 10.0).floor() as u64;
    let tenths = (total_tenths % 10) as u32;
    let total_seconds = total_tenths / 10;

    Position {
        minutes: (total_seconds / 60) as u32,
        seconds: (total_seconds % 60) as u32,
        tenths,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub minutes: u32,
    pub seconds: u32,
    pub tenths: u32,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{:02}.{}", self.minutes, self.seconds, self.tenths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_round_trip() {
        let view = TimelineView::new(20.0, 800.0);
        assert_eq!(view.seconds_to_pixels(5.0), 200.0);
        assert_eq!(view.pixels_to_seconds(200.0), 5.0);
    }

    #[test]
    fn test_degenerate_view() {
        let view = TimelineView::new(0.0, 0.0);
        assert_eq!(view.seconds_to_pixels(5.0), 0.0);
        assert_eq!(view.pixels_to_seconds(5.0), 0.0);
    }

    #[test]
    fn test_snap() {
        assert!((snap(7.46, 0.1) - 7.5).abs() < 1e-9);
        assert!((snap(7.44, 0.1) - 7.4).abs() < 1e-9);
        assert_eq!(snap(7.46, 0.0), 7.46);
    }

    #[test]
    fn test_format_position() {
        assert_eq!(format_position(0.0).to_string(), "0:00.0");
        assert_eq!(format_position(75.36).to_string(), "1:15.3");
        assert_eq!(format_position(-3.0).to_string(), "0:00.0");
        assert_eq!(
            format_position(605.0),
            Position {
                minutes: 10,
                seconds: 5,
                tenths: 0
            }
        );
    }
}
