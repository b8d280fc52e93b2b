//! Client input capture with change detection and keep-alive pacing

use macroquad::prelude::*;
use shared::{InputState, MIN_INPUT_INTERVAL_MS};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Drag distance in pixels that maps to full speed
pub const MAX_DRAG_PX: f32 = 80.0;
/// Resend an unchanged input this often so the server keeps hearing from us
pub const KEEP_ALIVE: Duration = Duration::from_millis(100);

/// Raw device state for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sampled {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    /// Drag start and current pointer position, in screen pixels
    pub drag: Option<((f32, f32), (f32, f32))>,
}

/// Converts a drag into a direction vector no longer than 1.
pub fn drag_vector(origin: (f32, f32), current: (f32, f32)) -> (f32, f32) {
    let dx = (current.0 - origin.0) / MAX_DRAG_PX;
    let dy = (current.1 - origin.1) / MAX_DRAG_PX;
    let len = (dx * dx + dy * dy).sqrt();
    if len > 1.0 {
        (dx / len, dy / len)
    } else {
        (dx, dy)
    }
}

pub fn build_input(sampled: &Sampled, timestamp: u64) -> InputState {
    match sampled.drag {
        Some((origin, current)) => {
            let (x, y) = drag_vector(origin, current);
            InputState::touch(x, y, timestamp)
        }
        None => InputState {
            up: sampled.up,
            down: sampled.down,
            left: sampled.left,
            right: sampled.right,
            ..InputState::idle(timestamp)
        },
    }
}

fn same_intent(a: &InputState, b: &InputState) -> bool {
    a.up == b.up
        && a.down == b.down
        && a.left == b.left
        && a.right == b.right
        && a.is_touch_active == b.is_touch_active
        && a.touch_x == b.touch_x
        && a.touch_y == b.touch_y
}

/// Manages user input collection and transformation into networked game inputs
pub struct InputManager {
    current_input: InputState,
    last_input_sent: Option<Instant>,
    drag_origin: Option<(f32, f32)>,
    prev_key_e: bool,
    prev_key_g: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            current_input: InputState::idle(0),
            last_input_sent: None,
            drag_origin: None,
            prev_key_e: false,
            prev_key_g: false,
        }
    }

    /// Samples the keyboard and pointer. Returns (easing toggle, graph toggle) and an input to send.
    pub fn update(&mut self) -> ((bool, bool), Option<InputState>) {
        let mut sampled = Sampled {
            up: is_key_down(KeyCode::W) || is_key_down(KeyCode::Up),
            down: is_key_down(KeyCode::S) || is_key_down(KeyCode::Down),
            left: is_key_down(KeyCode::A) || is_key_down(KeyCode::Left),
            right: is_key_down(KeyCode::D) || is_key_down(KeyCode::Right),
            drag: None,
        };

        let pointer = touches()
            .first()
            .map(|t| (t.position.x, t.position.y))
            .or_else(|| is_mouse_button_down(MouseButton::Left).then(mouse_position));
        match pointer {
            Some(position) => {
                let origin = *self.drag_origin.get_or_insert(position);
                sampled.drag = Some((origin, position));
            }
            None => self.drag_origin = None,
        }

        let key_e = is_key_down(KeyCode::E);
        let key_g = is_key_down(KeyCode::G);
        let toggles = (key_e && !self.prev_key_e, key_g && !self.prev_key_g);
        self.prev_key_e = key_e;
        self.prev_key_g = key_g;

        (toggles, self.next_input(&sampled, Instant::now()))
    }

    /// Decides whether `sampled` should go out at `now`.
    ///
    /// Changes are sent immediately unless the previous send was under the
    /// server's minimum input interval; unchanged input only as a keep-alive.
    pub fn next_input(&mut self, sampled: &Sampled, now: Instant) -> Option<InputState> {
        let candidate = build_input(sampled, Self::get_timestamp());
        let since_last = self.last_input_sent.map(|t| now.duration_since(t));

        let should_send = match since_last {
            None => true,
            Some(elapsed) if elapsed < Duration::from_millis(MIN_INPUT_INTERVAL_MS) => false,
            Some(elapsed) => !same_intent(&candidate, &self.current_input) || elapsed >= KEEP_ALIVE,
        };

        if !should_send {
            return None;
        }
        self.current_input = candidate.clone();
        self.last_input_sent = Some(now);
        Some(candidate)
    }

    /// Returns the current input state
    pub fn get_current_input(&self) -> &InputState {
        &self.current_input
    }

    fn get_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_millis() as u64
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_drag_vector_is_clamped() {
        let (x, y) = drag_vector((100.0, 100.0), (100.0 + MAX_DRAG_PX * 3.0, 100.0));
        assert_approx_eq!(x, 1.0, 1e-6);
        assert_approx_eq!(y, 0.0, 1e-6);

        let (x, y) = drag_vector((0.0, 0.0), (MAX_DRAG_PX / 2.0, 0.0));
        assert_approx_eq!(x, 0.5, 1e-6);
        assert_approx_eq!(y, 0.0, 1e-6);

        let (x, y) = drag_vector((0.0, 0.0), (500.0, 500.0));
        assert_approx_eq!((x * x + y * y).sqrt(), 1.0, 1e-5);
    }

    #[test]
    fn test_build_input_keyboard_and_touch() {
        let keys = Sampled {
            up: true,
            right: true,
            ..Default::default()
        };
        let input = build_input(&keys, 5);
        assert!(input.up && input.right && !input.is_touch_active);
        assert_eq!(input.timestamp, 5);

        let drag = Sampled {
            up: true,
            drag: Some(((0.0, 0.0), (0.0, -MAX_DRAG_PX))),
            ..Default::default()
        };
        let input = build_input(&drag, 6);
        assert!(input.is_touch_active);
        assert!(!input.up);
        assert_eq!(input.touch_y, Some(-1.0));
    }

    #[test]
    fn test_sends_on_change_and_keep_alive() {
        let mut manager = InputManager::new();
        let start = Instant::now();
        let idle = Sampled::default();
        let moving = Sampled {
            left: true,
            ..Default::default()
        };

        assert!(manager.next_input(&idle, start).is_some());
        // Unchanged and before the keep-alive
        assert!(manager.next_input(&idle, start + Duration::from_millis(50)).is_none());
        // Changed, but inside the minimum interval
        assert!(manager.next_input(&moving, start + Duration::from_millis(5)).is_none());

        let sent = manager.next_input(&moving, start + Duration::from_millis(60));
        assert!(sent.unwrap().left);
        assert!(manager.get_current_input().left);

        assert!(manager
            .next_input(&moving, start + Duration::from_millis(60) + KEEP_ALIVE)
            .is_some());
    }

    #[test]
    fn test_get_timestamp() {
        let timestamp1 = InputManager::get_timestamp();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let timestamp2 = InputManager::get_timestamp();
        assert!(timestamp2 > timestamp1);
    }
}
