//! Keyboard and cursor polling.

use crate::geometry::Point;

/// Polled input state.
pub trait InputSource: Send {
    /// True while the virtual key `vk` is held down.
    fn is_key_down(&self, vk: u16) -> bool;

    /// Cursor position in screen coordinates.
    fn cursor_position(&self) -> Option<Point>;
}

/// Turns a polled key state into press edges.
#[derive(Debug, Default)]
pub struct KeyEdge {
    was_down: bool,
}

impl KeyEdge {
    /// Feeds the current state; returns true on an up→down transition.
    pub fn pressed(&mut self, down: bool) -> bool {
        let edge = down && !self.was_down;
        self.was_down = down;
        edge
    }
}

#[cfg(windows)]
pub use win32::Win32Input;

#[cfg(windows)]
mod win32 {
    use windows::Win32::Foundation::POINT;
    use windows::Win32::UI::Input::KeyboardAndMouse::GetAsyncKeyState;
    use windows::Win32::UI::WindowsAndMessaging::GetCursorPos;

    use super::InputSource;
    use crate::geometry::Point;

    /// `GetAsyncKeyState` / `GetCursorPos`.
    #[derive(Default)]
    pub struct Win32Input;

    impl InputSource for Win32Input {
        fn is_key_down(&self, vk: u16) -> bool {
            // High bit set = key currently down
            unsafe { (GetAsyncKeyState(vk as i32) as u16 & 0x8000) != 0 }
        }

        fn cursor_position(&self) -> Option<Point> {
            let mut pt = POINT::default();
            unsafe { GetCursorPos(&mut pt).ok()? };
            Some(Point::new(pt.x, pt.y))
        }
    }
}
