//! Window discovery for The Bazaar game window.

use crate::config::WindowConfig;
use crate::geometry::{Point, Rect};

/// Opaque OS window handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub usize);

/// The located game window and its outer rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameWindow {
    pub handle: WindowHandle,
    pub rect: Rect,
}

/// OS window queries used by the region locator.
pub trait WindowFinder: Send + Sync {
    /// Enumerates windows and returns the game window, if it is running,
    /// visible, and not minimized.
    fn find_window(&self) -> Option<GameWindow>;

    /// True if the handle still names an existing, visible, non-minimized window.
    fn is_window_valid(&self, handle: WindowHandle) -> bool;

    fn window_rect(&self, handle: WindowHandle) -> Option<Rect>;

    /// Top-level window under a screen point.
    fn root_window_at(&self, point: Point) -> Option<WindowHandle>;
}

/// A visible top-level window seen during enumeration.
#[derive(Clone, Debug)]
pub struct WindowInfo {
    pub handle: WindowHandle,
    pub title: String,
    pub process_name: Option<String>,
    pub rect: Rect,
}

fn is_large_enough(config: &WindowConfig, rect: &Rect) -> bool {
    rect.width() >= config.min_width && rect.height() >= config.min_height
}

/// Among `matches`, prefers windows meeting the minimum size, then the largest.
fn pick<'a>(
    config: &WindowConfig,
    matches: impl Iterator<Item = &'a WindowInfo>,
) -> Option<&'a WindowInfo> {
    matches.max_by_key(|w| {
        let area = w.rect.width() as i64 * w.rect.height() as i64;
        (is_large_enough(config, &w.rect), area)
    })
}

/// Picks the game window: process name first, then an exact title, then the
/// title keyword (skipping excluded titles such as editors and this tool).
pub fn select_game_window(config: &WindowConfig, windows: &[WindowInfo]) -> Option<GameWindow> {
    let found = |w: &WindowInfo| GameWindow {
        handle: w.handle,
        rect: w.rect,
    };

    let process_names: Vec<String> = config
        .process_names
        .iter()
        .map(|n| n.to_lowercase())
        .collect();
    let by_process = pick(
        config,
        windows.iter().filter(|w| {
            w.process_name
                .as_ref()
                .is_some_and(|n| process_names.contains(&n.to_lowercase()))
        }),
    );
    if let Some(w) = by_process {
        tracing::debug!("Game window found by process name: \"{}\"", w.title);
        return Some(found(w));
    }

    let by_title = pick(
        config,
        windows
            .iter()
            .filter(|w| config.window_titles.iter().any(|t| t == &w.title)),
    );
    if let Some(w) = by_title {
        tracing::debug!("Game window found by title: \"{}\"", w.title);
        return Some(found(w));
    }

    let keyword = config.title_keyword.to_lowercase();
    if keyword.is_empty() {
        return None;
    }
    let by_keyword = pick(
        config,
        windows.iter().filter(|w| {
            let title = w.title.to_lowercase();
            title.contains(&keyword)
                && !config
                    .exclude_keywords
                    .iter()
                    .any(|ex| title.contains(&ex.to_lowercase()))
        }),
    );
    if let Some(w) = by_keyword {
        tracing::debug!("Game window found by title keyword: \"{}\"", w.title);
        return Some(found(w));
    }

    None
}

#[cfg(windows)]
pub use win32::Win32WindowFinder;

#[cfg(windows)]
mod win32 {
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;

    use windows::Win32::Foundation::{BOOL, CloseHandle, HWND, LPARAM, POINT, RECT, TRUE};
    use windows::Win32::System::Threading::{
        OpenProcess, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
        QueryFullProcessImageNameW,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GA_ROOT, GetAncestor, GetWindowRect, GetWindowTextLengthW, GetWindowTextW,
        GetWindowThreadProcessId, IsIconic, IsWindow, IsWindowVisible, WindowFromPoint,
    };

    use super::{GameWindow, WindowFinder, WindowHandle, WindowInfo, select_game_window};
    use crate::config::WindowConfig;
    use crate::geometry::{Point, Rect};

    fn to_hwnd(handle: WindowHandle) -> HWND {
        HWND(handle.0 as *mut _)
    }

    fn to_handle(hwnd: HWND) -> WindowHandle {
        WindowHandle(hwnd.0 as usize)
    }

    /// Finds the game by process name, then exact title, then title keyword.
    pub struct Win32WindowFinder {
        config: WindowConfig,
    }

    impl Win32WindowFinder {
        pub fn new(config: WindowConfig) -> Self {
            Self { config }
        }
    }

    impl WindowFinder for Win32WindowFinder {
        fn find_window(&self) -> Option<GameWindow> {
            unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
                unsafe {
                    let candidates = &mut *(lparam.0 as *mut Vec<WindowInfo>);

                    // Skip invisible and minimized windows
                    if !IsWindowVisible(hwnd).as_bool() || IsIconic(hwnd).as_bool() {
                        return TRUE;
                    }

                    let title = window_title(hwnd);
                    // Skip windows without title (usually not main windows)
                    if title.is_empty() {
                        return TRUE;
                    }

                    let mut rect = RECT::default();
                    if GetWindowRect(hwnd, &mut rect).is_err() {
                        return TRUE;
                    }

                    candidates.push(WindowInfo {
                        handle: to_handle(hwnd),
                        title,
                        process_name: process_name(hwnd),
                        rect: Rect::new(rect.left, rect.top, rect.right, rect.bottom),
                    });
                    TRUE
                }
            }

            let mut candidates: Vec<WindowInfo> = Vec::new();
            unsafe {
                let _ = EnumWindows(
                    Some(enum_callback),
                    LPARAM(&mut candidates as *mut _ as isize),
                );
            }
            tracing::trace!("Enumerated {} visible windows", candidates.len());

            select_game_window(&self.config, &candidates)
        }

        fn is_window_valid(&self, handle: WindowHandle) -> bool {
            let hwnd = to_hwnd(handle);
            unsafe {
                IsWindow(hwnd).as_bool() && IsWindowVisible(hwnd).as_bool() && !IsIconic(hwnd).as_bool()
            }
        }

        fn window_rect(&self, handle: WindowHandle) -> Option<Rect> {
            let mut rect = RECT::default();
            unsafe { GetWindowRect(to_hwnd(handle), &mut rect).ok()? };
            Some(Rect::new(rect.left, rect.top, rect.right, rect.bottom))
        }

        fn root_window_at(&self, point: Point) -> Option<WindowHandle> {
            unsafe {
                let hwnd = WindowFromPoint(POINT { x: point.x, y: point.y });
                if hwnd.0.is_null() {
                    return None;
                }
                let root = GetAncestor(hwnd, GA_ROOT);
                if root.0.is_null() {
                    Some(to_handle(hwnd))
                } else {
                    Some(to_handle(root))
                }
            }
        }
    }

    unsafe fn window_title(hwnd: HWND) -> String {
        unsafe {
            let title_len = GetWindowTextLengthW(hwnd);
            if title_len <= 0 {
                return String::new();
            }
            let mut title_buf: Vec<u16> = vec![0; (title_len + 1) as usize];
            let copied = GetWindowTextW(hwnd, &mut title_buf).max(0) as usize;
            OsString::from_wide(&title_buf[..copied])
                .to_string_lossy()
                .to_string()
        }
    }

    /// Executable file name of the process owning `hwnd`.
    unsafe fn process_name(hwnd: HWND) -> Option<String> {
        unsafe {
            let mut process_id: u32 = 0;
            GetWindowThreadProcessId(hwnd, Some(&mut process_id));
            if process_id == 0 {
                return None;
            }

            let process_handle =
                OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, process_id).ok()?;

            let mut name_buf: Vec<u16> = vec![0; 1024];
            let mut len = name_buf.len() as u32;
            let result = QueryFullProcessImageNameW(
                process_handle,
                PROCESS_NAME_WIN32,
                windows::core::PWSTR(name_buf.as_mut_ptr()),
                &mut len,
            );
            let _ = CloseHandle(process_handle);

            if result.is_err() || len == 0 {
                return None;
            }

            let full_path = OsString::from_wide(&name_buf[..len as usize])
                .to_string_lossy()
                .to_string();
            full_path.rsplit('\\').next().map(str::to_string)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(id: usize, title: &str, process: Option<&str>, w: i32, h: i32) -> WindowInfo {
        WindowInfo {
            handle: WindowHandle(id),
            title: title.to_string(),
            process_name: process.map(str::to_string),
            rect: Rect::new(0, 0, w, h),
        }
    }

    #[test]
    fn test_process_name_beats_title() {
        let windows = [
            window(1, "The Bazaar", Some("launcher.exe"), 1920, 1080),
            window(2, "Unity", Some("TheBazaar.exe"), 1600, 900),
        ];
        let found = select_game_window(&WindowConfig::default(), &windows).unwrap();
        assert_eq!(found.handle, WindowHandle(2));
    }

    #[test]
    fn test_prefers_large_windows() {
        let windows = [
            window(1, "The Bazaar", None, 4000, 500),
            window(2, "The Bazaar", None, 1280, 720),
            window(3, "The Bazaar", None, 1024, 768),
        ];
        let found = select_game_window(&WindowConfig::default(), &windows).unwrap();
        assert_eq!(found.handle, WindowHandle(2));
    }

    #[test]
    fn test_keyword_skips_excluded_titles() {
        let windows = [
            window(1, "the bazaar notes - Notepad", None, 1920, 1080),
            window(2, "Playing The Bazaar (beta)", None, 1280, 720),
        ];
        let found = select_game_window(&WindowConfig::default(), &windows).unwrap();
        assert_eq!(found.handle, WindowHandle(2));
    }

    #[test]
    fn test_nothing_found() {
        let windows = [window(1, "Visual Studio Code - the bazaar", None, 1920, 1080)];
        assert!(select_game_window(&WindowConfig::default(), &windows).is_none());
    }
}
