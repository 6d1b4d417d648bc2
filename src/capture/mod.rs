//! Locating The Bazaar's window and reading pixels from it.
//!
//! - `window`: OS window discovery behind the `WindowFinder` trait
//! - `screen`: pixel grabbing behind the `ScreenGrabber` trait
//! - `locator`: window caching and capture-region geometry

pub mod locator;
pub mod screen;
pub mod window;

pub use locator::RegionLocator;
pub use screen::{ScreenGrabber, StillImageGrabber};
pub use window::{GameWindow, WindowFinder, WindowHandle};

#[cfg(windows)]
pub use screen::GdiGrabber;
#[cfg(windows)]
pub use window::Win32WindowFinder;
