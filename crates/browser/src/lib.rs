#![deny(unused)]
//! Chromium adapter for Browzee.
//!
//! Launches a Chromium-family browser over CDP (via chromiumoxide) and
//! exposes its active page as a [`BrowserSession`].
//!
//! [`BrowserSession`]: browzee_core::traits::BrowserSession

pub mod launcher;
pub mod session;

pub use launcher::{find_browser_executable, ChromiumLauncher, LaunchOptions};
pub use session::ChromiumSession;
