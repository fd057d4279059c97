use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig, HeadlessMode};
use chromiumoxide::cdp::browser_protocol::browser::{GrantPermissionsParams, PermissionType};
use futures::StreamExt;
use tokio::task;
use tracing::{error, info, trace, warn};

use browzee_core::{
    config::BrowserConfig,
    traits::{BrowserLauncher, BrowserSession},
    Error, Result,
};

use crate::session::ChromiumSession;

static LAUNCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// How to start the browser.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub executable_path: Option<PathBuf>,
    pub headless: bool,
    /// Permission names granted to every origin (`geolocation`, `camera`, ...).
    pub permissions: Vec<String>,
    /// Persistent profile. A throwaway profile is used when unset.
    pub user_data_dir: Option<PathBuf>,
}

impl From<&BrowserConfig> for LaunchOptions {
    fn from(cfg: &BrowserConfig) -> Self {
        Self {
            executable_path: cfg.executable_path.as_ref().map(PathBuf::from),
            headless: cfg.headless,
            permissions: cfg.permissions.clone(),
            user_data_dir: cfg.user_data_dir.as_ref().map(PathBuf::from),
        }
    }
}

/// Map configured permission names onto CDP permission types.
///
/// Unknown names are skipped with a warning.
pub(crate) fn permission_types(names: &[String]) -> Vec<PermissionType> {
    names
        .iter()
        .filter_map(|name| {
            let cdp_name = match name.as_str() {
                "camera" => "videoCapture",
                "microphone" => "audioCapture",
                "clipboard-read" => "clipboardReadWrite",
                "clipboard-write" => "clipboardSanitizedWrite",
                "background-sync" => "backgroundSync",
                "midi" => "midi",
                other => other,
            };
            match serde_json::from_value::<PermissionType>(serde_json::Value::String(cdp_name.into())) {
                Ok(p) => Some(p),
                Err(_) => {
                    warn!(permission = %name, "Unknown browser permission, skipping");
                    None
                }
            }
        })
        .collect()
}

/// Find Chrome/Chromium on the system.
///
/// Order: explicit path, `CHROMIUM_PATH`, well-known install locations,
/// then `which` on Unix.
pub fn find_browser_executable(explicit: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.clone());
        }
        return Err(Error::browser(format!(
            "configured browser executable does not exist: {}",
            path.display()
        )));
    }

    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Using browser from CHROMIUM_PATH: {}", path.display());
            return Ok(path);
        }
        warn!("CHROMIUM_PATH points to non-existent file: {}", path.display());
    }

    let candidates: Vec<PathBuf> = if cfg!(target_os = "windows") {
        let mut v = vec![
            PathBuf::from(r"C:\Program Files\Google\Chrome\Application\chrome.exe"),
            PathBuf::from(r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe"),
            PathBuf::from(r"C:\Program Files\Chromium\Application\chrome.exe"),
        ];
        if let Some(local) = dirs::data_local_dir() {
            v.push(local.join(r"Chromium\Application\chrome.exe"));
            v.push(local.join(r"Google\Chrome\Application\chrome.exe"));
        }
        v
    } else if cfg!(target_os = "macos") {
        let mut v = vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
            PathBuf::from("/opt/homebrew/bin/chromium"),
        ];
        if let Some(home) = dirs::home_dir() {
            v.push(home.join("Applications/Chromium.app/Contents/MacOS/Chromium"));
        }
        v
    } else {
        [
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
        .iter()
        .map(PathBuf::from)
        .collect()
    };

    if let Some(path) = candidates.into_iter().find(|p| p.exists()) {
        info!("Found browser at: {}", path.display());
        return Ok(path);
    }

    if !cfg!(target_os = "windows") {
        for cmd in ["chromium", "chromium-browser", "google-chrome", "chrome"] {
            if let Ok(output) = Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !found.is_empty() {
                        info!("Found browser using 'which': {}", found);
                        return Ok(PathBuf::from(found));
                    }
                }
            }
        }
    }

    Err(Error::browser("Chrome/Chromium executable not found"))
}

/// In containers the setuid sandbox does not work.
fn should_disable_sandbox() -> bool {
    std::path::Path::new("/.dockerenv").exists()
        || std::env::var("container").is_ok()
        || std::env::var("KUBERNETES_SERVICE_HOST").is_ok()
}

pub struct ChromiumLauncher {
    options: LaunchOptions,
}

impl ChromiumLauncher {
    pub fn new(options: LaunchOptions) -> Self {
        Self { options }
    }

    fn build_config(&self, executable: PathBuf, profile: PathBuf) -> Result<CdpBrowserConfig> {
        let mut builder = CdpBrowserConfig::builder()
            .request_timeout(Duration::from_secs(30))
            .window_size(1920, 1080)
            .user_data_dir(profile)
            .chrome_executable(executable)
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-infobars")
            .arg("--use-fake-ui-for-media-stream")
            .arg("--disable-blink-features=AutomationControlled");

        builder = if self.options.headless {
            builder.headless_mode(HeadlessMode::default())
        } else {
            builder.with_head()
        };

        if should_disable_sandbox() {
            info!("Detected containerized environment, disabling sandbox");
            builder = builder.arg("--no-sandbox").arg("--disable-setuid-sandbox");
        }

        builder
            .build()
            .map_err(|e| Error::browser(format!("Failed to build browser config: {}", e)))
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>> {
        let executable = find_browser_executable(self.options.executable_path.as_ref())?;

        let (profile, temporary) = match &self.options.user_data_dir {
            Some(dir) => (dir.clone(), false),
            None => {
                let n = LAUNCH_COUNTER.fetch_add(1, Ordering::Relaxed);
                let dir = std::env::temp_dir()
                    .join(format!("browzee_profile_{}_{}", std::process::id(), n));
                (dir, true)
            }
        };
        std::fs::create_dir_all(&profile)
            .map_err(|e| Error::browser(format!("Failed to create profile directory: {}", e)))?;

        let config = self.build_config(executable, profile.clone())?;
        info!(headless = self.options.headless, profile = %profile.display(), "Launching browser");

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::browser(format!("Failed to launch browser: {}", e)))?;

        let handler_task = task::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    let msg = e.to_string();
                    // chromiumoxide cannot decode every CDP event; those are noise
                    if msg.contains("data did not match any variant of untagged enum Message")
                        || msg.contains("Failed to deserialize WS response")
                    {
                        trace!("Suppressed CDP decode error: {}", msg);
                    } else {
                        error!("Browser handler error: {:?}", e);
                    }
                }
            }
            info!("Browser handler task completed");
        });

        let permissions = permission_types(&self.options.permissions);
        if !permissions.is_empty() {
            if let Err(e) = browser.execute(GrantPermissionsParams::new(permissions)).await {
                warn!(error = %e, "Failed to grant browser permissions");
            }
        }

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(Error::browser(format!("Failed to open page: {}", e)));
            }
        };

        let cleanup = temporary.then_some(profile);
        Ok(Arc::new(ChromiumSession::new(browser, page, handler_task, cleanup)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_mapping() {
        let mapped = permission_types(&[
            "geolocation".to_string(),
            "camera".to_string(),
            "microphone".to_string(),
            "teleportation".to_string(),
        ]);
        assert_eq!(
            mapped,
            vec![
                PermissionType::Geolocation,
                PermissionType::VideoCapture,
                PermissionType::AudioCapture
            ]
        );
    }

    #[test]
    fn test_missing_explicit_executable_is_an_error() {
        let missing = PathBuf::from("/nope/not/a/chrome");
        let err = find_browser_executable(Some(&missing)).unwrap_err();
        assert!(matches!(err, Error::Browser(_)));
    }

    #[test]
    fn test_explicit_executable_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("chrome");
        std::fs::write(&fake, "").unwrap();
        assert_eq!(find_browser_executable(Some(&fake)).unwrap(), fake);
    }

    #[test]
    fn test_options_from_config() {
        let cfg = BrowserConfig {
            executable_path: Some("/opt/chromium/chrome".into()),
            headless: true,
            ..BrowserConfig::default()
        };
        let opts = LaunchOptions::from(&cfg);
        assert_eq!(opts.executable_path, Some(PathBuf::from("/opt/chromium/chrome")));
        assert!(opts.headless);
        assert!(opts.permissions.contains(&"geolocation".to_string()));
    }
}
