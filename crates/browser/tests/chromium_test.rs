//! Needs a local Chrome/Chromium. Run with `--ignored`.

use browzee_browser::{ChromiumLauncher, LaunchOptions};
use browzee_core::traits::BrowserLauncher;
use browzee_core::types::BrowserAction;

#[tokio::test]
#[ignore]
async fn test_launch_navigate_screenshot_close() {
    let launcher = ChromiumLauncher::new(LaunchOptions {
        headless: true,
        permissions: vec!["geolocation".into()],
        ..LaunchOptions::default()
    });
    let session = launcher.launch().await.unwrap();

    let observation = session
        .execute(&BrowserAction::Navigate {
            url: "data:text/html,<h1>Hello Browzee</h1>".into(),
        })
        .await
        .unwrap();
    assert!(observation.starts_with("Navigated to"));

    let content = session.execute(&BrowserAction::ExtractContent).await.unwrap();
    assert!(content.contains("Hello Browzee"));

    let png = session.screenshot().await.unwrap();
    assert_eq!(&png[1..4], b"PNG");

    session.close().await.unwrap();
    session.close().await.unwrap();
    assert!(session.screenshot().await.is_err());
}
