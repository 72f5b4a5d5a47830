//! Daemon lifecycle with a shell script standing in for Tor

#![cfg(unix)]

use oniondrop::tor::{bundle::DAEMON_CONFIG, Artifact, ArtifactBundle, DaemonSupervisor};
use std::time::Duration;

/// Publishes a hostname the way Tor does, then idles
const FAKE_DAEMON: &str = "#!/bin/sh
mkdir -p hidden_service
printf 'abcdefghijklmnop.onion\\n' > hidden_service/hostname
exec sleep 30
";

#[tokio::test]
async fn test_launch_publish_and_cleanup() {
    let source = tempfile::tempdir().unwrap();
    let script = source.path().join("fake-tor.sh");
    std::fs::write(&script, FAKE_DAEMON).unwrap();

    let workdir = tempfile::tempdir().unwrap();
    let bundle = ArtifactBundle::new(Artifact::File(script), Artifact::Embedded(DAEMON_CONFIG));
    let supervisor = DaemonSupervisor::new(bundle, workdir.path(), "tori", "torrc");

    let guard = supervisor.launch();
    assert!(guard.is_running());
    assert!(workdir.path().join("tori").is_file());
    assert_eq!(
        std::fs::read(workdir.path().join("torrc")).unwrap(),
        DAEMON_CONFIG
    );

    let address = oniondrop::tor::await_address(
        &workdir.path().join("hidden_service").join("hostname"),
        50,
        Duration::from_millis(100),
    )
    .await
    .unwrap();
    assert_eq!(address.as_str(), "abcdefghijklmnop.onion");
    assert!(guard.is_running());

    drop(guard);
    assert!(!workdir.path().join("tori").exists());
    assert!(!workdir.path().join("torrc").exists());
}
