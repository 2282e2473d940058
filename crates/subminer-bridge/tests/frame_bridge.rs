#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::time::Duration;

use subminer_bridge::frame::FrameBridge;
use subminer_core::error::ErrorKind;
use subminer_core::protocol::{FetchOptions, FrameCommand};

use common::{eventually, init_tracing, FakeDocuments, FakeSurfaceHost};

fn bridge(host: &Arc<FakeSurfaceHost>) -> FrameBridge {
    FrameBridge::new(host.clone(), Arc::new(FakeDocuments), Duration::from_millis(1000))
}

#[tokio::test]
async fn bind_creates_one_hidden_surface_and_configures_it() {
    init_tracing();
    let host = FakeSurfaceHost::new();
    let bridge = bridge(&host);
    bridge.set_fetch_options(Some(FetchOptions {
        video_src: "https://video.example/v.mp4".into(),
        allowed_fetch_url: "http://127.0.0.1:8765".into(),
    }));

    assert!(bridge.bind().await.unwrap());
    assert!(!bridge.bind().await.unwrap());

    assert_eq!(host.count(), 1);
    assert_eq!(bridge.surfaces_created(), 1);
    let surface = host.last();
    assert!(surface.is_hidden());
    assert!(bridge.hidden());
    assert!(!bridge.showing());
    assert!(surface.document.contains("lang=\"en\""));

    let posted = surface.posted();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0]["command"], "configure");
    assert_eq!(posted[0]["fetchOptions"]["allowedFetchUrl"], "http://127.0.0.1:8765");
    assert_eq!(posted[0]["language"], "en");
}

#[tokio::test(start_paused = true)]
async fn concurrent_binds_create_a_single_surface() {
    init_tracing();
    let host = FakeSurfaceHost::slow(Duration::from_millis(200));
    let bridge = bridge(&host);

    let (a, b) = tokio::join!(bridge.bind(), bridge.bind());
    let mut created = [a.unwrap(), b.unwrap()];
    created.sort();
    assert_eq!(created, [false, true]);
    assert_eq!(host.count(), 1);

    let (c1, c2) = tokio::join!(bridge.client(), bridge.client());
    assert!(Arc::ptr_eq(&c1.unwrap(), &c2.unwrap()));
    assert_eq!(host.count(), 1);
}

#[tokio::test]
async fn show_and_hide_keep_the_surface_and_its_listeners() {
    init_tracing();
    let host = FakeSurfaceHost::new();
    let bridge = bridge(&host);

    let client = bridge.client().await.unwrap();
    let got = Arc::new(Mutex::new(Vec::<Value>::new()));
    let sink = Arc::clone(&got);
    let _sub = client.on_message(move |m| sink.lock().unwrap().push(m.clone()));

    bridge.show();
    assert!(bridge.showing());
    assert!(!host.last().is_hidden());
    bridge.hide();
    assert!(!bridge.showing());
    assert!(host.last().is_hidden());
    bridge.show();

    let again = bridge.client().await.unwrap();
    assert!(Arc::ptr_eq(&client, &again));
    assert_eq!(again.listener_count(), 1);
    assert_eq!(host.count(), 1);

    client.update_state(json!({"open": true})).unwrap();
    client.send_message(&FrameCommand::Focus).unwrap();
    assert_eq!(host.last().commands(), vec!["configure", "state", "focus"]);
    assert_eq!(host.last().posted()[1]["state"]["open"], true);

    host.last().emit(json!({"command": "openSettings"})).await;
    eventually(|| got.lock().unwrap().len() == 1).await;
    assert_eq!(got.lock().unwrap()[0]["command"], "openSettings");
}

#[tokio::test(start_paused = true)]
async fn surface_that_never_gets_ready_times_out() {
    init_tracing();
    let host = FakeSurfaceHost::silent();
    let bridge = bridge(&host);

    let err = bridge.bind().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(!bridge.bound());
    assert!(host.last().is_destroyed());
    assert_eq!(bridge.surfaces_created(), 0);

    let err = bridge.client().await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(host.count(), 2);
}

#[tokio::test]
async fn changed_parameters_recreate_the_surface() {
    init_tracing();
    let host = FakeSurfaceHost::new();
    let bridge = bridge(&host);

    bridge.bind().await.unwrap();
    let first = host.last();

    bridge.set_language("ja");
    assert!(bridge.bind().await.unwrap());
    assert!(first.is_destroyed());
    assert_eq!(host.count(), 2);
    let second = host.last();
    assert!(second.document.contains("lang=\"ja\""));
    assert_eq!(second.posted()[0]["language"], "ja");

    bridge.set_fetch_options(Some(FetchOptions {
        video_src: "https://video.example/other.mp4".into(),
        allowed_fetch_url: "http://127.0.0.1:8765".into(),
    }));
    assert!(bridge.bind().await.unwrap());
    assert!(second.is_destroyed());
    assert_eq!(bridge.surfaces_created(), 3);
}

#[tokio::test]
async fn unbind_drops_listeners_and_allows_a_fresh_cycle() {
    init_tracing();
    let host = FakeSurfaceHost::new();
    let bridge = bridge(&host);

    let client = bridge.client().await.unwrap();
    let _sub = client.on_message(|_| {});
    bridge.show();

    bridge.unbind();
    assert!(!bridge.bound());
    assert!(!bridge.showing());
    assert!(host.last().is_destroyed());
    assert_eq!(client.listener_count(), 0);
    assert!(bridge.current_client().is_none());

    // show/hide while unbound are no-ops
    bridge.show();
    assert!(!bridge.showing());

    let fresh = bridge.client().await.unwrap();
    assert!(!Arc::ptr_eq(&client, &fresh));
    assert_eq!(host.count(), 2);
    assert!(!host.last().is_destroyed());
}
