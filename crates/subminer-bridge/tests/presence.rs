#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use tokio::time::Duration;

use subminer_bridge::config::BridgeConfig;
use subminer_bridge::extension::ExtensionLink;
use subminer_bridge::presence::{HeartbeatEmitter, HeartbeatOptions, PeerSnapshot, PresenceDirectory};
use subminer_bridge::transport::{Route, Transport};
use subminer_core::protocol::model::VideoTab;
use subminer_core::protocol::{Envelope, Message, SenderTag};
use subminer_core::CapabilityGate;

use common::{command_of, context, drain, hub, init_tracing};

fn tab(id: i64) -> VideoTab {
    VideoTab {
        id,
        title: format!("tab {id}"),
        src: format!("https://video.example/{id}"),
        fav_icon_url: None,
        subscribed: false,
        synced: false,
        synced_timestamp: 0,
    }
}

fn heartbeats(envs: &[Envelope]) -> Vec<Message> {
    envs.iter()
        .filter(|e| command_of(e) == "heartbeat")
        .map(|e| e.decode::<Message>().unwrap())
        .collect()
}

#[test]
fn subscribers_get_current_set_and_replacements() {
    let directory = PresenceDirectory::new();
    directory.replace(PeerSnapshot {
        tabs: vec![tab(1)],
        players: vec![],
    });

    let a_seen = Arc::new(Mutex::new(Vec::<usize>::new()));
    let b_seen = Arc::new(AtomicUsize::new(0));

    let a = Arc::clone(&a_seen);
    let sub_a = directory.subscribe(move |s| a.lock().unwrap().push(s.tabs.len()));
    let b = Arc::clone(&b_seen);
    let _sub_b = directory.subscribe(move |_| {
        b.fetch_add(1, Ordering::SeqCst);
    });

    // immediate delivery of the known set
    assert_eq!(*a_seen.lock().unwrap(), vec![1]);
    assert_eq!(b_seen.load(Ordering::SeqCst), 1);

    directory.replace(PeerSnapshot {
        tabs: vec![tab(1), tab(2)],
        players: vec![],
    });
    assert_eq!(*a_seen.lock().unwrap(), vec![1, 2]);

    sub_a.unsubscribe();
    directory.replace(PeerSnapshot::default());

    assert_eq!(*a_seen.lock().unwrap(), vec![1, 2]);
    assert_eq!(b_seen.load(Ordering::SeqCst), 3);
    assert_eq!(directory.subscriber_count(), 1);
}

#[test]
fn subscribe_before_first_broadcast_waits() {
    let directory = PresenceDirectory::new();
    let fired = Arc::new(AtomicBool::new(false));
    let f = Arc::clone(&fired);
    let _sub = directory.subscribe(move |_| f.store(true, Ordering::SeqCst));
    assert!(!fired.load(Ordering::SeqCst));
    assert!(directory.tabs().is_none());
}

fn emitter(hub: &Arc<subminer_bridge::transport::LocalHub>, directory: Arc<PresenceDirectory>) -> HeartbeatEmitter {
    let player = context(hub, Route::Window, SenderTag::Player, "player-1");
    HeartbeatEmitter::new(
        player.channel,
        Route::Window,
        directory,
        Arc::new(AtomicBool::new(true)),
        Duration::from_millis(1000),
    )
}

#[tokio::test(start_paused = true)]
async fn restarting_heartbeat_cancels_the_previous_timer() {
    init_tracing();
    let hub = hub();
    let (_ext, mut ext_rx) = hub.connect(Route::Window);
    let directory = PresenceDirectory::new();
    let beats = emitter(&hub, directory);
    let gate = CapabilityGate::new(Some("1.4.0"));

    assert!(beats.start(&gate, HeartbeatOptions::default()));
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(beats.start(&gate, HeartbeatOptions::default()));
    tokio::time::sleep(Duration::from_millis(1500)).await;

    // 0 and 1000 from the first cycle, 1500 and 2500 from the second
    assert_eq!(heartbeats(&drain(&mut ext_rx)).len(), 4);

    beats.stop();
    assert!(!beats.is_running());
    tokio::time::sleep(Duration::from_millis(3000)).await;
    assert!(heartbeats(&drain(&mut ext_rx)).is_empty());
    assert_eq!(beats.cycles(), 2);
}

#[tokio::test(start_paused = true)]
async fn many_restarts_never_overlap() {
    init_tracing();
    let hub = hub();
    let (_ext, mut ext_rx) = hub.connect(Route::Window);
    let beats = emitter(&hub, PresenceDirectory::new());
    let gate = CapabilityGate::new(Some("1.0.0"));

    for _ in 0..10 {
        beats.start(&gate, HeartbeatOptions::default());
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    // each cycle beats once immediately and is replaced before its second tick
    assert_eq!(heartbeats(&drain(&mut ext_rx)).len(), 10);
    beats.stop();
}

#[tokio::test(start_paused = true)]
async fn heartbeats_carry_role_and_known_tabs() {
    init_tracing();
    let hub = hub();
    let (_ext, mut ext_rx) = hub.connect(Route::Window);
    let directory = PresenceDirectory::new();
    directory.replace(PeerSnapshot {
        tabs: vec![tab(3)],
        players: vec![],
    });
    let beats = emitter(&hub, Arc::clone(&directory));
    let gate = CapabilityGate::new(Some("1.4.0"));

    beats.start(
        &gate,
        HeartbeatOptions {
            from_video_player: false,
            loaded_subtitles: true,
        },
    );
    tokio::time::sleep(Duration::from_millis(10)).await;
    let sent = heartbeats(&drain(&mut ext_rx));
    let Message::Heartbeat { id, received_tabs, video_player, side_panel, loaded_subtitles } = &sent[0] else {
        panic!("expected heartbeat");
    };
    assert_eq!(id, "player-1");
    assert_eq!(received_tabs, &vec![tab(3)]);
    assert!(!video_player);
    assert!(*side_panel);
    assert!(*loaded_subtitles);

    beats.start(
        &gate,
        HeartbeatOptions {
            from_video_player: true,
            loaded_subtitles: false,
        },
    );
    tokio::time::sleep(Duration::from_millis(10)).await;
    let sent = heartbeats(&drain(&mut ext_rx));
    let Message::Heartbeat { received_tabs, video_player, .. } = &sent[0] else {
        panic!("expected heartbeat");
    };
    assert!(received_tabs.is_empty());
    assert!(*video_player);
    beats.stop();
}

#[tokio::test(start_paused = true)]
async fn old_extensions_get_no_video_heartbeats() {
    init_tracing();
    let hub = hub();
    let (_ext, mut ext_rx) = hub.connect(Route::Window);
    let beats = emitter(&hub, PresenceDirectory::new());
    let video = HeartbeatOptions {
        from_video_player: true,
        loaded_subtitles: false,
    };

    assert!(!beats.start(&CapabilityGate::new(Some("0.23.0")), video));
    assert!(!beats.start(&CapabilityGate::new(None), HeartbeatOptions::default()));
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(drain(&mut ext_rx).is_empty());

    // management surfaces still beat for 0.23.0
    assert!(beats.start(&CapabilityGate::new(Some("0.23.0")), HeartbeatOptions::default()));
    assert!(beats.start(&CapabilityGate::new(Some("0.23.1")), video));
    beats.stop();
}

#[tokio::test(start_paused = true)]
async fn tabs_with_ack_request_get_exactly_one_ack() {
    init_tracing();
    let hub = hub();
    let (link_port, link_rx) = hub.connect(Route::Window);
    let link = ExtensionLink::new(
        Some("1.4.0"),
        HashMap::new(),
        link_port,
        link_rx,
        &BridgeConfig::default(),
    );
    let (ext, mut ext_rx) = hub.connect(Route::Window);

    let tabs = vec![tab(1), tab(2)];
    let broadcast = Envelope::new(
        SenderTag::ExtensionToPlayer,
        &json!({
            "command": "tabs",
            "tabs": tabs,
            "asbplayers": [{"id": "other", "sidePanel": true, "videoPlayer": false, "timestamp": 1}],
            "ackRequested": true,
        }),
    )
    .unwrap();
    ext.post(Route::Window, broadcast).await.unwrap();

    let ack = tokio::time::timeout(Duration::from_secs(1), ext_rx.recv())
        .await
        .expect("ack expected")
        .unwrap()
        .envelope;
    assert_eq!(ack.sender, SenderTag::Player);
    let Message::AckTabs { id, received_tabs, side_panel } = ack.decode::<Message>().unwrap() else {
        panic!("expected ackTabs");
    };
    assert_eq!(id, link.instance_id());
    assert_eq!(received_tabs, tabs);
    assert!(!side_panel);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(drain(&mut ext_rx).is_empty());

    let snapshot = link.directory().current().unwrap();
    assert_eq!(snapshot.players.len(), 1);
    assert_eq!(link.tabs().unwrap().len(), 2);
}
