//! End-to-end orchestration scenarios
//!
//! These tests drive the core the way a platform would: a scripted CMS
//! behind the transport seam, renderer callbacks for playback progress,
//! and assertions over the emitted event stream.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;

use marquee::core::runtime;
use marquee::events::PlayerEvent;
use marquee::models::{PlayRules, Schedule, ScheduledCommand, ScheduledLayout};
use marquee::transport::TransportError;

use common::*;

// ============================================================================
// S1 - Happy-path first cycle
// ============================================================================

#[tokio::test]
async fn test_happy_path_first_cycle() {
    let cms = ScriptedCms::ready(&["100.xlf"]);
    let (mut core, _clock) = player(Arc::clone(&cms));
    let mut rx = core.events().subscribe();

    core.collect().await.unwrap();

    let events = drain(&mut rx);
    assert_sequence(
        &events,
        &[
            "collection-start",
            "register-complete",
            "files-received",
            "schedule-received",
            "layouts-scheduled",
            "layout-prepare-request",
            "collection-complete",
        ],
    );
    assert_eq!(prepares(&events), vec!["100.xlf"]);

    assert!(events.iter().any(|e| matches!(
        e,
        PlayerEvent::LayoutsScheduled { layouts } if layouts == &vec!["100.xlf".to_string()]
    )));
}

// ============================================================================
// S2 - Round-robin cycles
// ============================================================================

#[tokio::test]
async fn test_round_robin_rotation_with_wrap() {
    let cms = ScriptedCms::ready(&["100.xlf", "200.xlf", "300.xlf"]);
    let (mut core, _clock) = player(Arc::clone(&cms));
    let mut rx = core.events().subscribe();

    core.collect().await.unwrap();
    core.layout_started("100.xlf");
    drain(&mut rx);

    core.advance_next();
    core.layout_started("200.xlf");
    core.advance_next();
    core.layout_started("300.xlf");
    core.advance_next();

    assert_eq!(
        prepares(&drain(&mut rx)),
        vec!["200.xlf", "300.xlf", "100.xlf"]
    );
}

// ============================================================================
// S3 - Blacklist
// ============================================================================

#[tokio::test]
async fn test_blacklist_after_three_failures() {
    let cms = ScriptedCms::ready(&["100.xlf", "200.xlf"]);
    let (mut core, _clock) = player(Arc::clone(&cms));
    let mut rx = core.events().subscribe();

    core.collect().await.unwrap();
    core.layout_started("100.xlf");
    drain(&mut rx);

    for _ in 0..3 {
        core.layout_failed("100.xlf", "render");
    }

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        PlayerEvent::LayoutBlacklisted { layout, failures, .. }
            if layout == "100.xlf" && *failures == 3
    )));

    // the CMS report is fire-and-forget on a spawned task
    tokio::task::yield_now().await;
    assert_eq!(
        cms.blacklist_calls.lock().unwrap().clone(),
        vec![("100.xlf".into(), "layout".into(), "render".into())]
    );

    // rotation skips the blacklisted layout
    core.advance_next();
    assert_eq!(prepares(&drain(&mut rx)), vec!["200.xlf"]);

    // and never prepares it again while an alternative exists
    core.layout_started("200.xlf");
    core.advance_next();
    let again = prepares(&drain(&mut rx));
    assert!(again.iter().all(|l| l != "100.xlf"), "got {again:?}");
}

// ============================================================================
// S4 - Rate limit
// ============================================================================

fn rate_limited_schedule() -> Schedule {
    Schedule {
        layouts: vec![ScheduledLayout {
            file: "472.xlf".into(),
            rules: PlayRules {
                priority: 10,
                fromdt: Some("2020-01-01T00:00:00Z".parse().unwrap()),
                todt: Some("2040-01-01T00:00:00Z".parse().unwrap()),
                max_plays_per_hour: 3,
                ..Default::default()
            },
        }],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_rate_limit_even_distribution() {
    let cms = ScriptedCms::ready(&[]);
    *cms.schedule.lock().unwrap() = rate_limited_schedule();

    let (mut core, clock) = player(Arc::clone(&cms));
    let mut rx = core.events().subscribe();

    core.collect().await.unwrap();
    core.layout_started("472.xlf");
    drain(&mut rx);

    // 10 minutes later the 20-minute gap gate excludes it
    clock.advance(ChronoDuration::minutes(10));
    core.apply_evaluation();
    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        PlayerEvent::LayoutsScheduled { layouts } if layouts.is_empty()
    )));

    // at 21 minutes it is back
    clock.advance(ChronoDuration::minutes(11));
    core.apply_evaluation();
    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        PlayerEvent::LayoutsScheduled { layouts } if layouts == &vec!["472.xlf".to_string()]
    )));

    // two more plays fill the hourly quota
    core.layout_started("472.xlf");
    clock.advance(ChronoDuration::minutes(21));
    core.layout_started("472.xlf");

    // 50 minutes in: three plays inside the window, excluded
    clock.advance(ChronoDuration::minutes(8));
    core.apply_evaluation();
    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        PlayerEvent::LayoutsScheduled { layouts } if layouts.is_empty()
    )));

    // 63 minutes in: the first play fell out of the window
    clock.advance(ChronoDuration::minutes(13));
    core.apply_evaluation();
    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        PlayerEvent::LayoutsScheduled { layouts } if layouts == &vec!["472.xlf".to_string()]
    )));
}

// ============================================================================
// S5 - Offline fallback
// ============================================================================

#[tokio::test]
async fn test_offline_fallback_with_backoff() {
    let cms = ScriptedCms::ready(&["500.xlf"]);
    cms.registration
        .lock()
        .unwrap()
        .settings
        .collect_interval = 300;

    let (mut core, _clock) = player(Arc::clone(&cms));

    // seed the snapshot store with one good cycle
    core.collect().await.unwrap();
    let mut rx = core.events().subscribe();

    cms.fail_next_register(TransportError::Unreachable("cable pulled".into()));
    core.collect().await.unwrap();

    assert!(core.is_offline());
    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, PlayerEvent::OfflineMode { active: true })));
    assert_eq!(prepares(&events), vec!["500.xlf"]);

    // retry ladder: 30 s, 60 s, ... capped at the cached 300 s interval
    let mut delays = Vec::new();
    for _ in 0..5 {
        cms.fail_next_register(TransportError::Timeout);
        core.collect().await.unwrap();
        delays.push(core.is_offline());
    }
    assert!(delays.iter().all(|offline| *offline));

    // recovery flips back online
    core.collect().await.unwrap();
    assert!(!core.is_offline());
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, PlayerEvent::OfflineMode { active: false })));
}

#[tokio::test]
async fn test_offline_without_cache_fails() {
    let cms = ScriptedCms::ready(&["100.xlf"]);
    cms.fail_next_register(TransportError::Timeout);

    let (mut core, _clock) = player(Arc::clone(&cms));
    let mut rx = core.events().subscribe();

    assert!(core.collect().await.is_err());
    assert!(!core.is_offline());
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, PlayerEvent::CollectionError { .. })));
}

// ============================================================================
// S6 - Scheduled command, exactly once
// ============================================================================

#[tokio::test]
async fn test_scheduled_command_exactly_once() {
    let cms = ScriptedCms::ready(&["100.xlf"]);
    cms.schedule.lock().unwrap().commands = vec![ScheduledCommand {
        code: "reboot".into(),
        date: "2024-05-01T11:59:00Z".into(),
    }];

    let (mut core, _clock) = player(Arc::clone(&cms));
    let mut rx = core.events().subscribe();

    core.collect().await.unwrap();
    let events = drain(&mut rx);
    let fired = events
        .iter()
        .filter(|e| matches!(e, PlayerEvent::ScheduledCommand { code, .. } if code == "reboot"))
        .count();
    assert_eq!(fired, 1);

    // the same schedule identity never refires the pair
    core.collect().await.unwrap();
    core.collect().await.unwrap();
    let fired = drain(&mut rx)
        .iter()
        .filter(|e| matches!(e, PlayerEvent::ScheduledCommand { code, .. } if code == "reboot"))
        .count();
    assert_eq!(fired, 0);

    // a new schedule identity resets the marker set
    cms.bump_schedule_token("sched-2");
    core.collect().await.unwrap();
    let fired = drain(&mut rx)
        .iter()
        .filter(|e| matches!(e, PlayerEvent::ScheduledCommand { code, .. } if code == "reboot"))
        .count();
    assert_eq!(fired, 1);
}

// ============================================================================
// S7 - Override and revert, through the runtime
// ============================================================================

async fn next_named(
    rx: &mut tokio::sync::broadcast::Receiver<PlayerEvent>,
    want: &str,
) -> PlayerEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {want}"))
            .expect("bus closed");
        if event.name() == want {
            return event;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_override_with_timed_revert() {
    let cms = ScriptedCms::ready(&["100.xlf"]);
    let (core, _clock) = player(Arc::clone(&cms));
    let handle = core.handle();
    let mut rx = core.events().subscribe();

    let runtime_task = tokio::spawn(runtime::run(core));
    next_named(&mut rx, "collection-complete").await;
    drain(&mut rx);

    handle.change_layout("123", Some(5), None).await;
    let event = next_named(&mut rx, "layout-prepare-request").await;
    match event {
        PlayerEvent::LayoutPrepareRequest { layout, .. } => assert_eq!(layout, "123"),
        _ => unreachable!(),
    }

    // after the 5 s duration the override reverts on its own
    tokio::time::advance(Duration::from_secs(6)).await;
    next_named(&mut rx, "revert-to-schedule").await;

    // and the scheduled layout is prepared again
    let event = next_named(&mut rx, "layout-prepare-request").await;
    match event {
        PlayerEvent::LayoutPrepareRequest { layout, .. } => assert_eq!(layout, "100.xlf"),
        _ => unreachable!(),
    }

    handle.shutdown().await;
    next_named(&mut rx, "cleanup-complete").await;
    runtime_task.await.unwrap();
}

// ============================================================================
// Cross-cutting invariants
// ============================================================================

#[tokio::test]
async fn test_blacklisted_layout_never_prepared_unless_all_are() {
    let cms = ScriptedCms::ready(&["a.xlf", "b.xlf"]);
    let (mut core, _clock) = player(Arc::clone(&cms));
    let mut rx = core.events().subscribe();

    core.collect().await.unwrap();
    core.layout_started("a.xlf");
    drain(&mut rx);

    for _ in 0..3 {
        core.layout_failed("a.xlf", "decode");
    }
    drain(&mut rx);

    // many rotations: a.xlf must not reappear
    for _ in 0..6 {
        core.advance_next();
        core.layout_started("b.xlf");
    }
    let prepared = prepares(&drain(&mut rx));
    assert!(!prepared.is_empty());
    assert!(prepared.iter().all(|l| l == "b.xlf"), "got {prepared:?}");

    // once b.xlf is also blacklisted, the last-resort rule applies
    for _ in 0..3 {
        core.layout_failed("b.xlf", "decode");
    }
    drain(&mut rx);
    core.advance_next();
    assert_eq!(prepares(&drain(&mut rx)), vec!["b.xlf"]);
}

#[tokio::test]
async fn test_manifest_change_unblacklists_and_redownloads() {
    let cms = ScriptedCms::ready(&["a.xlf"]);
    let (mut core, _clock) = player(Arc::clone(&cms));

    core.collect().await.unwrap();
    for _ in 0..3 {
        core.layout_failed("a.xlf", "render");
    }
    assert!(core.is_layout_blacklisted("a.xlf"));

    cms.bump_rf_token("rf-2");
    core.collect().await.unwrap();
    assert!(!core.is_layout_blacklisted("a.xlf"));
}

#[tokio::test]
async fn test_revert_matches_first_scheduled_layout() {
    let cms = ScriptedCms::ready(&["first.xlf", "second.xlf"]);
    let (mut core, _clock) = player(Arc::clone(&cms));
    let mut rx = core.events().subscribe();

    core.collect().await.unwrap();
    core.layout_started("first.xlf");
    drain(&mut rx);

    core.change_layout("999", None, None);
    assert!(core.is_layout_overridden());
    drain(&mut rx);

    core.revert_to_schedule();
    assert!(!core.is_layout_overridden());
    let events = drain(&mut rx);
    assert_sequence(&events, &["revert-to-schedule", "layout-prepare-request"]);
    assert_eq!(prepares(&events), vec!["first.xlf"]);
}

#[tokio::test]
async fn test_status_reports_track_playback() {
    let cms = ScriptedCms::ready(&["100.xlf"]);
    let (mut core, _clock) = player(Arc::clone(&cms));

    core.collect().await.unwrap();
    core.layout_started("100.xlf");
    core.collect().await.unwrap();

    let calls = cms.status_calls.lock().unwrap();
    let last = calls.last().unwrap();
    assert_eq!(last.current_layout_id.as_deref(), Some("100.xlf"));
    assert_eq!(last.display_name, "Integration Display");
    assert!(last.last_layout_change_time.is_some());
}

#[tokio::test]
async fn test_media_inventory_submitted_with_manifest() {
    let cms = ScriptedCms::ready(&["100.xlf"]);
    cms.required_files.lock().unwrap().files = vec![marquee::models::RequiredFile {
        id: "9".into(),
        file_type: marquee::models::FileType::Media,
        path: "9.mp4".into(),
        md5: "abc".into(),
        size: 1,
        dependants: None,
    }];

    let (mut core, _clock) = player(Arc::clone(&cms));
    core.collect().await.unwrap();

    let calls = cms.inventory_calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains(r#"id="9""#));
    assert!(calls[0].contains(r#"complete="0""#));
}
