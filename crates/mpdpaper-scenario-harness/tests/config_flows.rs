use mpdpaper_core::mock::{sample_configuration, DrawCall, MockMpdServer, ScriptedInput};
use mpdpaper_core::session::MISSING_CONFIG_MESSAGE;
use mpdpaper_core::{SessionSettings, WakeCause};
use mpdpaper_scenario_harness::ScenarioHarness;

#[test]
fn flash_copy_is_used_when_card_is_missing() {
    let server = MockMpdServer::new();
    let mut harness = ScenarioHarness::new(ScriptedInput::new(), server.clone())
        .with_flash(sample_configuration(3, 4), Some(1))
        .with_wake(WakeCause::RtcTimer);

    harness.run();

    let ctx = harness.ctx();
    assert_eq!(ctx.config.player_index(), 1);
    assert_eq!(server.connections(), vec!["player2.local:6600"]);
    assert_eq!(harness.status_screens()[0][2], "Player: Player 2");
}

#[test]
fn card_config_is_mirrored_and_keeps_stored_player() {
    let mut harness = ScenarioHarness::new(ScriptedInput::new(), MockMpdServer::new())
        .with_sd_config(sample_configuration(4, 2))
        .with_flash(sample_configuration(1, 0), Some(3))
        .with_wake(WakeCause::RtcTimer);

    harness.run();

    let ctx = harness.ctx();
    let stored = ctx.flash.stored().expect("configuration mirrored");
    assert_eq!(stored.players.len(), 4);
    assert_eq!(stored.favourites.len(), 2);
    assert_eq!(ctx.config.player_index(), 3);
}

#[test]
fn stored_index_past_the_player_list_falls_back_to_first() {
    let server = MockMpdServer::new();
    let mut harness = ScenarioHarness::new(ScriptedInput::new(), server.clone())
        .with_sd_config(sample_configuration(2, 0))
        .with_flash(sample_configuration(5, 0), Some(4))
        .with_wake(WakeCause::RtcTimer);

    harness.run();

    assert_eq!(harness.ctx().config.player_index(), 0);
    assert_eq!(server.connections(), vec!["player1.local:6600"]);
}

#[test]
fn missing_config_sleeps_for_an_hour() {
    let settings = SessionSettings {
        config_retry_initial_ms: 1_000,
        config_retry_max_ms: 4_000,
        config_timeout_ms: 10_000,
        ..SessionSettings::default()
    };
    let server = MockMpdServer::new();
    let mut harness = ScenarioHarness::new(ScriptedInput::new(), server.clone())
        .with_settings(settings);

    let decision = harness.run();

    assert_eq!(decision.message, "Sleeping for 1 hour");
    assert_eq!(decision.duration_seconds, 3_600);
    // 1 + 2 + 4 + 4 s waited before the timeout check gives up
    let missing = harness
        .top_messages()
        .iter()
        .filter(|text| *text == MISSING_CONFIG_MESSAGE)
        .count();
    assert_eq!(missing, 5);
    assert!(harness.status_screens().is_empty());
    assert!(server.connections().is_empty());
    assert_eq!(harness.ctx().network.connect_attempts(), 0);
    assert_eq!(
        harness.calls().last(),
        Some(&DrawCall::Bottom("Sleeping for 1 hour".into()))
    );
}

#[test]
fn unreachable_player_still_sleeps_normally() {
    let server = MockMpdServer::new();
    server.set_reachable(false);
    let mut harness = ScenarioHarness::new(ScriptedInput::new(), server)
        .with_sd_config(sample_configuration(1, 0))
        .with_wake(WakeCause::RtcTimer);

    let decision = harness.run();

    assert_eq!(decision.message, "Sleeping for 10 minutes");
    let screens = harness.status_screens();
    assert_eq!(screens.len(), 1);
    assert_eq!(screens[0].len(), 3);
    assert_eq!(screens[0][2], "Player: Player 1");
    assert!(harness
        .top_messages()
        .iter()
        .any(|text| text.starts_with("MPD error: ")));
}
