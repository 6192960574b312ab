use mpdpaper_core::layout::CONTENT_Y;
use mpdpaper_core::menu::{LIST_ROW_HEIGHT, MAIN_ROW_HEIGHT};
use mpdpaper_core::mock::{sample_configuration, DrawCall, MockMpdServer, ScriptedInput};
use mpdpaper_core::{Button, SessionSettings, SleepPolicy};
use mpdpaper_scenario_harness::ScenarioHarness;

/// Screen row through the middle of menu row `index`
fn row_center(index: u16, row_height: u16) -> u16 {
    CONTENT_Y + 10 + index * row_height + row_height / 2
}

fn fixed_interval() -> SessionSettings {
    SessionSettings {
        sleep_policy: SleepPolicy::FixedInterval,
        ..SessionSettings::default()
    }
}

#[test]
fn select_player_with_buttons_persists_choice() {
    let input = ScriptedInput::new()
        .idle(3)
        .press(Button::Select) // open the menu
        .press(Button::Down)
        .press(Button::Select) // Select Player
        .press(Button::Down)
        .press(Button::Down)
        .press(Button::Select); // Player 3
    let server = MockMpdServer::new();
    let mut harness = ScenarioHarness::new(input, server.clone())
        .with_sd_config(sample_configuration(3, 0));

    harness.run();

    let ctx = harness.ctx();
    assert_eq!(ctx.config.player_index(), 2);
    assert_eq!(ctx.flash.player_index(), Some(2));
    assert!(harness
        .calls()
        .contains(&DrawCall::Bottom("New player @Player 3".into())));

    let menus = harness.menus();
    assert_eq!(
        menus[0].0,
        vec!["Start/Stop Play", "Select Player", "Return"]
    );
    let (players, selected) = menus.last().expect("player menu shown");
    assert_eq!(players, &vec!["Player 1", "Player 2", "Player 3", "Return"]);
    assert_eq!(*selected, 2);

    // The status of the old player stays up; nothing was sent to the new one
    let screens = harness.status_screens();
    assert_eq!(screens.len(), 2);
    assert_eq!(screens[0], screens[1]);
    assert_eq!(server.connections(), vec!["player1.local:6600"]);
}

#[test]
fn favourite_from_second_page_by_touch() {
    let main_row = |i| row_center(i, MAIN_ROW_HEIGHT);
    let list_row = |i| row_center(i, LIST_ROW_HEIGHT);
    let input = ScriptedInput::new()
        .touch(100, 500) // any touch opens the menu
        .touch(100, main_row(3)) // highlight "Favourites 2"
        .touch(400, main_row(3)) // commit it
        .touch(100, list_row(1)) // highlight "Favourite 22"
        .touch(100, list_row(1)) // left half does not commit
        .touch(400, list_row(1));
    let server = MockMpdServer::new().with_queue(&["http://old"]);
    let mut harness = ScenarioHarness::new(input, server.clone())
        .with_sd_config(sample_configuration(2, 25))
        .with_settings(fixed_interval());

    let decision = harness.run();

    assert_eq!(server.queue(), vec!["http://stream.example/22"]);
    assert!(server.is_playing());
    assert!(harness.ctx().playing);
    assert_eq!(decision.duration_seconds, 60);

    let screens = harness.status_screens();
    assert_eq!(
        screens.last().expect("action status shown"),
        &vec!["Player: Player 1", "Play Favourite 22"]
    );

    let menus = harness.menus();
    assert_eq!(
        menus[0].0,
        vec![
            "Start/Stop Play",
            "Select Player",
            "Favourites 1",
            "Favourites 2",
            "Return"
        ]
    );
    let page_two = &menus.last().expect("favourites page shown").0;
    assert_eq!(page_two.len(), 6);
    assert_eq!(page_two[0], "Favourite 21");
    assert_eq!(page_two[5], "Return");

    harness
        .save_screenshot_png("screenshots/03_favourite_played.png")
        .expect("Failed to save favourite screenshot");
}

#[test]
fn return_at_every_level_changes_nothing() {
    let input = ScriptedInput::new()
        .press(Button::Up) // open the menu
        .press(Button::Up) // wrap to Return
        .press(Button::Select)
        .press(Button::Select) // reopen
        .press(Button::Down)
        .press(Button::Select) // Select Player
        .press(Button::Up)
        .press(Button::Select) // Return
        .press(Button::Select) // reopen
        .press(Button::Down)
        .press(Button::Down)
        .press(Button::Select) // Favourites 1
        .press(Button::Up)
        .press(Button::Select); // Return
    let server = MockMpdServer::new().with_queue(&["http://keep"]);
    server.set_playing(true);
    let mut harness = ScenarioHarness::new(input, server.clone())
        .with_sd_config(sample_configuration(2, 3));

    harness.run();

    let ctx = harness.ctx();
    assert_eq!(ctx.config.player_index(), 0);
    assert_eq!(ctx.flash.player_index(), Some(0));
    assert!(server.is_playing());
    assert_eq!(server.queue(), vec!["http://keep"]);
    assert_eq!(server.commands(), vec!["status", "currentsong", "close"]);

    let screens = harness.status_screens();
    assert_eq!(screens.len(), 4);
    assert!(screens.iter().all(|lines| *lines == screens[0]));
}

#[test]
fn start_stop_from_menu_then_idle_timeout() {
    let input = ScriptedInput::new()
        .press(Button::Select)
        .press(Button::Select); // Start/Stop Play
    let server = MockMpdServer::new().with_queue(&["http://a"]);
    server.set_playing(true);
    let mut harness = ScenarioHarness::new(input, server.clone())
        .with_sd_config(sample_configuration(1, 0))
        .with_settings(fixed_interval());

    let decision = harness.run();

    assert!(!server.is_playing());
    assert!(!harness.ctx().playing);
    assert_eq!(decision.message, "Sleeping for 10 minutes");
    assert_eq!(
        harness.status_screens().last().expect("toggle status shown"),
        &vec!["Player: Player 1", "Stop playing"]
    );
    // 55 idle ticks after the last input before sleeping
    assert!(harness.ctx().platform.elapsed_ms() >= 5_500);
}

#[test]
fn tap_on_highlighted_row_waits_for_second_tap_then_times_out() {
    let input = ScriptedInput::new()
        .touch(100, 500) // open the menu
        .touch(400, row_center(0, MAIN_ROW_HEIGHT)) // "Start/Stop Play" is already highlighted
        .idle(100_000);
    let server = MockMpdServer::new().with_queue(&["http://a"]);
    let mut harness = ScenarioHarness::new(input, server.clone())
        .with_sd_config(sample_configuration(1, 0));

    harness.run();

    assert!(!server.is_playing());
    assert_eq!(server.commands(), vec!["status", "currentsong", "close"]);
    let screens = harness.status_screens();
    assert_eq!(screens.len(), 2);
    assert_eq!(screens[0], screens[1]);
    let platform = &harness.ctx().platform;
    assert!(platform.elapsed_ms() < 20_000);
    assert!(platform.max_unfed_ms() < 10_000);
}
