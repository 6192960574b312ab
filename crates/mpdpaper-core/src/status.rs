//! Status reporting and player actions.
//!
//! Every function here builds its status lines from scratch and degrades
//! instead of failing: when the network or the player is unreachable the
//! lines gathered so far are returned and the problem goes to the top line.

use log::{info, warn};

use crate::board::{Board, Context, Platform, Telemetry};
use crate::config::{Favourite, PlayerEndpoint};
use crate::mpd::{MpdError, PlayerState};

/// Battery voltage read as empty
pub const BATTERY_EMPTY_MV: u32 = 3_300;
/// Battery voltage read as full
pub const BATTERY_FULL_MV: u32 = 4_350;

/// Linear charge estimate, 0 to 100
pub fn battery_percent(millivolts: u32) -> u8 {
    let clamped = millivolts.clamp(BATTERY_EMPTY_MV, BATTERY_FULL_MV);
    let percent = (clamped - BATTERY_EMPTY_MV) * 100 / (BATTERY_FULL_MV - BATTERY_EMPTY_MV);
    percent as u8
}

pub fn telemetry_line(battery_percent: u8, telemetry: &Telemetry) -> String {
    format!(
        "B{}%,H{}K,R{}M,T{:.0}C,H{:.0}%",
        battery_percent,
        telemetry.free_heap_kb,
        telemetry.free_psram_mb,
        telemetry.temperature_c,
        telemetry.humidity_pct
    )
}

/// Assemble the status screen: clock, telemetry, then what the active player
/// is doing. Updates `ctx.playing` when the player answers.
pub fn collect_status<B: Board>(ctx: &mut Context<B>) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(ctx.platform.now().to_string());
    let battery = battery_percent(ctx.platform.battery_millivolts());
    let telemetry = ctx.platform.telemetry();
    lines.push(telemetry_line(battery, &telemetry));

    let Some(player) = begin_player_action(ctx, &mut lines) else {
        return lines;
    };
    let result = query_player(ctx, &player, &mut lines);
    finish_player_action(ctx, &player, result);
    lines
}

fn query_player<B: Board>(
    ctx: &mut Context<B>,
    player: &PlayerEndpoint,
    lines: &mut Vec<String>,
) -> Result<(), MpdError> {
    let version = ctx.player.connect(player)?;
    lines.push(format!("MPD {}", version));
    let status = ctx.player.status()?;
    ctx.playing = status.state == PlayerState::Play;
    lines.push(format!("State: {}", status.state.as_str()));
    if let Some(song) = ctx.player.current_song()? {
        lines.push(song.display_line());
    }
    Ok(())
}

/// Stop the active player if it is playing, start it otherwise
pub fn toggle_playback<B: Board>(ctx: &mut Context<B>) -> Vec<String> {
    let mut lines = Vec::new();
    let Some(player) = begin_player_action(ctx, &mut lines) else {
        return lines;
    };
    let result = toggle(ctx, &player, &mut lines);
    finish_player_action(ctx, &player, result);
    lines
}

fn toggle<B: Board>(
    ctx: &mut Context<B>,
    player: &PlayerEndpoint,
    lines: &mut Vec<String>,
) -> Result<(), MpdError> {
    ctx.player.connect(player)?;
    if ctx.player.is_playing()? {
        lines.push("Stop playing".to_string());
        ctx.player.stop()?;
        ctx.playing = false;
    } else {
        lines.push("Start playing".to_string());
        ctx.player.play()?;
        ctx.playing = true;
    }
    Ok(())
}

/// Replace the queue of the active player with `favourite` and play it
pub fn play_favourite<B: Board>(ctx: &mut Context<B>, favourite: &Favourite) -> Vec<String> {
    let mut lines = Vec::new();
    let Some(player) = begin_player_action(ctx, &mut lines) else {
        return lines;
    };
    lines.push(format!("Play {}", favourite.name));
    let result = enqueue_and_play(ctx, &player, &favourite.url);
    finish_player_action(ctx, &player, result);
    lines
}

fn enqueue_and_play<B: Board>(
    ctx: &mut Context<B>,
    player: &PlayerEndpoint,
    url: &str,
) -> Result<(), MpdError> {
    ctx.player.connect(player)?;
    ctx.player.clear()?;
    ctx.player.add(url)?;
    ctx.player.play()?;
    ctx.playing = true;
    Ok(())
}

/// Network up and a player configured; pushes the player line
fn begin_player_action<B: Board>(
    ctx: &mut Context<B>,
    lines: &mut Vec<String>,
) -> Option<PlayerEndpoint> {
    if !ctx.ensure_network() {
        return None;
    }
    let Some(player) = ctx.config.active_player().cloned() else {
        warn!("status: no player configured");
        return None;
    };
    lines.push(format!("Player: {}", player.name));
    Some(player)
}

fn finish_player_action<B: Board>(
    ctx: &mut Context<B>,
    player: &PlayerEndpoint,
    result: Result<(), MpdError>,
) {
    match result {
        Ok(()) => info!("status: {} playing={}", player.name, ctx.playing),
        Err(err) => {
            warn!("status: {} ({}:{}): {}", player.name, player.host, player.port, err);
            ctx.show_top(&format!("MPD error: {}", err));
        }
    }
    ctx.player.disconnect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::DateTime;
    use crate::mock::{sample_configuration, DrawCall, MockBoard, MockMpdServer, MockNetwork};

    fn telemetry() -> Telemetry {
        Telemetry {
            free_heap_kb: 180,
            free_psram_mb: 3,
            temperature_c: 21.6,
            humidity_pct: 48.2,
        }
    }

    #[test]
    fn battery_percent_is_clamped_and_linear() {
        assert_eq!(battery_percent(0), 0);
        assert_eq!(battery_percent(3_300), 0);
        assert_eq!(battery_percent(3_825), 50);
        assert_eq!(battery_percent(4_350), 100);
        assert_eq!(battery_percent(5_000), 100);
    }

    #[test]
    fn telemetry_line_format() {
        assert_eq!(telemetry_line(76, &telemetry()), "B76%,H180K,R3M,T22C,H48%");
    }

    #[test]
    fn full_status_when_everything_answers() {
        let server = MockMpdServer::new().with_queue(&["http://radio.example/jazz"]);
        server.set_playing(true);
        let mut ctx = MockBoard::context_with_server(server.clone());
        ctx.config = sample_configuration(2, 0);
        ctx.platform.set_clock(DateTime::new(2024, 6, 2, 14, 3, 20));
        ctx.platform.set_telemetry(telemetry());
        ctx.platform.set_battery_millivolts(4_350);

        let lines = collect_status(&mut ctx);
        assert_eq!(
            lines,
            vec![
                "2024:06:02 - 14:03:20",
                "B100%,H180K,R3M,T22C,H48%",
                "Player: Player 1",
                "MPD 0.23.5",
                "State: play",
                "http://radio.example/jazz",
            ]
        );
        assert!(ctx.playing);
        assert!(!ctx.player.is_connected());
        assert_eq!(server.commands(), vec!["status", "currentsong", "close"]);
    }

    #[test]
    fn unreachable_player_keeps_earlier_lines() {
        let server = MockMpdServer::new();
        server.set_reachable(false);
        let mut ctx = MockBoard::context_with_server(server);
        ctx.config = sample_configuration(1, 0);
        ctx.playing = true;

        let lines = collect_status(&mut ctx);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "Player: Player 1");
        // Unknown state leaves the last known flag alone
        assert!(ctx.playing);
        assert!(matches!(
            ctx.display.calls().last(),
            Some(DrawCall::Top(text)) if text.starts_with("MPD error")
        ));
    }

    #[test]
    fn no_network_stops_after_telemetry() {
        let mut ctx = MockBoard::context();
        ctx.network = MockNetwork::failing();
        ctx.config = sample_configuration(1, 0);

        let lines = collect_status(&mut ctx);
        assert_eq!(lines.len(), 2);
        assert_eq!(
            ctx.display.calls().last(),
            Some(&DrawCall::Top("No WiFi connection".into()))
        );
        assert!(ctx.player.connector().commands().is_empty());
    }

    #[test]
    fn hangup_after_status_keeps_state_line() {
        let server = MockMpdServer::new();
        server.hang_up_on("currentsong");
        let mut ctx = MockBoard::context_with_server(server);
        ctx.config = sample_configuration(1, 0);

        let lines = collect_status(&mut ctx);
        assert_eq!(lines.last().map(String::as_str), Some("State: stop"));
        assert!(!ctx.playing);
    }

    #[test]
    fn toggle_stops_a_playing_player() {
        let server = MockMpdServer::new().with_queue(&["http://a"]);
        server.set_playing(true);
        let mut ctx = MockBoard::context_with_server(server.clone());
        ctx.config = sample_configuration(1, 0);
        ctx.playing = true;

        let lines = toggle_playback(&mut ctx);
        assert_eq!(lines, vec!["Player: Player 1", "Stop playing"]);
        assert!(!server.is_playing());
        assert!(!ctx.playing);
    }

    #[test]
    fn toggle_starts_a_stopped_player() {
        let server = MockMpdServer::new().with_queue(&["http://a"]);
        let mut ctx = MockBoard::context_with_server(server.clone());
        ctx.config = sample_configuration(1, 0);

        let lines = toggle_playback(&mut ctx);
        assert_eq!(lines, vec!["Player: Player 1", "Start playing"]);
        assert!(server.is_playing());
        assert!(ctx.playing);
        assert_eq!(server.commands(), vec!["status", "play", "close"]);
    }

    #[test]
    fn toggle_on_empty_queue_reports_error() {
        let server = MockMpdServer::new();
        let mut ctx = MockBoard::context_with_server(server);
        ctx.config = sample_configuration(1, 0);

        let lines = toggle_playback(&mut ctx);
        assert_eq!(lines, vec!["Player: Player 1", "Start playing"]);
        assert!(!ctx.playing);
        assert!(matches!(
            ctx.display.calls().last(),
            Some(DrawCall::Top(text)) if text.contains("No such song")
        ));
    }

    #[test]
    fn play_favourite_replaces_queue() {
        let server = MockMpdServer::new().with_queue(&["http://old"]);
        let mut ctx = MockBoard::context_with_server(server.clone());
        ctx.config = sample_configuration(2, 3);
        assert!(ctx.config.set_player_index(1));
        let favourite = ctx.config.favourites[2].clone();

        let lines = play_favourite(&mut ctx, &favourite);
        assert_eq!(lines, vec!["Player: Player 2", "Play Favourite 3"]);
        assert_eq!(server.queue(), vec!["http://stream.example/3"]);
        assert_eq!(server.connections(), vec!["player2.local:6600"]);
        assert!(ctx.playing);
    }
}
