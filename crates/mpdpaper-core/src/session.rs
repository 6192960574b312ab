//! One boot epoch, from power-on to power-down.
//!
//! The device never runs continuously: every boot loads the configuration,
//! joins the network, refreshes the status screen and, when a person woke it,
//! offers the menu for a few seconds. The epoch always ends in a
//! [`SleepDecision`] handed to the scheduler.

use log::{info, warn};

use crate::board::{Board, Context, DisplaySurface, InputSource, Network, Platform, WakeCause};
use crate::config::load_configuration;
use crate::menu::{Menu, TouchPolicy};
use crate::scheduler::{self, PlaybackContext, SleepDecision, SleepPolicy, LONG_SLEEP_SECS};
use crate::status;

pub const NO_WIFI_MESSAGE: &str = "No WiFi connection";
pub const MISSING_CONFIG_MESSAGE: &str = "Missing config!!";
pub const TIME_SYNC_FAILED_MESSAGE: &str = "Could not obtain time info";
pub const TIME_SYNCED_MESSAGE: &str = "RTC time synced with NTP";
pub const RTC_WAKE_MESSAGE: &str = "Power on by RTC timer";
pub const USER_WAKE_MESSAGE: &str = "Power on by PWR Btn/USB";
pub const MENU_PROMPT: &str = "Press a button or touch for menu";

/// Tunables of the boot epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub sleep_policy: SleepPolicy,
    pub touch: TouchPolicy,
    /// Ticks without input before interactive mode gives up
    pub idle_ticks: u32,
    pub tick_ms: u32,
    /// Menu polls without input before an open menu is abandoned
    pub menu_idle_ticks: u32,
    pub config_retry_initial_ms: u32,
    pub config_retry_max_ms: u32,
    /// Total wait for a configuration before sleeping
    pub config_timeout_ms: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            sleep_policy: SleepPolicy::default(),
            touch: TouchPolicy::default(),
            idle_ticks: 55,
            tick_ms: 100,
            menu_idle_ticks: 550,
            config_retry_initial_ms: 3_000,
            config_retry_max_ms: 30_000,
            config_timeout_ms: 15 * 60 * 1_000,
        }
    }
}

pub struct Session<B: Board> {
    ctx: Context<B>,
    settings: SessionSettings,
}

impl<B: Board> Session<B> {
    pub fn new(ctx: Context<B>, settings: SessionSettings) -> Self {
        Self { ctx, settings }
    }

    pub fn context(&self) -> &Context<B> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut Context<B> {
        &mut self.ctx
    }

    pub fn into_context(self) -> Context<B> {
        self.ctx
    }

    /// Run one epoch and power down
    pub fn run(mut self) -> ! {
        let decision = self.run_epoch();
        scheduler::power_down(&mut self.ctx, &decision)
    }

    /// Everything up to, and including, the sleep announcement
    pub fn run_epoch(&mut self) -> SleepDecision {
        let wake = self.ctx.platform.wake_cause();
        info!("session: wake cause {:?}", wake);

        self.ctx.platform.feed_watchdog();
        if let Err(err) = self.ctx.display.init() {
            warn!("session: display init failed: {:?}", err);
        }
        self.ctx.show_top(match wake {
            WakeCause::RtcTimer => RTC_WAKE_MESSAGE,
            WakeCause::User => USER_WAKE_MESSAGE,
        });

        if !self.load_config() {
            let decision = SleepDecision::new(LONG_SLEEP_SECS, "Sleeping for 1 hour");
            scheduler::announce(&mut self.ctx, &decision);
            return decision;
        }

        if !self.ctx.ensure_network() {
            return self.finish();
        }

        if wake != WakeCause::RtcTimer {
            self.sync_time();
        }

        let lines = status::collect_status(&mut self.ctx);
        self.ctx.show_status(&lines);

        if wake == WakeCause::User {
            self.interactive(lines);
        }
        self.finish()
    }

    /// Retry with doubling backoff until a configuration loads or the
    /// timeout passes
    fn load_config(&mut self) -> bool {
        let mut waited = 0u32;
        let mut backoff = self.settings.config_retry_initial_ms;
        loop {
            let ctx = &mut self.ctx;
            match load_configuration(&mut ctx.sd, &mut ctx.flash) {
                Ok(config) => {
                    ctx.config = config;
                    return true;
                }
                Err(err) => {
                    warn!("session: no configuration: {}", err);
                    ctx.show_top(MISSING_CONFIG_MESSAGE);
                    if waited >= self.settings.config_timeout_ms {
                        warn!("session: giving up on configuration after {} ms", waited);
                        return false;
                    }
                    ctx.pause(backoff);
                    waited = waited.saturating_add(backoff);
                    backoff = backoff
                        .saturating_mul(2)
                        .min(self.settings.config_retry_max_ms);
                }
            }
        }
    }

    fn sync_time(&mut self) {
        let ctx = &mut self.ctx;
        ctx.platform.feed_watchdog();
        match ctx.network.sync_time(&ctx.config.network) {
            Ok(now) => {
                info!("session: clock set to {}", now);
                ctx.platform.set_time(&now);
                ctx.show_top(TIME_SYNCED_MESSAGE);
            }
            Err(err) => {
                warn!("session: {}", err);
                ctx.show_top(TIME_SYNC_FAILED_MESSAGE);
            }
        }
    }

    /// Poll for input until the idle limit; any input opens the menu
    ///
    /// The input that opens the menu is consumed by the opening and does not
    /// act on the menu itself.
    fn interactive(&mut self, mut lines: Vec<String>) {
        let menu = Menu::create(&self.ctx.config);
        self.ctx.show_bottom(MENU_PROMPT);

        let mut idle = 0;
        while idle < self.settings.idle_ticks {
            self.ctx.platform.feed_watchdog();
            let buttons = self.ctx.input.poll_buttons();
            let touched = !self.ctx.input.poll_touches().is_empty();
            if !buttons.any() && !touched {
                idle += 1;
                self.ctx.platform.delay_ms(self.settings.tick_ms);
                continue;
            }

            info!("session: opening menu");
            let result = menu.show(
                &mut self.ctx,
                &self.settings.touch,
                self.settings.menu_idle_ticks,
            );
            let Some(result) = result else {
                info!("session: menu left without input");
                self.ctx.show_status(&lines);
                break;
            };
            if !result.is_empty() {
                lines = result;
            }
            self.ctx.show_status(&lines);
            idle = 0;
        }
        info!("session: idle, leaving interactive mode");
    }

    fn finish(&mut self) -> SleepDecision {
        let now = self.ctx.platform.now();
        let decision = scheduler::decide_sleep(
            &PlaybackContext::new(self.ctx.playing, &now),
            self.settings.sleep_policy,
        );
        scheduler::announce(&mut self.ctx, &decision);
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::DateTime;
    use crate::input::Button;
    use crate::mock::{
        sample_configuration, DrawCall, MemoryConfigSource, MemoryConfigStore, MockBoard,
        MockMpdServer, MockNetwork, ScriptedInput,
    };

    fn configured(wake: WakeCause, input: ScriptedInput, server: MockMpdServer) -> Session<MockBoard> {
        let mut ctx = MockBoard::context_with_server(server);
        ctx.input = input;
        ctx.sd = MemoryConfigSource::new(Some(sample_configuration(2, 3)));
        ctx.platform.set_wake_cause(wake);
        ctx.platform.set_clock(DateTime::new(2024, 6, 2, 14, 3, 20));
        Session::new(ctx, SessionSettings::default())
    }

    fn fixed() -> SessionSettings {
        SessionSettings {
            sleep_policy: SleepPolicy::FixedInterval,
            ..SessionSettings::default()
        }
    }

    #[test]
    fn rtc_wake_refreshes_and_sleeps_without_time_sync() {
        let mut session = configured(WakeCause::RtcTimer, ScriptedInput::new(), MockMpdServer::new());
        let decision = session.run_epoch();

        let ctx = session.context();
        assert_eq!(decision.message, "Sleeping for 10 minutes");
        assert_eq!(ctx.network.time_syncs(), 0);
        assert!(ctx.platform.rtc_writes().is_empty());
        assert!(ctx.display.calls().iter().any(|call| matches!(call, DrawCall::Status(_))));
        assert!(!ctx.display.calls().iter().any(|call| matches!(call, DrawCall::Menu { .. })));
        assert_eq!(
            ctx.display.calls().last(),
            Some(&DrawCall::Bottom("Sleeping for 10 minutes".into()))
        );
        // SD config mirrored to flash
        assert!(ctx.flash.stored().is_some());
    }

    #[test]
    fn user_wake_syncs_time_and_times_out() {
        let mut session = configured(WakeCause::User, ScriptedInput::new(), MockMpdServer::new());
        session.run_epoch();

        let ctx = session.context();
        assert_eq!(ctx.network.time_syncs(), 1);
        assert_eq!(ctx.platform.rtc_writes(), &[MockNetwork::SYNCED_TIME]);
        assert!(ctx.display.calls().contains(&DrawCall::Bottom(MENU_PROMPT.into())));
        // 55 idle ticks of 100 ms plus the settle delay
        assert!(ctx.platform.elapsed_ms() >= 5_500);
    }

    #[test]
    fn time_sync_failure_is_reported_and_flow_continues() {
        let mut session = configured(WakeCause::User, ScriptedInput::new(), MockMpdServer::new());
        session.context_mut().network = MockNetwork::new().without_time();
        session.run_epoch();

        let ctx = session.context();
        assert!(ctx
            .display
            .calls()
            .contains(&DrawCall::Top(TIME_SYNC_FAILED_MESSAGE.into())));
        assert!(ctx.platform.rtc_writes().is_empty());
        assert!(ctx.display.calls().iter().any(|call| matches!(call, DrawCall::Status(_))));
    }

    #[test]
    fn wifi_failure_sleeps_right_away() {
        let mut session = configured(WakeCause::User, ScriptedInput::new(), MockMpdServer::new());
        session.context_mut().network = MockNetwork::failing();
        let decision = session.run_epoch();

        let ctx = session.context();
        assert_eq!(decision.message, "Sleeping for 10 minutes");
        assert!(ctx.display.calls().contains(&DrawCall::Top(NO_WIFI_MESSAGE.into())));
        assert!(!ctx.display.calls().iter().any(|call| matches!(call, DrawCall::Status(_))));
        assert!(ctx.player.connector().connections().is_empty());
    }

    #[test]
    fn missing_config_backs_off_then_gives_up() {
        let mut session = configured(WakeCause::User, ScriptedInput::new(), MockMpdServer::new());
        session.context_mut().sd = MemoryConfigSource::new(None);
        session.settings.config_timeout_ms = 60_000;
        let decision = session.run_epoch();

        let ctx = session.context();
        assert_eq!(decision.duration_seconds, LONG_SLEEP_SECS);
        // 3 + 6 + 12 + 24 + 30 s of backoff, then the settle delay
        assert_eq!(ctx.platform.elapsed_ms(), 75_000 + 250);
        let missing = ctx
            .display
            .calls()
            .iter()
            .filter(|call| **call == DrawCall::Top(MISSING_CONFIG_MESSAGE.into()))
            .count();
        assert_eq!(missing, 6);
        assert_eq!(ctx.network.connect_attempts(), 0);
    }

    #[test]
    fn flash_config_is_used_without_sd() {
        let mut session = configured(WakeCause::RtcTimer, ScriptedInput::new(), MockMpdServer::new());
        let ctx = session.context_mut();
        ctx.sd = MemoryConfigSource::new(None);
        ctx.flash = MemoryConfigStore::with(sample_configuration(3, 0), Some(2));
        session.run_epoch();

        let ctx = session.context();
        assert_eq!(ctx.config.active_player().unwrap().name, "Player 3");
        assert_eq!(ctx.player.connector().connections(), vec!["player3.local:6600"]);
    }

    #[test]
    fn playing_player_gives_short_sleep() {
        let server = MockMpdServer::new().with_queue(&["http://a"]);
        server.set_playing(true);
        let mut session = configured(WakeCause::RtcTimer, ScriptedInput::new(), server);
        session.settings = fixed();
        let decision = session.run_epoch();
        assert_eq!(decision.duration_seconds, 60);
        assert_eq!(decision.message, "Sleeping for 1 minute");
    }

    #[test]
    fn menu_toggle_updates_screen_and_sleep() {
        let server = MockMpdServer::new().with_queue(&["http://a"]);
        let input = ScriptedInput::new()
            .idle(10)
            .press(Button::Select)
            .press(Button::Select);
        let mut session = configured(WakeCause::User, input, server.clone());
        session.settings = fixed();
        let decision = session.run_epoch();

        let ctx = session.context();
        assert!(server.is_playing());
        assert!(ctx.playing);
        assert_eq!(decision.duration_seconds, 60);
        assert!(ctx.display.calls().contains(&DrawCall::Status(vec![
            "Player: Player 1".into(),
            "Start playing".into()
        ])));
    }

    #[test]
    fn return_from_menu_restores_status() {
        let input = ScriptedInput::new()
            .press(Button::Down)
            .press(Button::Up)
            .press(Button::Select);
        let mut session = configured(WakeCause::User, input, MockMpdServer::new());
        session.run_epoch();

        let ctx = session.context();
        let statuses: Vec<&Vec<String>> = ctx
            .display
            .calls()
            .iter()
            .filter_map(|call| match call {
                DrawCall::Status(lines) => Some(lines),
                _ => None,
            })
            .collect();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0], statuses[1]);
        assert_eq!(ctx.config.player_index(), 0);
    }

    #[test]
    fn abandoned_menu_still_sleeps() {
        let input = ScriptedInput::new()
            .press(Button::Down) // open the menu
            .press(Button::Down)
            .idle(100_000)
            .press(Button::Up)
            .press(Button::Select);
        let mut session = configured(WakeCause::User, input, MockMpdServer::new());
        let decision = session.run_epoch();

        let ctx = session.context();
        assert_eq!(decision.message, "Sleeping for 10 minutes");
        assert_eq!(
            ctx.display.calls().last(),
            Some(&DrawCall::Bottom(decision.message.clone()))
        );
        // Status, menu wait and the 5.5 s menu budget; the script never resumes
        assert!(ctx.platform.elapsed_ms() < 20_000);
        assert!(ctx.platform.max_unfed_ms() < 10_000);
        assert_eq!(ctx.config.player_index(), 0);

        let statuses: Vec<&Vec<String>> = ctx
            .display
            .calls()
            .iter()
            .filter_map(|call| match call {
                DrawCall::Status(lines) => Some(lines),
                _ => None,
            })
            .collect();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0], statuses[1]);
    }

    #[test]
    fn watchdog_is_fed_through_long_waits() {
        let mut session = configured(WakeCause::User, ScriptedInput::new(), MockMpdServer::new());
        session.run_epoch();
        assert!(session.context().platform.max_unfed_ms() <= 1_000);
    }
}
