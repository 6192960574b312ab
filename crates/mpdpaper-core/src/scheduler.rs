//! Sleep scheduling.
//!
//! The device is asleep most of the time. How long depends on whether music
//! is playing (wake often to keep the status fresh) and on the hour of day
//! (wake rarely at night).

use log::info;

use crate::board::{Board, Context, Platform};
use crate::clock::DateTime;

pub const SHORT_SLEEP_SECS: u32 = 60;
pub const MEDIUM_SLEEP_SECS: u32 = 600;
pub const LONG_SLEEP_SECS: u32 = 3_600;

/// Hours strictly after this count as daytime
pub const DAYTIME_AFTER_HOUR: u8 = 7;

/// Time the bottom-line message gets before power is cut
pub const SETTLE_MS: u32 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SleepPolicy {
    /// Sleep the nominal interval from now
    FixedInterval,
    /// Wake on the next minute, ten-minute or hour boundary
    #[default]
    BoundaryAligned,
}

/// Inputs to the sleep decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackContext {
    pub is_playing: bool,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl PlaybackContext {
    pub fn new(is_playing: bool, now: &DateTime) -> Self {
        Self {
            is_playing,
            hour: now.hour,
            minute: now.minute,
            second: now.second,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SleepDecision {
    pub duration_seconds: u32,
    pub message: String,
}

impl SleepDecision {
    pub fn new(duration_seconds: u32, message: &str) -> Self {
        Self {
            duration_seconds,
            message: message.to_string(),
        }
    }
}

/// Pick the sleep interval for the current playback state and time.
pub fn decide_sleep(ctx: &PlaybackContext, policy: SleepPolicy) -> SleepDecision {
    let minute = u32::from(ctx.minute.min(59));
    let second = u32::from(ctx.second.min(59));
    let aligned = policy == SleepPolicy::BoundaryAligned;

    if ctx.is_playing {
        let secs = if aligned {
            SHORT_SLEEP_SECS - second
        } else {
            SHORT_SLEEP_SECS
        };
        SleepDecision::new(secs, "Sleeping for 1 minute")
    } else if ctx.hour > DAYTIME_AFTER_HOUR {
        let secs = if aligned {
            MEDIUM_SLEEP_SECS - (minute % 10) * 60 - second
        } else {
            MEDIUM_SLEEP_SECS
        };
        SleepDecision::new(secs, "Sleeping for 10 minutes")
    } else {
        let secs = if aligned {
            LONG_SLEEP_SECS - minute * 60 - second
        } else {
            LONG_SLEEP_SECS
        };
        SleepDecision::new(secs, "Sleeping for 1 hour")
    }
}

/// Show the decision on the bottom line and let the panel settle
pub fn announce<B: Board>(ctx: &mut Context<B>, decision: &SleepDecision) {
    info!(
        "sleep: {} ({} s)",
        decision.message, decision.duration_seconds
    );
    ctx.show_bottom(&decision.message);
    ctx.pause(SETTLE_MS);
}

/// Cut power until the decision's wake-up. Never returns.
pub fn power_down<B: Board>(ctx: &mut Context<B>, decision: &SleepDecision) -> ! {
    ctx.player.disconnect();
    ctx.platform.feed_watchdog();
    ctx.platform.power_down(decision.duration_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(is_playing: bool, hour: u8, minute: u8, second: u8) -> PlaybackContext {
        PlaybackContext {
            is_playing,
            hour,
            minute,
            second,
        }
    }

    #[test]
    fn fixed_interval_table() {
        let fixed = SleepPolicy::FixedInterval;
        assert_eq!(decide_sleep(&at(false, 14, 3, 20), fixed).duration_seconds, 600);
        assert_eq!(decide_sleep(&at(false, 3, 0, 0), fixed).duration_seconds, 3_600);
        assert_eq!(decide_sleep(&at(true, 20, 0, 0), fixed).duration_seconds, 60);
        assert_eq!(decide_sleep(&at(true, 2, 0, 0), fixed).duration_seconds, 60);
    }

    #[test]
    fn hour_seven_is_still_night() {
        let fixed = SleepPolicy::FixedInterval;
        assert_eq!(decide_sleep(&at(false, 7, 0, 0), fixed).duration_seconds, 3_600);
        assert_eq!(decide_sleep(&at(false, 8, 0, 0), fixed).duration_seconds, 600);
        assert_eq!(decide_sleep(&at(false, 23, 0, 0), fixed).duration_seconds, 600);
        assert_eq!(decide_sleep(&at(false, 0, 0, 0), fixed).duration_seconds, 3_600);
    }

    #[test]
    fn aligned_wakes_on_boundaries() {
        let aligned = SleepPolicy::BoundaryAligned;
        // 14:03:20 -> 14:10:00
        assert_eq!(decide_sleep(&at(false, 14, 3, 20), aligned).duration_seconds, 400);
        // 03:45:30 -> 04:00:00
        assert_eq!(decide_sleep(&at(false, 3, 45, 30), aligned).duration_seconds, 870);
        // playing at 20:15:45 -> 20:16:00
        assert_eq!(decide_sleep(&at(true, 20, 15, 45), aligned).duration_seconds, 15);
        // exactly on a boundary sleeps the full interval
        assert_eq!(decide_sleep(&at(false, 9, 50, 0), aligned).duration_seconds, 600);
    }

    #[test]
    fn aligned_never_exceeds_nominal_or_hits_zero() {
        for playing in [false, true] {
            for hour in 0..24 {
                for minute in 0..60 {
                    for second in [0, 1, 30, 59] {
                        let fixed =
                            decide_sleep(&at(playing, hour, minute, second), SleepPolicy::FixedInterval);
                        let aligned = decide_sleep(
                            &at(playing, hour, minute, second),
                            SleepPolicy::BoundaryAligned,
                        );
                        assert!(aligned.duration_seconds >= 1);
                        assert!(aligned.duration_seconds <= fixed.duration_seconds);
                        assert_eq!(aligned.message, fixed.message);
                    }
                }
            }
        }
    }

    #[test]
    fn messages_name_the_interval() {
        let fixed = SleepPolicy::FixedInterval;
        assert_eq!(decide_sleep(&at(true, 12, 0, 0), fixed).message, "Sleeping for 1 minute");
        assert_eq!(decide_sleep(&at(false, 12, 0, 0), fixed).message, "Sleeping for 10 minutes");
        assert_eq!(decide_sleep(&at(false, 1, 0, 0), fixed).message, "Sleeping for 1 hour");
    }

    #[test]
    fn playback_context_copies_clock_fields() {
        let now = DateTime::new(2024, 5, 1, 21, 4, 9);
        assert_eq!(PlaybackContext::new(true, &now), at(true, 21, 4, 9));
    }

    #[test]
    fn announce_shows_message_and_settles() {
        use crate::mock::{DrawCall, MockBoard};

        let mut ctx = MockBoard::context();
        let decision = SleepDecision::new(600, "Sleeping for 10 minutes");
        let start = ctx.platform.elapsed_ms();
        announce(&mut ctx, &decision);

        assert_eq!(
            ctx.display.calls().last(),
            Some(&DrawCall::Bottom("Sleeping for 10 minutes".into()))
        );
        assert_eq!(ctx.platform.elapsed_ms() - start, u64::from(SETTLE_MS));
        assert!(ctx.platform.watchdog_feeds() > 0);
    }
}
