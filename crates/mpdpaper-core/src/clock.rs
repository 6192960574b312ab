//! Wall-clock time as kept by the RTC.

use core::fmt;

/// Calendar date and time of day, local time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTime {
    pub const fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// Day of week, 0 = Sunday
    pub fn weekday(&self) -> u8 {
        const OFFSETS: [u16; 12] = [0, 3, 2, 5, 0, 3, 5, 1, 4, 6, 2, 4];
        let month = self.month.clamp(1, 12) as usize;
        let year = if month < 3 {
            self.year.saturating_sub(1)
        } else {
            self.year
        };
        let days = year + year / 4 - year / 100 + year / 400 + OFFSETS[month - 1] + self.day as u16;
        (days % 7) as u8
    }

    /// Seconds elapsed since midnight
    pub fn seconds_of_day(&self) -> u32 {
        self.hour as u32 * 3600 + self.minute as u32 * 60 + self.second as u32
    }

    /// Same date, time of day moved forward by `seconds` (wraps at midnight)
    pub fn plus_seconds(&self, seconds: u32) -> Self {
        let total = (self.seconds_of_day() + seconds) % 86_400;
        Self {
            hour: (total / 3600) as u8,
            minute: (total / 60 % 60) as u8,
            second: (total % 60) as u8,
            ..*self
        }
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}:{:02}:{:02} - {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_date_line() {
        let time = DateTime::new(2024, 3, 9, 7, 5, 0);
        assert_eq!(time.to_string(), "2024:03:09 - 07:05:00");
    }

    #[test]
    fn weekday_of_known_dates() {
        assert_eq!(DateTime::new(2024, 1, 1, 0, 0, 0).weekday(), 1);
        assert_eq!(DateTime::new(2000, 2, 29, 0, 0, 0).weekday(), 2);
        assert_eq!(DateTime::new(2026, 10, 18, 12, 0, 0).weekday(), 0);
    }

    #[test]
    fn plus_seconds_wraps_at_midnight() {
        let time = DateTime::new(2024, 5, 1, 23, 59, 30).plus_seconds(45);
        assert_eq!((time.hour, time.minute, time.second), (0, 0, 15));
    }
}
