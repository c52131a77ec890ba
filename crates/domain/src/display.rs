//! 展示辅助函数

use chrono::{DateTime, Datelike, TimeZone, Timelike};

/// 格式化为 `Sunday, 3:07pm` 样式
pub fn format_timestamp<Tz: TimeZone>(time: &DateTime<Tz>) -> String {
    let weekday = weekday_name(time);
    let (is_pm, hour) = time.hour12();
    let suffix = if is_pm { "pm" } else { "am" };
    format!("{weekday}, {hour}:{:02}{suffix}", time.minute())
}

/// 星期几的英文全称
pub fn weekday_name<Tz: TimeZone>(time: &DateTime<Tz>) -> &'static str {
    match time.weekday() {
        chrono::Weekday::Mon => "Monday",
        chrono::Weekday::Tue => "Tuesday",
        chrono::Weekday::Wed => "Wednesday",
        chrono::Weekday::Thu => "Thursday",
        chrono::Weekday::Fri => "Friday",
        chrono::Weekday::Sat => "Saturday",
        chrono::Weekday::Sun => "Sunday",
    }
}
