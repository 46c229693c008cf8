//! Rotation boundaries in the host's local zone, with no fixed offset
//! configured. Kept in its own test binary because it pins `TZ`.

use std::path::Path;

use chrono::{DateTime, Duration, TimeZone, Utc};
use questdeck_core::{Category, RotationConfig};

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

#[test]
fn host_zone_reads_each_instant_with_its_own_offset() {
    if !Path::new("/usr/share/zoneinfo/Europe/Berlin").exists() {
        eprintln!("tzdata not installed, skipping");
        return;
    }
    std::env::set_var("TZ", "Europe/Berlin");
    let config = RotationConfig::default();
    assert_eq!(config.utc_offset_minutes, None);

    // Jan 3 23:30 and Jan 4 09:00 CET.
    assert!(config.is_due(Category::Daily, Some(utc(2024, 1, 3, 22, 30)), utc(2024, 1, 4, 8, 0)));
    // Jan 4 00:30 and Jan 4 09:00 CET.
    assert!(!config.is_due(Category::Daily, Some(utc(2024, 1, 3, 23, 30)), utc(2024, 1, 4, 8, 0)));

    // Saturday 23:30 CET, then Sunday noon CEST after the spring change.
    assert!(config.is_due(Category::Daily, Some(utc(2024, 3, 30, 22, 30)), utc(2024, 3, 31, 10, 0)));

    // Sunday 00:30 CEST, then Sunday 21:00 CET after the autumn change.
    assert!(!config.is_due(Category::Daily, Some(utc(2024, 10, 26, 22, 30)), utc(2024, 10, 27, 20, 0)));

    // Monday 00:30 CEST is still Sunday under the winter offset.
    let monday = utc(2024, 4, 14, 22, 30);
    assert!(config.is_due(Category::Weekly, Some(monday - Duration::days(14)), monday));
    let sunday = utc(2024, 4, 14, 21, 30);
    assert!(!config.is_due(Category::Weekly, Some(sunday - Duration::days(14)), sunday));
}
