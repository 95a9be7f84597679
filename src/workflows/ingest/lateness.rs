use chrono::{Duration, NaiveDateTime};

/// A submission is late when it arrives after the deadline shifted by the
/// student's extra time. Without a timestamp nothing is ever late.
pub fn is_late(
    submitted_at: Option<NaiveDateTime>,
    deadline: NaiveDateTime,
    extra_time_minutes: u32,
) -> bool {
    let Some(submitted_at) = submitted_at else {
        return false;
    };

    if submitted_at <= deadline {
        return false;
    }
    if extra_time_minutes == 0 {
        return true;
    }

    submitted_at > deadline + Duration::minutes(i64::from(extra_time_minutes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 4, 22)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn before_or_at_deadline_is_on_time() {
        assert!(!is_late(Some(at(15, 59)), at(16, 0), 0));
        assert!(!is_late(Some(at(16, 0)), at(16, 0), 0));
    }

    #[test]
    fn extra_time_shifts_deadline() {
        assert!(!is_late(Some(at(16, 20)), at(16, 0), 30));
        assert!(!is_late(Some(at(16, 30)), at(16, 0), 30));
        assert!(is_late(Some(at(16, 31)), at(16, 0), 30));
    }

    #[test]
    fn no_extra_time_means_any_delay_is_late() {
        assert!(is_late(Some(at(16, 5)), at(16, 0), 0));
    }

    #[test]
    fn missing_timestamp_is_never_late() {
        assert!(!is_late(None, at(16, 0), 0));
    }

    #[test]
    fn lateness_is_monotonic() {
        let deadline = at(16, 0);
        for minute in 0..120u32 {
            let submitted = deadline + Duration::minutes(i64::from(minute));
            for extra in 0..90u32 {
                if !is_late(Some(submitted), deadline, extra) {
                    assert!(!is_late(Some(submitted), deadline, extra + 1));
                }
                if is_late(Some(submitted), deadline, extra) {
                    let later = submitted + Duration::minutes(1);
                    assert!(is_late(Some(later), deadline, extra));
                }
            }
        }
    }
}
