#[cfg(test)]
mod tests {
    use crate::slots::generate_slots;
    use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
    use chrono_tz::Tz;
    use everpath_common::models::{AvailabilityRule, RuleKind};
    use proptest::prelude::*;

    const ZONES: [Tz; 4] = [
        Tz::America__Vancouver,
        Tz::America__St_Johns,
        Tz::America__Regina,
        Tz::Europe__Zurich,
    ];

    const WEEKDAYS: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    fn weekly_rules(start_hour: u32, hours: u32) -> Vec<AvailabilityRule> {
        let start = NaiveTime::from_hms_opt(start_hour, 0, 0).unwrap();
        let end = NaiveTime::from_hms_opt(start_hour + hours, 0, 0).unwrap();
        WEEKDAYS
            .iter()
            .map(|weekday| AvailabilityRule {
                agent_id: "agent-1".into(),
                location: "office".into(),
                kind: RuleKind::Recurring {
                    weekday: *weekday,
                    enabled: true,
                    start_local: start,
                    end_local: end,
                },
            })
            .collect()
    }

    proptest! {
        #[test]
        fn slots_have_exact_length_and_never_overlap(
            zone in 0..ZONES.len(),
            day_offset in 0..400i64,
            span_days in 0..21i64,
            start_hour in 0..12u32,
            hours in 1..12u32,
            length_minutes in 15..120i64,
        ) {
            let tz = ZONES[zone];
            let from = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap() + Duration::days(day_offset);
            let to = from + Duration::days(span_days);
            let length = Duration::minutes(length_minutes);
            let now = Utc.with_ymd_and_hms(2029, 1, 1, 0, 0, 0).unwrap();

            let days = generate_slots(&weekly_rules(start_hour, hours), tz, from, to, length, now)
                .unwrap();

            prop_assert_eq!(days.len() as i64, span_days);
            for day in &days {
                for slot in &day.slots {
                    prop_assert_eq!(slot.ends_at - slot.starts_at, length);
                    prop_assert!(slot.starts_at > now);
                }
                for pair in day.slots.windows(2) {
                    prop_assert!(pair[0].ends_at <= pair[1].starts_at);
                }
                // a window never holds more slots than fit in its local length plus a DST hour
                let max_slots = (i64::from(hours) * 60 + 60) / length_minutes;
                prop_assert!(day.slots.len() as i64 <= max_slots);
            }
        }

        #[test]
        fn generation_is_deterministic(
            day_offset in 0..365i64,
            length_minutes in 15..90i64,
        ) {
            let from = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap() + Duration::days(day_offset);
            let to = from + Duration::days(7);
            let rules = weekly_rules(9, 8);
            let now = Utc.with_ymd_and_hms(2029, 1, 1, 0, 0, 0).unwrap();

            let first = generate_slots(&rules, Tz::America__Vancouver, from, to, Duration::minutes(length_minutes), now).unwrap();
            let second = generate_slots(&rules, Tz::America__Vancouver, from, to, Duration::minutes(length_minutes), now).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
