use chrono::{TimeZone, Utc};
use number_pool::pattern::{has_lucky_pattern, highlight_segments};
use number_pool::{
    FilterCriteria, FilterSettings, LuckyPattern, MatchTargets, NumberRecord, RangeRole,
    filter_records,
};

fn record(primary: &str, secondary: &str) -> NumberRecord {
    NumberRecord::new(primary, secondary, Utc.timestamp_millis_opt(1_000).unwrap())
}

fn located(primary: &str, secondary: &str, province: &str, city: &str) -> NumberRecord {
    let mut record = record(primary, secondary);
    record.province = Some(province.to_string());
    record.city = Some(city.to_string());
    record
}

fn primaries(records: &[NumberRecord]) -> Vec<&str> {
    records.iter().map(|r| r.primary_id.as_str()).collect()
}

fn criteria(settings: FilterSettings) -> FilterCriteria {
    FilterCriteria::parse(&settings).unwrap()
}

#[test]
fn pattern_literals_hold() {
    assert!(has_lucky_pattern("1122", "AABB"));
    assert!(has_lucky_pattern("1212", "ABAB"));
    assert!(has_lucky_pattern("1234", "ascending"));
    assert!(has_lucky_pattern("4321", "descending"));
    assert!(has_lucky_pattern("1231", "any"));
    assert!(!has_lucky_pattern("1111", "AABB"));
    assert!(!has_lucky_pattern("1357", "any"));
}

#[test]
fn shared_secondary_suffix_keeps_only_the_group() {
    let records = vec![
        record("85290000001", "13800006666"),
        record("85290000002", "13900006666"),
        record("85290000003", "13700007777"),
    ];
    let criteria = FilterCriteria {
        suffix_digits: 4,
        targets: MatchTargets {
            primary: false,
            secondary: true,
        },
        ..FilterCriteria::default()
    };
    let kept = filter_records(&records, &criteria);
    assert_eq!(primaries(&kept), vec!["85290000001", "85290000002"]);
}

#[test]
fn all_stages_narrow_together() {
    let records = vec![
        located("85291112222", "13800001234", "Guangdong", "Shenzhen"),
        located("85293334444", "13800005678", "Guangdong", "Guangzhou"),
        located("85298887777", "13900001111", "Guangdong", "Shenzhen"),
        record("85296660000", "13700000000"),
    ];
    let criteria = criteria(FilterSettings {
        include: "852，9".into(),
        exclude: "5678".into(),
        lucky_pattern: "AABB".into(),
        location: " Shen ".into(),
        ..FilterSettings::default()
    });
    let kept = filter_records(&records, &criteria);
    assert_eq!(primaries(&kept), vec!["85291112222", "85298887777"]);
}

#[test]
fn filtering_is_idempotent_and_pure() {
    let records = vec![
        record("85291234567", "13811112222"),
        record("85290000000", ""),
        record("85295556666", "13912345678"),
    ];
    let snapshot = records.clone();
    let criteria = criteria(FilterSettings {
        lucky_pattern: "any".into(),
        include: "5".into(),
        ..FilterSettings::default()
    });
    let once = filter_records(&records, &criteria);
    let twice = filter_records(&records, &criteria);
    assert_eq!(once, twice);
    assert_eq!(records, snapshot);
    assert_eq!(filter_records(&once, &criteria), once);
}

#[test]
fn disabling_both_targets_ignores_id_stages() {
    let records = vec![record("85291234567", "13811112222")];
    let criteria = criteria(FilterSettings {
        include: "999".into(),
        lucky_pattern: "AAAA".into(),
        match_primary: false,
        match_secondary: false,
        ..FilterSettings::default()
    });
    assert_eq!(filter_records(&records, &criteria).len(), 1);
}

#[test]
fn unknown_pattern_is_rejected_at_parse() {
    let result = FilterCriteria::parse(&FilterSettings {
        lucky_pattern: "ABCD".into(),
        ..FilterSettings::default()
    });
    assert!(result.is_err());
    assert!(has_lucky_pattern("1234", "ABCD"));
}

#[test]
fn highlighting_prefers_pattern_over_include() {
    let segments = highlight_segments("1122", Some(LuckyPattern::Aabb), &["12"]);
    let roles: Vec<Option<RangeRole>> = segments.iter().map(|s| s.role).collect();
    let text: String = segments.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(text, "1122");
    assert!(roles.iter().all(|role| *role != Some(RangeRole::Include)));
}
