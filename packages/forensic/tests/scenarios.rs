//! End-to-end scenarios run through the full pipeline.

use chrono::{Duration, NaiveDate};
use enrol_signal_forensic::{ForensicInputs, ForensicPipeline, ForensicReport};
use enrol_signal_forensic_models::{ForensicConfig, ScoredRecord};
use enrol_signal_records_models::{BiometricRow, DemographicRow, EnrolmentRow, Granularity};

fn day(n: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).unwrap() + Duration::days(n)
}

fn enrol(date: NaiveDate, district: &str, pin: &str, ages: [u64; 3]) -> EnrolmentRow {
    EnrolmentRow {
        date,
        state: "Karnataka".to_string(),
        district: district.to_string(),
        postal_code: Some(pin.to_string()),
        age_0_5: ages[0],
        age_5_17: ages[1],
        age_18_plus: ages[2],
    }
}

fn bio(date: NaiveDate, district: &str, pin: &str, count: u64) -> BiometricRow {
    BiometricRow {
        date,
        state: "Karnataka".to_string(),
        district: district.to_string(),
        postal_code: Some(pin.to_string()),
        age_5_17: 0,
        age_17_plus: count,
    }
}

fn run(
    enrolment: &[EnrolmentRow],
    biometric: &[BiometricRow],
    demographic: &[DemographicRow],
) -> ForensicReport {
    ForensicPipeline::new(ForensicConfig::default())
        .unwrap()
        .run(&ForensicInputs {
            enrolment,
            biometric,
            demographic,
        })
        .unwrap()
}

fn find<'a>(report: &'a ForensicReport, pin: &str, date: NaiveDate) -> &'a ScoredRecord {
    report
        .records
        .iter()
        .find(|r| r.record.location.postal_code.as_deref() == Some(pin) && r.record.date == date)
        .unwrap()
}

#[test]
fn single_day_spike_registers_temporal_deviation() {
    let enrolment: Vec<EnrolmentRow> = [10, 10, 10, 10, 10, 10, 10, 500]
        .iter()
        .enumerate()
        .map(|(i, &adult)| {
            enrol(day(i64::try_from(i).unwrap()), "Mysuru", "570001", [0, 0, adult])
        })
        .collect();

    let report = run(&enrolment, &[], &[]);
    assert_eq!(report.granularity, Granularity::Pincode);
    assert_eq!(report.records.len(), 8);

    for quiet in &report.records[..7] {
        assert!(
            quiet.scores.algo1_score < 0.1,
            "quiet day {} scored {}",
            quiet.record.date,
            quiet.scores.algo1_score
        );
    }

    // The spike sits inside its own short window, inflating the local std,
    // so the Grubbs flag stays off. The robust z and p99 step carry it.
    let spike = &report.records[7];
    assert!(spike.scores.algo1_score > 0.5, "{}", spike.scores.algo1_score);
    assert!(spike.scores.algo1_score > 5.0 * report.records[6].scores.algo1_score);
    assert!(spike.scores.algo3_score > 0.0);
}

#[test]
fn outlying_postal_code_is_a_spatial_anomaly() {
    let date = day(0);
    let mut enrolment = vec![enrol(date, "Udupi", "576100", [0, 0, 200])];
    for i in 1..=9 {
        enrolment.push(enrol(date, "Udupi", &format!("5761{i:02}"), [0, 0, 20]));
    }

    let report = run(&enrolment, &[], &[]);
    let target = find(&report, "576100", date);
    assert!(target.scores.algo2_score > 0.5, "{}", target.scores.algo2_score);

    for sibling in report
        .records
        .iter()
        .filter(|r| r.record.location.postal_code.as_deref() != Some("576100"))
    {
        assert!(sibling.scores.algo2_score < 0.2, "{}", sibling.scores.algo2_score);
    }
}

#[test]
fn adult_skewed_mix_scores_demographic_ratio_one() {
    let enrolment = vec![enrol(day(0), "Hassan", "573201", [1, 1, 50])];
    let report = run(&enrolment, &[], &[]);
    let r = &report.records[0];
    assert_eq!(r.record.total_enrollment, 52);
    assert!((r.scores.algo5_score - 1.0).abs() < f64::EPSILON);
}

#[test]
fn enrolment_without_updates_scores_cross_signal() {
    let enrolment = vec![enrol(day(0), "Mandya", "571401", [0, 0, 15])];
    let biometric = vec![bio(day(0), "Mandya", "571401", 1)];
    let report = run(&enrolment, &biometric, &[]);
    assert_eq!(report.records.len(), 1);
    assert!((report.records[0].scores.algo4_score - 0.8).abs() < f64::EPSILON);
}

#[test]
fn updates_missing_from_companion_tables_are_kept() {
    let enrolment = vec![
        enrol(day(0), "Kodagu", "571201", [0, 0, 40]),
        enrol(day(1), "Kodagu", "571201", [0, 0, 40]),
    ];
    let biometric = vec![bio(day(1), "Kodagu", "571201", 30)];
    let report = run(&enrolment, &biometric, &[]);

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.records[0].record.biometric_update_count, 0);
    assert!((report.records[0].scores.algo4_score - 0.8).abs() < f64::EPSILON);
    assert!(report.records[1].scores.algo4_score.abs() < f64::EPSILON);
}

#[test]
fn silent_location_scores_zero() {
    let enrolment = vec![
        enrol(day(0), "Bidar", "585401", [0, 0, 0]),
        enrol(day(0), "Bidar", "585402", [3, 4, 90]),
    ];
    let report = run(&enrolment, &[], &[]);
    let silent = find(&report, "585401", day(0));

    assert!(silent.record.adult_ratio.abs() < f64::EPSILON);
    assert!(silent.scores.as_array().iter().all(|s| s.abs() < f64::EPSILON));
    assert!(silent.risk.risk_score_norm.abs() < f64::EPSILON);
}

#[test]
fn rollup_averages_risk_and_keeps_peak_detectors() {
    let mut enrolment: Vec<EnrolmentRow> = (0..20)
        .map(|i| enrol(day(i), "Tumakuru", "572101", [5, 5, 10]))
        .collect();
    enrolment.push(enrol(day(20), "Tumakuru", "572101", [0, 0, 900]));

    let config = ForensicConfig::default();
    let pipeline = ForensicPipeline::new(config).unwrap();
    let (report, rollup) = pipeline
        .run_with_rollup(&ForensicInputs {
            enrolment: &enrolment,
            biometric: &[],
            demographic: &[],
        })
        .unwrap();

    assert_eq!(rollup.len(), 1);
    let row = &rollup[0];
    let spike = report.records.last().unwrap();
    assert_eq!(row.record_count, 21);
    assert_eq!(row.adult_enrollment, 20 * 10 + 900);
    assert!((row.scores.algo1_score - spike.scores.algo1_score).abs() < f64::EPSILON);
    assert!(row.risk_score_norm < spike.risk.risk_score_norm / 2.0);
}
