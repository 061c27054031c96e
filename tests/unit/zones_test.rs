//! Unit tests for heart rate zone classification.

use enduro::metrics::zones::{
    DeviationDirection, DeviationSeverity, HeartRateZone, ZoneClassifier, ZoneDistribution,
    ZoneScheme, DEFAULT_ZONE_BOUNDARIES,
};

#[test]
fn test_default_scheme_boundaries() {
    let scheme = ZoneScheme::default();

    assert_eq!(scheme.ranges().len(), 5);
    assert_eq!(scheme.range(HeartRateZone::Z1).min_percent, 50.0);
    assert_eq!(scheme.range(HeartRateZone::Z3).min_percent, 70.0);
    assert_eq!(scheme.range(HeartRateZone::Z5).max_percent, 100.0);
}

#[test]
fn test_classify_percent_of_max() {
    let classifier = ZoneClassifier::default();

    assert_eq!(classifier.classify(55.0), HeartRateZone::Z1);
    assert_eq!(classifier.classify(65.0), HeartRateZone::Z2);
    assert_eq!(classifier.classify(75.0), HeartRateZone::Z3);
    assert_eq!(classifier.classify(85.0), HeartRateZone::Z4);
    assert_eq!(classifier.classify(95.0), HeartRateZone::Z5);
}

#[test]
fn test_classify_boundaries_belong_to_upper_zone() {
    let classifier = ZoneClassifier::default();

    assert_eq!(classifier.classify(60.0), HeartRateZone::Z2);
    assert_eq!(classifier.classify(90.0), HeartRateZone::Z5);
}

#[test]
fn test_classify_out_of_band() {
    let classifier = ZoneClassifier::default();

    // Below the lowest boundary clamps to Z1, above the top to Z5
    assert_eq!(classifier.classify(30.0), HeartRateZone::Z1);
    assert_eq!(classifier.classify(100.0), HeartRateZone::Z5);
    assert_eq!(classifier.classify(120.0), HeartRateZone::Z5);
    assert_eq!(classifier.classify(f64::NAN), HeartRateZone::Z1);
}

#[test]
fn test_classify_bpm() {
    let classifier = ZoneClassifier::default();

    // 150 / 190 = 78.9%
    assert_eq!(classifier.classify_bpm(150, 190), HeartRateZone::Z3);
    assert_eq!(classifier.classify_bpm(150, 0), HeartRateZone::Z1);
}

#[test]
fn test_custom_scheme() {
    let scheme = ZoneScheme::from_boundaries([55.0, 72.0, 80.0, 87.0, 93.0, 100.0]).unwrap();
    let classifier = ZoneClassifier::new(scheme);

    assert_eq!(classifier.classify(75.0), HeartRateZone::Z3);
    assert_eq!(classifier.classify(70.0), HeartRateZone::Z1);
}

#[test]
fn test_boundary_belongs_to_upper_zone() {
    let scheme = ZoneScheme::from_boundaries([50.0, 70.0, 80.0, 87.0, 93.0, 100.0]).unwrap();
    let classifier = ZoneClassifier::new(scheme);

    assert_eq!(classifier.classify(69.0), HeartRateZone::Z1);
    assert_eq!(classifier.classify(70.0), HeartRateZone::Z2);
    assert_eq!(classifier.classify(20.0), HeartRateZone::Z1);
    assert_eq!(classifier.classify(140.0), HeartRateZone::Z5);
}

#[test]
fn test_unordered_boundaries_rejected() {
    assert!(ZoneScheme::from_boundaries([50.0, 60.0, 60.0, 80.0, 90.0, 100.0]).is_err());
    assert!(ZoneScheme::from_boundaries(DEFAULT_ZONE_BOUNDARIES).is_ok());
}

#[test]
fn test_deviation_severity() {
    use HeartRateZone::*;

    assert_eq!(ZoneClassifier::deviation_severity(Z3, Z3), DeviationSeverity::None);
    assert_eq!(ZoneClassifier::deviation_severity(Z4, Z3), DeviationSeverity::Mild);
    assert_eq!(ZoneClassifier::deviation_severity(Z2, Z3), DeviationSeverity::Mild);
    assert_eq!(ZoneClassifier::deviation_severity(Z5, Z3), DeviationSeverity::High);
    assert_eq!(ZoneClassifier::deviation_severity(Z1, Z4), DeviationSeverity::High);
}

#[test]
fn test_deviation_direction() {
    let above = ZoneClassifier::deviation(HeartRateZone::Z4, HeartRateZone::Z2);
    assert_eq!(above.direction, DeviationDirection::Above);
    assert_eq!(above.severity, DeviationSeverity::High);

    let below = ZoneClassifier::deviation(HeartRateZone::Z1, HeartRateZone::Z2);
    assert_eq!(below.direction, DeviationDirection::Below);
}

#[test]
fn test_parse_symbolic_targets() {
    assert_eq!(HeartRateZone::parse_primary("Z2"), Some(HeartRateZone::Z2));
    assert_eq!(HeartRateZone::parse_primary("z3-z4"), Some(HeartRateZone::Z3));
    assert_eq!(HeartRateZone::parse_primary("Zone Z5"), Some(HeartRateZone::Z5));
    assert_eq!(HeartRateZone::parse_primary("easy"), None);
    assert_eq!("Z4".parse::<HeartRateZone>().unwrap(), HeartRateZone::Z4);
}

#[test]
fn test_zone_colors_are_hex() {
    assert_eq!(HeartRateZone::Z1.color().to_hex().len(), 7);
    assert!(HeartRateZone::Z5.color().to_hex().starts_with('#'));
}

#[test]
fn test_distribution_percentages() {
    let mut distribution = ZoneDistribution::default();
    distribution.add(HeartRateZone::Z2, 300);
    distribution.add(HeartRateZone::Z3, 600);
    distribution.add(HeartRateZone::Z1, 300);

    assert_eq!(distribution.total_seconds(), 1200);
    assert_eq!(distribution.percentages(), [25, 25, 50, 0, 0]);
    assert_eq!(ZoneDistribution::default().percentages(), [0; 5]);
}

#[test]
fn test_distribution_serializes_by_label() {
    let mut distribution = ZoneDistribution::default();
    distribution.add(HeartRateZone::Z4, 90);

    let json = serde_json::to_value(distribution).unwrap();
    assert_eq!(json["Z4"], 90);
    assert_eq!(json["Z1"], 0);

    let back: ZoneDistribution = serde_json::from_value(json).unwrap();
    assert_eq!(back, distribution);
}
