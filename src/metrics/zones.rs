//! Heart rate zone classification.
//!
//! Zones are expressed as half-open `[min, max)` ranges of maximum heart rate.
//! Boundary values belong to the upper zone; readings outside the scheme clamp
//! to Z1 or Z5.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// RGB color representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Hex string, e.g. `#3B82F6`.
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Ordered heart rate intensity zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HeartRateZone {
    Z1,
    Z2,
    Z3,
    Z4,
    Z5,
}

impl HeartRateZone {
    /// All zones, lowest intensity first.
    pub const ALL: [HeartRateZone; 5] = [
        HeartRateZone::Z1,
        HeartRateZone::Z2,
        HeartRateZone::Z3,
        HeartRateZone::Z4,
        HeartRateZone::Z5,
    ];

    /// Zero-based position in the zone order.
    pub fn index(self) -> usize {
        match self {
            HeartRateZone::Z1 => 0,
            HeartRateZone::Z2 => 1,
            HeartRateZone::Z3 => 2,
            HeartRateZone::Z4 => 3,
            HeartRateZone::Z5 => 4,
        }
    }

    /// Zone at a zero-based position, clamped to Z5.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    /// Short label (`"Z1"`..`"Z5"`).
    pub fn label(self) -> &'static str {
        match self {
            HeartRateZone::Z1 => "Z1",
            HeartRateZone::Z2 => "Z2",
            HeartRateZone::Z3 => "Z3",
            HeartRateZone::Z4 => "Z4",
            HeartRateZone::Z5 => "Z5",
        }
    }

    /// Identity color token.
    pub fn color(self) -> Color {
        HR_ZONE_COLORS[self.index()]
    }

    /// Extract the primary zone from a symbolic target such as `"Z2"`,
    /// `"z3"` or `"Z3-Z4"` (first zone wins).
    pub fn parse_primary(target: &str) -> Option<Self> {
        let bytes = target.as_bytes();
        bytes.windows(2).find_map(|pair| {
            if pair[0].eq_ignore_ascii_case(&b'z') && (b'1'..=b'5').contains(&pair[1]) {
                Some(Self::from_index((pair[1] - b'1') as usize))
            } else {
                None
            }
        })
    }
}

impl fmt::Display for HeartRateZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for HeartRateZone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_primary(s).ok_or_else(|| format!("Unknown heart rate zone: {}", s))
    }
}

/// A heart rate zone range in percent of maximum heart rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRange {
    /// Zone this range describes
    pub zone: HeartRateZone,
    /// Inclusive lower bound (% of max HR)
    pub min_percent: f64,
    /// Exclusive upper bound (% of max HR)
    pub max_percent: f64,
    /// Display color
    pub color: Color,
    /// Zone name
    pub name: String,
}

impl ZoneRange {
    /// Whether a percentage falls inside `[min, max)`.
    pub fn contains(&self, percent: f64) -> bool {
        percent >= self.min_percent && percent < self.max_percent
    }
}

/// Five ordered zone ranges covering a contiguous band of max HR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneScheme {
    ranges: Vec<ZoneRange>,
}

impl ZoneScheme {
    /// Build a scheme from six ascending boundaries
    /// (`[z1_min, z2_min, z3_min, z4_min, z5_min, z5_max]`).
    pub fn from_boundaries(bounds: [f64; 6]) -> Result<Self, String> {
        if bounds.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(format!(
                "Zone boundaries must be strictly ascending: {:?}",
                bounds
            ));
        }

        let ranges = HeartRateZone::ALL
            .iter()
            .enumerate()
            .map(|(i, zone)| ZoneRange {
                zone: *zone,
                min_percent: bounds[i],
                max_percent: bounds[i + 1],
                color: zone.color(),
                name: HR_ZONE_NAMES[i].to_string(),
            })
            .collect();

        Ok(Self { ranges })
    }

    /// Get the range for a zone.
    pub fn range(&self, zone: HeartRateZone) -> &ZoneRange {
        &self.ranges[zone.index()]
    }

    /// All ranges, Z1 first.
    pub fn ranges(&self) -> &[ZoneRange] {
        &self.ranges
    }
}

impl Default for ZoneScheme {
    /// Z1 50-60, Z2 60-70, Z3 70-80, Z4 80-90, Z5 90-100 % of max HR.
    fn default() -> Self {
        Self::from_boundaries(DEFAULT_ZONE_BOUNDARIES)
            .unwrap_or_else(|_| unreachable!("default boundaries are ascending"))
    }
}

/// How far a reading is from its target zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviationSeverity {
    /// Same zone
    None,
    /// One zone apart
    Mild,
    /// Two or more zones apart
    High,
}

/// Direction of a deviation relative to the target zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviationDirection {
    OnTarget,
    Above,
    Below,
}

/// Deviation of a current zone from a target zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDeviation {
    pub current: HeartRateZone,
    pub target: HeartRateZone,
    pub severity: DeviationSeverity,
    pub direction: DeviationDirection,
}

/// Maps heart rate intensity to zones. Pure, no side effects.
#[derive(Debug, Clone, Default)]
pub struct ZoneClassifier {
    scheme: ZoneScheme,
}

impl ZoneClassifier {
    /// Create a classifier over a zone scheme.
    pub fn new(scheme: ZoneScheme) -> Self {
        Self { scheme }
    }

    /// The scheme in use.
    pub fn scheme(&self) -> &ZoneScheme {
        &self.scheme
    }

    /// Classify a percentage of max heart rate.
    pub fn classify(&self, percent_of_max: f64) -> HeartRateZone {
        let ranges = self.scheme.ranges();

        if percent_of_max.is_nan() || percent_of_max < ranges[0].min_percent {
            return HeartRateZone::Z1;
        }

        ranges
            .iter()
            .find(|r| r.contains(percent_of_max))
            .map(|r| r.zone)
            .unwrap_or(HeartRateZone::Z5)
    }

    /// Classify an absolute heart rate against a maximum heart rate.
    pub fn classify_bpm(&self, bpm: u16, max_hr: u16) -> HeartRateZone {
        if max_hr == 0 {
            return HeartRateZone::Z1;
        }
        self.classify(bpm as f64 / max_hr as f64 * 100.0)
    }

    /// Severity by zone-index distance.
    pub fn deviation_severity(current: HeartRateZone, target: HeartRateZone) -> DeviationSeverity {
        match current.index().abs_diff(target.index()) {
            0 => DeviationSeverity::None,
            1 => DeviationSeverity::Mild,
            _ => DeviationSeverity::High,
        }
    }

    /// Full deviation report including direction.
    pub fn deviation(current: HeartRateZone, target: HeartRateZone) -> ZoneDeviation {
        let direction = match current.cmp(&target) {
            std::cmp::Ordering::Equal => DeviationDirection::OnTarget,
            std::cmp::Ordering::Greater => DeviationDirection::Above,
            std::cmp::Ordering::Less => DeviationDirection::Below,
        };

        ZoneDeviation {
            current,
            target,
            severity: Self::deviation_severity(current, target),
            direction,
        }
    }
}

/// Seconds accumulated per zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ZoneDistribution {
    seconds: [u32; 5],
}

impl ZoneDistribution {
    /// Credit seconds to a zone.
    pub fn add(&mut self, zone: HeartRateZone, seconds: u32) {
        self.seconds[zone.index()] += seconds;
    }

    /// Seconds spent in a zone.
    pub fn seconds(&self, zone: HeartRateZone) -> u32 {
        self.seconds[zone.index()]
    }

    /// Total seconds across all zones.
    pub fn total_seconds(&self) -> u32 {
        self.seconds.iter().sum()
    }

    /// Rounded percentage of time per zone. All zero when empty.
    pub fn percentages(&self) -> [u32; 5] {
        let total = self.total_seconds();
        if total == 0 {
            return [0; 5];
        }
        self.seconds
            .map(|s| ((s as f64 / total as f64) * 100.0).round() as u32)
    }
}

impl Serialize for ZoneDistribution {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(5))?;
        for zone in HeartRateZone::ALL {
            map.serialize_entry(zone.label(), &self.seconds(zone))?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ZoneDistribution {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = std::collections::BTreeMap::<String, u32>::deserialize(deserializer)?;
        let mut distribution = ZoneDistribution::default();
        for (label, seconds) in raw {
            let zone = HeartRateZone::parse_primary(&label)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown zone {}", label)))?;
            distribution.add(zone, seconds);
        }
        Ok(distribution)
    }
}

/// Default zone boundaries in percent of max HR.
pub const DEFAULT_ZONE_BOUNDARIES: [f64; 6] = [50.0, 60.0, 70.0, 80.0, 90.0, 100.0];

const HR_ZONE_NAMES: [&str; 5] = ["Recovery", "Endurance", "Tempo", "Threshold", "VO2max"];

/// Default heart rate zone colors
pub const HR_ZONE_COLORS: [Color; 5] = [
    Color::new(16, 185, 129),  // Z1: Green (Recovery)
    Color::new(59, 130, 246),  // Z2: Blue (Endurance)
    Color::new(245, 158, 11),  // Z3: Orange (Tempo)
    Color::new(239, 68, 68),   // Z4: Red (Threshold)
    Color::new(220, 38, 38),   // Z5: Dark red (VO2max)
];
