use crate::types::Facility;

/// Fill color for areas an attribute join left empty.
pub const NO_DATA_COLOR: &str = "#d9d9d9";

/// Marker palette for system-affiliation categories, assigned in order of
/// first appearance and wrapping if the feed has more networks than colors.
pub const SYSTEM_PALETTE: [&str; 8] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
];

/// Ordered income brackets with fixed dollar breakpoints. Brackets are
/// half-open `[lo, hi)`: an income of exactly 50_000 falls in `From50To75K`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IncomeBracket {
    Under25K,
    From25To50K,
    From50To75K,
    From75To100K,
    From100To150K,
    Over150K,
}

impl IncomeBracket {
    pub const ALL: [IncomeBracket; 6] = [
        IncomeBracket::Under25K,
        IncomeBracket::From25To50K,
        IncomeBracket::From50To75K,
        IncomeBracket::From75To100K,
        IncomeBracket::From100To150K,
        IncomeBracket::Over150K,
    ];

    pub fn from_income(income: f64) -> Self {
        if income < 25_000.0 {
            Self::Under25K
        } else if income < 50_000.0 {
            Self::From25To50K
        } else if income < 75_000.0 {
            Self::From50To75K
        } else if income < 100_000.0 {
            Self::From75To100K
        } else if income < 150_000.0 {
            Self::From100To150K
        } else {
            Self::Over150K
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Under25K => "Under $25K",
            Self::From25To50K => "$25-50K",
            Self::From50To75K => "$50-75K",
            Self::From75To100K => "$75-100K",
            Self::From100To150K => "$100-150K",
            Self::Over150K => "$150K+",
        }
    }

    /// YlOrRd ramp, light to dark.
    pub fn color(&self) -> &'static str {
        match self {
            Self::Under25K => "#ffffb2",
            Self::From25To50K => "#fed976",
            Self::From50To75K => "#feb24c",
            Self::From75To100K => "#fd8d3c",
            Self::From100To150K => "#f03b20",
            Self::Over150K => "#bd0026",
        }
    }
}

/// Ordered broadband-adoption brackets (percent of households), same
/// half-open `[lo, hi)` rule as the income brackets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BroadbandBracket {
    Under60,
    From60To70,
    From70To80,
    From80To90,
    Over90,
}

impl BroadbandBracket {
    pub const ALL: [BroadbandBracket; 5] = [
        BroadbandBracket::Under60,
        BroadbandBracket::From60To70,
        BroadbandBracket::From70To80,
        BroadbandBracket::From80To90,
        BroadbandBracket::Over90,
    ];

    pub fn from_pct(pct: f64) -> Self {
        if pct < 60.0 {
            Self::Under60
        } else if pct < 70.0 {
            Self::From60To70
        } else if pct < 80.0 {
            Self::From70To80
        } else if pct < 90.0 {
            Self::From80To90
        } else {
            Self::Over90
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Under60 => "Under 60%",
            Self::From60To70 => "60-70%",
            Self::From70To80 => "70-80%",
            Self::From80To90 => "80-90%",
            Self::Over90 => "90%+",
        }
    }

    /// YlGnBu ramp, light to dark.
    pub fn color(&self) -> &'static str {
        match self {
            Self::Under60 => "#ffffcc",
            Self::From60To70 => "#a1dab4",
            Self::From70To80 => "#41b6c4",
            Self::From80To90 => "#2c7fb8",
            Self::Over90 => "#253494",
        }
    }
}

/// Category-to-color table for the system-affiliation labels, in order of
/// first appearance so runs over the same feed stay stable.
pub fn system_color_table(facilities: &[Facility]) -> Vec<(String, &'static str)> {
    let mut table: Vec<(String, &'static str)> = Vec::new();
    for facility in facilities {
        if !table.iter().any(|(system, _)| system == &facility.system) {
            let color = SYSTEM_PALETTE[table.len() % SYSTEM_PALETTE.len()];
            table.push((facility.system.clone(), color));
        }
    }
    table
}

/// The coordinate extent the cleaning thresholds were originally derived
/// from: eyeball these numbers before trusting a new pull of the feed.
pub fn print_summary(facilities: &[Facility]) {
    if facilities.is_empty() {
        println!("No facilities retained.");
        return;
    }

    let mut min_lat = f64::INFINITY;
    let mut max_lat = f64::NEG_INFINITY;
    let mut min_lon = f64::INFINITY;
    let mut max_lon = f64::NEG_INFINITY;
    for facility in facilities {
        min_lat = min_lat.min(facility.location.y());
        max_lat = max_lat.max(facility.location.y());
        min_lon = min_lon.min(facility.location.x());
        max_lon = max_lon.max(facility.location.x());
    }

    println!(
        "{} facilities, latitude [{:.4}, {:.4}], longitude [{:.4}, {:.4}]",
        facilities.len(),
        min_lat,
        max_lat,
        min_lon,
        max_lon
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    #[test]
    fn income_breakpoints_are_left_inclusive() {
        assert_eq!(IncomeBracket::from_income(50_000.0).label(), "$50-75K");
        assert_eq!(IncomeBracket::from_income(49_999.99).label(), "$25-50K");
        assert_eq!(IncomeBracket::from_income(25_000.0).label(), "$25-50K");
        assert_eq!(IncomeBracket::from_income(24_999.0).label(), "Under $25K");
        assert_eq!(IncomeBracket::from_income(0.0).label(), "Under $25K");
        assert_eq!(IncomeBracket::from_income(150_000.0).label(), "$150K+");
        assert_eq!(IncomeBracket::from_income(149_999.0).label(), "$100-150K");
    }

    #[test]
    fn broadband_breakpoints_are_left_inclusive() {
        assert_eq!(BroadbandBracket::from_pct(60.0).label(), "60-70%");
        assert_eq!(BroadbandBracket::from_pct(59.9).label(), "Under 60%");
        assert_eq!(BroadbandBracket::from_pct(90.0).label(), "90%+");
        assert_eq!(BroadbandBracket::from_pct(79.9).label(), "70-80%");
    }

    #[test]
    fn brackets_are_ordered() {
        let mut sorted = IncomeBracket::ALL;
        sorted.sort();
        assert_eq!(sorted, IncomeBracket::ALL);
    }

    #[test]
    fn system_colors_are_stable_and_distinct() {
        let facility = |system: &str| Facility {
            name: "f".to_string(),
            address: String::new(),
            borough: String::new(),
            system: system.to_string(),
            location: Point::new(-73.98, 40.75),
        };
        let facilities = vec![
            facility("Alpha Health"),
            facility("Beta Medical"),
            facility("Alpha Health"),
        ];

        let table = system_color_table(&facilities);
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].0, "Alpha Health");
        assert_eq!(table[1].0, "Beta Medical");
        assert_ne!(table[0].1, table[1].1);
    }
}
