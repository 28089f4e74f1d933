use std::fmt;

const MAX_SUGGESTIONS: usize = 10;
const PREVIEW_LEN: usize = 20;

/// Australian weather stations in the dataset, with coordinates. Order is
/// kept stable; the "available cities" preview lists the first entries.
pub const STATIONS: &[(&str, f64, f64)] = &[
    ("Albury", -36.0806, 146.9158),
    ("Brisbane", -27.4678, 153.0281),
    ("Cairns", -16.92, 145.78),
    ("Canberra", -35.2931, 149.1269),
    ("Hobart", -42.8806, 147.325),
    ("Launceston", -41.4419, 147.145),
    ("Melbourne", -37.8142, 144.9631),
    ("Newcastle", -32.9167, 151.75),
    ("Perth", -31.9559, 115.8606),
    ("Sydney", -33.8678, 151.21),
    ("Adelaide", -34.9275, 138.6),
    ("Darwin", -12.4381, 130.8411),
    ("Townsville", -19.25, 146.8167),
    ("Ballarat", -37.5608, 143.8475),
    ("Bendigo", -36.75, 144.2667),
    ("Penrith", -33.7511, 150.6942),
    ("BadgerysCreek", -33.7511, 150.6942),
    ("Cobar", -31.4997, 145.8319),
    ("Moree", -29.4658, 149.8339),
    ("NorahHead", -33.3, 151.2),
    ("Richmond", -33.6, 150.75),
    ("SydneyAirport", -33.8678, 151.21),
    ("WaggaWagga", -35.1189, 147.3689),
    ("Williamtown", -32.9167, 151.75),
    ("Wollongong", -34.4331, 150.8831),
    ("Tuggeranong", -35.2931, 149.1269),
    ("MountGinini", -35.2931, 149.1269),
    ("MelbourneAirport", -37.8142, 144.9631),
    ("Watsonia", -37.8142, 144.9631),
    ("GoldCoast", -28.0167, 153.4),
    ("MountGambier", -37.8294, 140.7828),
    ("Nuriootpa", -34.4667, 138.9833),
    ("PearceRAAF", -31.9559, 115.8606),
    ("PerthAirport", -31.9559, 115.8606),
    ("NorfolkIsland", -29.0278, 167.9486),
    ("Nhil", -36.2135, 141.933),
    ("Dartmoor", -37.99, 141.46),
    ("Woomera", -31.1667, 136.8167),
    ("Witchcliffe", -34.0532, 115.1583),
    ("SalmonGums", -32.0481, 121.9393),
    ("AliceSprings", -23.698, 133.8807),
    ("Uluru", -25.3444, 131.0369),
    ("CoffsHarbour", -30.2963, 153.1133),
    ("Sale", -38.108, 147.0663),
    ("Mildura", -34.185, 142.1629),
    ("Portland", -38.345, 141.6058),
    ("Albany", -35.0247, 117.884),
    ("Walpole", -34.9553, 116.7374),
    ("Katherine", -14.4658, 132.263),
];

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found {
        name: &'static str,
        latitude: f64,
        longitude: f64,
    },
    Suggestions {
        query: String,
        names: Vec<&'static str>,
    },
    NotFound {
        query: String,
        preview: Vec<&'static str>,
        remaining: usize,
    },
}

/// Case-insensitive exact match, then substring suggestions, then a preview
/// of what is available.
pub fn lookup_location(city: &str) -> LookupOutcome {
    let query = city.trim().to_lowercase();

    if let Some((name, lat, lon)) = STATIONS.iter().find(|(n, _, _)| n.to_lowercase() == query) {
        return LookupOutcome::Found {
            name,
            latitude: *lat,
            longitude: *lon,
        };
    }

    let names: Vec<&'static str> = STATIONS
        .iter()
        .map(|(n, _, _)| *n)
        .filter(|n| n.to_lowercase().contains(&query))
        .take(MAX_SUGGESTIONS)
        .collect();
    if !names.is_empty() {
        return LookupOutcome::Suggestions {
            query: city.to_string(),
            names,
        };
    }

    LookupOutcome::NotFound {
        query: city.to_string(),
        preview: STATIONS.iter().take(PREVIEW_LEN).map(|(n, _, _)| *n).collect(),
        remaining: STATIONS.len().saturating_sub(PREVIEW_LEN),
    }
}

impl fmt::Display for LookupOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupOutcome::Found {
                name,
                latitude,
                longitude,
            } => write!(
                f,
                "Location found: {} at coordinates (Latitude: {:.4}, Longitude: {:.4})",
                name, latitude, longitude
            ),
            LookupOutcome::Suggestions { query, names } => write!(
                f,
                "Location '{}' not found. Did you mean one of these? {}",
                query,
                names.join(", ")
            ),
            LookupOutcome::NotFound {
                query,
                preview,
                remaining,
            } => {
                write!(
                    f,
                    "Location '{}' not found. Available cities include: {}",
                    query,
                    preview.join(", ")
                )?;
                if *remaining > 0 {
                    write!(f, "... (and {} more)", remaining)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let lower = lookup_location("sydney").to_string();
        assert_eq!(lower, lookup_location("SYDNEY").to_string());
        assert_eq!(
            lower,
            "Location found: Sydney at coordinates (Latitude: -33.8678, Longitude: 151.2100)"
        );
    }

    #[test]
    fn substring_suggestions_keep_table_order() {
        match lookup_location("perth") {
            LookupOutcome::Found { name, .. } => assert_eq!(name, "Perth"),
            other => panic!("unexpected {:?}", other),
        }
        match lookup_location("airport") {
            LookupOutcome::Suggestions { names, .. } => {
                assert_eq!(names, vec!["SydneyAirport", "MelbourneAirport", "PerthAirport"])
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn suggestions_are_capped() {
        // "a" appears in far more than ten names
        match lookup_location("a") {
            LookupOutcome::Suggestions { names, .. } => assert_eq!(names.len(), MAX_SUGGESTIONS),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_city_previews_with_remaining_count() {
        let text = lookup_location("Atlantis").to_string();
        assert!(text.starts_with("Location 'Atlantis' not found. Available cities include: Albury, Brisbane"));
        assert!(text.ends_with("(and 29 more)"));
    }
}
