//! Location lookup seam.
//!
//! Location validation and coordinate lookup belong to a separate component;
//! the data service only sees [`LocationDirectory`].

use std::collections::BTreeMap;

use aerodash_cache::LocationKeyed;
use aerodash_sources::ReadingLocation;
use serde::{Deserialize, Serialize};

pub trait LocationDirectory: Send + Sync {
    fn validate(&self, country: &str, state: &str, district: &str) -> bool;

    /// Coordinates of a valid location; `None` when the location is unknown.
    fn coordinates_of(&self, country: &str, state: &str, district: &str) -> Option<(f64, f64)>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownLocation {
    pub country: String,
    pub state: String,
    pub district: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl KnownLocation {
    pub fn new(
        country: impl Into<String>,
        state: impl Into<String>,
        district: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            country: country.into(),
            state: state.into(),
            district: district.into(),
            latitude,
            longitude,
        }
    }

    fn matches(&self, country: &str, state: &str, district: &str) -> bool {
        self.country == country && self.state == state && self.district == district
    }
}

impl From<&KnownLocation> for ReadingLocation {
    fn from(location: &KnownLocation) -> Self {
        ReadingLocation::new(
            location.country.clone(),
            location.state.clone(),
            location.district.clone(),
            location.latitude,
            location.longitude,
        )
    }
}

impl LocationKeyed for KnownLocation {
    fn country(&self) -> Option<&str> {
        Some(&self.country)
    }
    fn state(&self) -> Option<&str> {
        Some(&self.state)
    }
    fn district(&self) -> Option<&str> {
        Some(&self.district)
    }
}

/// Fixed list of locations, matched exactly (case-sensitive).
#[derive(Debug, Clone, Default)]
pub struct StaticLocationDirectory {
    locations: Vec<KnownLocation>,
}

impl StaticLocationDirectory {
    pub fn new(locations: Vec<KnownLocation>) -> Self {
        Self { locations }
    }

    pub fn locations(&self) -> &[KnownLocation] {
        &self.locations
    }

    /// country → state → districts
    pub fn hierarchy(&self) -> BTreeMap<String, BTreeMap<String, Vec<String>>> {
        let mut tree: BTreeMap<String, BTreeMap<String, Vec<String>>> = BTreeMap::new();
        for location in &self.locations {
            let districts = tree
                .entry(location.country.clone())
                .or_default()
                .entry(location.state.clone())
                .or_default();
            if !districts.contains(&location.district) {
                districts.push(location.district.clone());
            }
        }
        tree
    }

    fn find(&self, country: &str, state: &str, district: &str) -> Option<&KnownLocation> {
        self.locations
            .iter()
            .find(|location| location.matches(country, state, district))
    }
}

impl LocationDirectory for StaticLocationDirectory {
    fn validate(&self, country: &str, state: &str, district: &str) -> bool {
        self.find(country, state, district).is_some()
    }

    fn coordinates_of(&self, country: &str, state: &str, district: &str) -> Option<(f64, f64)> {
        self.find(country, state, district)
            .map(|location| (location.latitude, location.longitude))
    }
}
