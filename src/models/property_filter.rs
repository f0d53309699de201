use serde::Deserialize;
use std::str::FromStr;
use validator::Validate;

use super::{Coordinates, Pagination, DEFAULT_LIMIT};
use crate::error::{AppError, AppResult};

/// Radius applied when a location is given without an explicit `radius`
pub const DEFAULT_RADIUS_KM: f64 = 10.0;

/// Raw query string of `GET /properties`
///
/// List-valued parameters arrive as comma separated strings and are only
/// interpreted by [`PropertyFilter::parse`].
#[derive(Debug, Clone, Deserialize)]
pub struct PropertyFilter {
    pub q: Option<String>,
    pub min_bed: Option<i32>,
    pub max_bed: Option<i32>,
    pub min_bath: Option<i32>,
    pub max_bath: Option<i32>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// `lat,lng`
    pub location: Option<String>,
    /// Kilometres around `location`
    pub radius: Option<f64>,
    pub is_verified: Option<bool>,
    #[serde(default = "default_is_enabled")]
    pub is_enabled: Option<bool>,
    pub categories: Option<String>,
    pub amenities: Option<String>,
    pub sort: Option<String>,
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_is_enabled() -> Option<bool> {
    Some(true)
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

/// A reference point with a search radius
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoRadius {
    pub origin: Coordinates,
    pub radius_km: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Price,
    NumBed,
    NumBath,
    CreatedAt,
    Distance,
    Relevance,
}

impl FromStr for SortField {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price" => Ok(SortField::Price),
            "num_bed" => Ok(SortField::NumBed),
            "num_bath" => Ok(SortField::NumBath),
            "created_at" => Ok(SortField::CreatedAt),
            "distance" => Ok(SortField::Distance),
            "relevance" => Ok(SortField::Relevance),
            other => Err(AppError::InvalidInput(format!(
                "Unknown sort key: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            descending: false,
        }
    }

    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            descending: true,
        }
    }
}

impl FromStr for SortKey {
    type Err = AppError;

    /// `price` sorts ascending, `-price` descending
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix('-') {
            Some(name) => Ok(SortKey::desc(name.parse()?)),
            None => Ok(SortKey::asc(s.parse()?)),
        }
    }
}

/// Validated, typed form of [`PropertyFilter`]
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyQuery {
    pub text: Option<String>,
    pub min_bed: Option<i32>,
    pub max_bed: Option<i32>,
    pub min_bath: Option<i32>,
    pub max_bath: Option<i32>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub near: Option<GeoRadius>,
    pub is_verified: Option<bool>,
    pub is_enabled: Option<bool>,
    pub categories: Vec<i32>,
    pub amenities: Vec<i32>,
    /// Never empty after parsing; defaults are resolved up front
    pub sort: Vec<SortKey>,
    pub page: Pagination,
}

impl Default for PropertyQuery {
    fn default() -> Self {
        Self {
            text: None,
            min_bed: None,
            max_bed: None,
            min_bath: None,
            max_bath: None,
            min_price: None,
            max_price: None,
            near: None,
            is_verified: None,
            is_enabled: Some(true),
            categories: Vec::new(),
            amenities: Vec::new(),
            sort: vec![SortKey::desc(SortField::CreatedAt)],
            page: Pagination::default(),
        }
    }
}

impl PropertyQuery {
    /// Default listing query with a custom window, used as the
    /// recommendation fallback
    pub fn paged(skip: i64, limit: i64) -> Self {
        Self {
            page: Pagination::new(skip, limit),
            ..Self::default()
        }
    }
}

impl PropertyFilter {
    pub fn parse(self) -> AppResult<PropertyQuery> {
        let text = self
            .q
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());

        check_range("bed", self.min_bed, self.max_bed)?;
        check_range("bath", self.min_bath, self.max_bath)?;
        check_range("price", self.min_price, self.max_price)?;

        let origin = self
            .location
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(parse_coordinates)
            .transpose()?;

        let near = match (origin, self.radius) {
            (Some(origin), radius) => {
                let radius_km = radius.unwrap_or(DEFAULT_RADIUS_KM);
                if !radius_km.is_finite() || radius_km <= 0.0 {
                    return Err(AppError::InvalidInput(
                        "radius must be a positive number of kilometres".to_string(),
                    ));
                }
                Some(GeoRadius { origin, radius_km })
            }
            (None, Some(_)) => {
                return Err(AppError::InvalidInput(
                    "radius requires a location".to_string(),
                ))
            }
            (None, None) => None,
        };

        let categories = self
            .categories
            .as_deref()
            .map(parse_id_list)
            .transpose()?
            .unwrap_or_default();
        let amenities = self
            .amenities
            .as_deref()
            .map(parse_id_list)
            .transpose()?
            .unwrap_or_default();

        let mut sort = match self.sort.as_deref() {
            Some(raw) => parse_sort(raw)?,
            None => Vec::new(),
        };
        for key in &sort {
            match key.field {
                SortField::Distance if near.is_none() => {
                    return Err(AppError::InvalidInput(
                        "Sorting by distance requires a location".to_string(),
                    ))
                }
                SortField::Relevance if text.is_none() => {
                    return Err(AppError::InvalidInput(
                        "Sorting by relevance requires a query string".to_string(),
                    ))
                }
                _ => {}
            }
        }
        if sort.is_empty() {
            sort.push(if text.is_some() {
                SortKey::desc(SortField::Relevance)
            } else if near.is_some() {
                SortKey::asc(SortField::Distance)
            } else {
                SortKey::desc(SortField::CreatedAt)
            });
        }

        Ok(PropertyQuery {
            text,
            min_bed: self.min_bed,
            max_bed: self.max_bed,
            min_bath: self.min_bath,
            max_bath: self.max_bath,
            min_price: self.min_price,
            max_price: self.max_price,
            near,
            is_verified: self.is_verified,
            is_enabled: self.is_enabled,
            categories,
            amenities,
            sort,
            page: Pagination::new(self.skip, self.limit),
        })
    }
}

fn check_range<T: PartialOrd>(name: &str, min: Option<T>, max: Option<T>) -> AppResult<()> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(AppError::InvalidInput(format!(
            "min_{name} cannot be greater than max_{name}"
        ))),
        _ => Ok(()),
    }
}

/// Splits a comma separated list, ignoring whitespace, brackets and empty
/// segments left by trailing commas
fn split_list(raw: &str) -> (String, Vec<String>) {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let values = compact
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    (compact, values)
}

/// Parses `"2, 5,12,"` into `[2, 5, 12]`
pub fn parse_id_list(raw: &str) -> AppResult<Vec<i32>> {
    let (compact, values) = split_list(raw);
    values
        .iter()
        .map(|v| {
            v.parse::<i32>().map_err(|_| {
                AppError::InvalidInput(format!(
                    "{} Must only contain comma separated integers",
                    compact
                ))
            })
        })
        .collect()
}

/// Parses `"lat,lng"` into validated coordinates
pub fn parse_coordinates(raw: &str) -> AppResult<Coordinates> {
    let (compact, values) = split_list(raw);
    let shape_error =
        || AppError::InvalidInput("Coordinates should be floats in the form lat,lng".to_string());

    if !compact.contains(',') {
        return Err(shape_error());
    }

    let numbers = values
        .iter()
        .map(|v| {
            v.parse::<f64>().map_err(|_| {
                AppError::InvalidInput(format!(
                    "{} Must only contain comma separated floats",
                    compact
                ))
            })
        })
        .collect::<AppResult<Vec<f64>>>()?;

    let [latitude, longitude] = numbers.as_slice() else {
        return Err(shape_error());
    };
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err(shape_error());
    }

    let coordinates = Coordinates {
        latitude: *latitude,
        longitude: *longitude,
    };
    coordinates.validate()?;
    Ok(coordinates)
}

/// Parses `"price,-created_at"` into ordered sort keys
pub fn parse_sort(raw: &str) -> AppResult<Vec<SortKey>> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(query: &str) -> PropertyFilter {
        let mut f: PropertyFilter = serde_json::from_value(serde_json::json!({})).unwrap();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap();
            let value = value.to_string();
            match key {
                "q" => f.q = Some(value),
                "location" => f.location = Some(value),
                "radius" => f.radius = Some(value.parse().unwrap()),
                "categories" => f.categories = Some(value),
                "amenities" => f.amenities = Some(value),
                "sort" => f.sort = Some(value),
                "min_price" => f.min_price = Some(value.parse().unwrap()),
                "max_price" => f.max_price = Some(value.parse().unwrap()),
                "limit" => f.limit = value.parse().unwrap(),
                other => panic!("unsupported key {other}"),
            }
        }
        f
    }

    #[test]
    fn test_parse_id_list_tolerates_spaces_and_trailing_commas() {
        assert_eq!(parse_id_list("2, 5,12,").unwrap(), vec![2, 5, 12]);
        assert_eq!(parse_id_list("7").unwrap(), vec![7]);
        assert_eq!(parse_id_list("[21, 15, 2]").unwrap(), vec![21, 15, 2]);
        assert_eq!(parse_id_list("").unwrap(), Vec::<i32>::new());
    }

    #[test]
    fn test_parse_id_list_rejects_non_integers() {
        let err = parse_id_list("1, two").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid input: 1,two Must only contain comma separated integers"
        );
    }

    #[test]
    fn test_parse_coordinates() {
        let coords = parse_coordinates(" -1.2921, 36.8219 ").unwrap();
        assert_eq!(coords.latitude, -1.2921);
        assert_eq!(coords.longitude, 36.8219);
        assert!(parse_coordinates("-1.29,36.82,").is_ok());
    }

    #[test]
    fn test_parse_coordinates_rejects_bad_shapes() {
        for raw in ["43.21", "1,2,3", "north,east", "91,10", "NaN,NaN"] {
            assert!(
                matches!(
                    parse_coordinates(raw),
                    Err(AppError::InvalidInput(_)) | Err(AppError::Validation(_))
                ),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_coordinates_rejects_non_finite() {
        for raw in ["NaN,NaN", "nan,10", "10,inf", "-infinity,0"] {
            let err = parse_coordinates(raw).unwrap_err();
            assert_eq!(
                err.to_string(),
                "Invalid input: Coordinates should be floats in the form lat,lng",
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_sort_keys() {
        let keys = parse_sort("price, -created_at,").unwrap();
        assert_eq!(
            keys,
            vec![
                SortKey::asc(SortField::Price),
                SortKey::desc(SortField::CreatedAt)
            ]
        );
        assert!(parse_sort("cheapest").is_err());
    }

    #[test]
    fn test_default_sort_depends_on_query() {
        let plain = filter("").parse().unwrap();
        assert_eq!(plain.sort, vec![SortKey::desc(SortField::CreatedAt)]);
        assert_eq!(plain.is_enabled, Some(true));

        let text = filter("q=garden").parse().unwrap();
        assert_eq!(text.sort, vec![SortKey::desc(SortField::Relevance)]);

        let geo = filter("location=-1.29,36.82").parse().unwrap();
        assert_eq!(geo.sort, vec![SortKey::asc(SortField::Distance)]);
        assert_eq!(geo.near.unwrap().radius_km, DEFAULT_RADIUS_KM);
    }

    #[test]
    fn test_blank_text_is_ignored() {
        let query = filter("q=   ").parse().unwrap();
        assert_eq!(query.text, None);
    }

    #[test]
    fn test_distance_sort_requires_location() {
        assert!(filter("sort=distance").parse().is_err());
        assert!(filter("sort=-relevance").parse().is_err());
        assert!(filter("location=1,2&sort=-distance").parse().is_ok());
    }

    #[test]
    fn test_radius_rules() {
        assert!(filter("radius=5").parse().is_err());
        assert!(filter("location=1,2&radius=0").parse().is_err());
        let query = filter("location=1,2&radius=2.5").parse().unwrap();
        assert_eq!(query.near.unwrap().radius_km, 2.5);
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        assert!(filter("min_price=500&max_price=100").parse().is_err());
        assert!(filter("min_price=100&max_price=100").parse().is_ok());
    }

    #[test]
    fn test_lists_and_limit_are_parsed() {
        let query = filter("categories=1,2&amenities=3&limit=1000").parse().unwrap();
        assert_eq!(query.categories, vec![1, 2]);
        assert_eq!(query.amenities, vec![3]);
        assert_eq!(query.page.limit, 100);
    }
}
