use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for official UBIGEO codes: exactly six digits
    /// (two for department, two for province, two for district)
    /// - Valid: "210501", "150101"
    /// - Invalid: "21050", "2105011", "21O501", " 210501"
    pub static ref UBIGEO_REGEX: Regex = Regex::new(r"^[0-9]{6}$").unwrap();
}

pub const LATITUDE_RANGE: std::ops::RangeInclusive<f64> = -90.0..=90.0;
pub const LONGITUDE_RANGE: std::ops::RangeInclusive<f64> = -180.0..=180.0;
