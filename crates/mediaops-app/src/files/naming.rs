//! Filename conventions shared by the localisation tools.
//!
//! Exports are named `{vid_name}_{CC}.{ext}` or `{vid_name}_social_{CC}.{ext}`
//! and live under `{project}/Exports/…` where `project == vid_name`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// Localised markets, one channel and one folder each.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumString,
    AsRefStr,
    Display,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum Country {
    AR,
    AU,
    BR,
    DE,
    FR,
    IT,
    MX,
    NL,
    PL,
    QC,
    RU,
    UK,
}

impl Country {
    /// Lower-case code, as used for folder names and config keys.
    pub fn code(self) -> String {
        self.as_ref().to_lowercase()
    }
}

/// Country whose code ends `stem`, ignoring case.
pub fn country_suffix(stem: &str) -> Option<Country> {
    let lower = stem.to_lowercase();
    Country::iter().find(|country| lower.ends_with(&country.code()))
}

/// Parsed `{vid_name}[_social]_{CC}` export file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportName {
    pub file_name: String,
    pub vid_name: String,
    /// Country segment as written in the file name.
    pub country: String,
    pub social: bool,
}

impl ExportName {
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = Path::new(file_name).file_stem()?.to_str()?;
        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() < 2 {
            return None;
        }
        let country = parts[parts.len() - 1];
        let social = parts.len() >= 3 && parts[parts.len() - 2].eq_ignore_ascii_case("social");
        let name_parts = if social {
            &parts[..parts.len() - 2]
        } else {
            &parts[..parts.len() - 1]
        };
        Some(Self {
            file_name: file_name.to_string(),
            vid_name: name_parts.join("_"),
            country: country.to_string(),
            social,
        })
    }

    pub fn country(&self) -> Option<Country> {
        self.country.parse().ok()
    }
}

/// Project directory name for a master-list title: drops `, : ' ? ( )` and
/// turns dashes and spaces into underscores.
pub fn sheet_key(title: &str) -> String {
    title
        .chars()
        .filter(|c| !matches!(c, ',' | ':' | '\'' | '?' | '(' | ')'))
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

/// Looser variant used when matching archive rows: only `,` and `:` dropped.
pub fn archive_key(title: &str) -> String {
    title
        .chars()
        .filter(|c| !matches!(c, ',' | ':'))
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StillKind {
    Hd,
    Raw,
    Square,
}

impl StillKind {
    /// Kind from the last `_` segment of a still's stem.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let stem = Path::new(file_name).file_stem()?.to_str()?.to_lowercase();
        match stem.rsplit('_').next()? {
            "hd" => Some(Self::Hd),
            "raw" => Some(Self::Raw),
            "square" | "250" | "960" => Some(Self::Square),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countries_parse_case_insensitively() {
        assert_eq!("uk".parse::<Country>().unwrap(), Country::UK);
        assert_eq!("Qc".parse::<Country>().unwrap(), Country::QC);
        assert!("us".parse::<Country>().is_err());
        assert_eq!(Country::DE.code(), "de");
        assert_eq!(Country::DE.to_string(), "DE");
    }

    #[test]
    fn suffix_detection_ignores_case() {
        assert_eq!(country_suffix("Hot_cross_buns_uk"), Some(Country::UK));
        assert_eq!(country_suffix("Hot_cross_buns_BR"), Some(Country::BR));
        assert_eq!(country_suffix("Hot_cross_buns"), None);
    }

    #[test]
    fn export_names_split_social_flag() {
        let plain = ExportName::parse("Hot_cross_buns_UK.webm").unwrap();
        assert_eq!(plain.vid_name, "Hot_cross_buns");
        assert_eq!(plain.country(), Some(Country::UK));
        assert!(!plain.social);

        let social = ExportName::parse("Hot_cross_buns_social_DE.mp4").unwrap();
        assert_eq!(social.vid_name, "Hot_cross_buns");
        assert_eq!(social.country, "DE");
        assert!(social.social);

        assert!(ExportName::parse("README").is_none());
    }

    #[test]
    fn keys_normalise_punctuation() {
        assert_eq!(sheet_key("Mom's Apple Pie (Easy)"), "Moms_Apple_Pie_Easy");
        assert_eq!(sheet_key("Slow-Cooker Chili: Best?"), "Slow_Cooker_Chili_Best");
        assert_eq!(archive_key("Mom's Pie, Slow-Cooked: Yes"), "Mom's_Pie_Slow_Cooked_Yes");
    }

    #[test]
    fn still_kinds_come_from_last_segment() {
        assert_eq!(StillKind::from_file_name("Pie_HD.jpg"), Some(StillKind::Hd));
        assert_eq!(StillKind::from_file_name("Pie_raw.png"), Some(StillKind::Raw));
        assert_eq!(StillKind::from_file_name("Pie_960.jpg"), Some(StillKind::Square));
        assert_eq!(StillKind::from_file_name("Pie_250.jpg"), Some(StillKind::Square));
        assert_eq!(StillKind::from_file_name("Pie_final.jpg"), None);
    }
}
