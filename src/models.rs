// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Data Models
//!
//! Request payloads for the Strava calls this client makes.
//!
//! - [`ManualActivity`]: a manually entered activity (`POST /activities`)
//! - [`ActivityUpload`]: metadata for a file upload (`POST /uploads`)
//! - [`Sport`]: Strava's sport type names
//! - [`StartTime`]: the accepted start-time representations

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Result, StravaError};

/// Sport types accepted by Strava's `sport_type` field
///
/// # Examples
///
/// ```rust
/// use stravalink::models::Sport;
///
/// let sport: Sport = "EBikeRide".parse().unwrap();
/// assert_eq!(sport, Sport::EBikeRide);
/// assert_eq!(Sport::TrailRun.to_string(), "TrailRun");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sport {
    AlpineSki,
    BackcountrySki,
    Badminton,
    Canoeing,
    Crossfit,
    EBikeRide,
    Elliptical,
    EMountainBikeRide,
    Golf,
    GravelRide,
    Handcycle,
    HighIntensityIntervalTraining,
    Hike,
    IceSkate,
    InlineSkate,
    Kayaking,
    Kitesurf,
    MountainBikeRide,
    NordicSki,
    Pickleball,
    Pilates,
    Racquetball,
    Ride,
    RockClimbing,
    RollerSki,
    Rowing,
    Run,
    Sail,
    Skateboard,
    Snowboard,
    Snowshoe,
    Soccer,
    Squash,
    StairStepper,
    StandUpPaddling,
    Surfing,
    Swim,
    TableTennis,
    Tennis,
    TrailRun,
    Velomobile,
    VirtualRide,
    VirtualRow,
    VirtualRun,
    Walk,
    WeightTraining,
    Wheelchair,
    Windsurf,
    Workout,
    Yoga,
}

impl Sport {
    pub const ALL: [Sport; 50] = [
        Sport::AlpineSki,
        Sport::BackcountrySki,
        Sport::Badminton,
        Sport::Canoeing,
        Sport::Crossfit,
        Sport::EBikeRide,
        Sport::Elliptical,
        Sport::EMountainBikeRide,
        Sport::Golf,
        Sport::GravelRide,
        Sport::Handcycle,
        Sport::HighIntensityIntervalTraining,
        Sport::Hike,
        Sport::IceSkate,
        Sport::InlineSkate,
        Sport::Kayaking,
        Sport::Kitesurf,
        Sport::MountainBikeRide,
        Sport::NordicSki,
        Sport::Pickleball,
        Sport::Pilates,
        Sport::Racquetball,
        Sport::Ride,
        Sport::RockClimbing,
        Sport::RollerSki,
        Sport::Rowing,
        Sport::Run,
        Sport::Sail,
        Sport::Skateboard,
        Sport::Snowboard,
        Sport::Snowshoe,
        Sport::Soccer,
        Sport::Squash,
        Sport::StairStepper,
        Sport::StandUpPaddling,
        Sport::Surfing,
        Sport::Swim,
        Sport::TableTennis,
        Sport::Tennis,
        Sport::TrailRun,
        Sport::Velomobile,
        Sport::VirtualRide,
        Sport::VirtualRow,
        Sport::VirtualRun,
        Sport::Walk,
        Sport::WeightTraining,
        Sport::Wheelchair,
        Sport::Windsurf,
        Sport::Workout,
        Sport::Yoga,
    ];

    /// Name as Strava spells it on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Sport::AlpineSki => "AlpineSki",
            Sport::BackcountrySki => "BackcountrySki",
            Sport::Badminton => "Badminton",
            Sport::Canoeing => "Canoeing",
            Sport::Crossfit => "Crossfit",
            Sport::EBikeRide => "EBikeRide",
            Sport::Elliptical => "Elliptical",
            Sport::EMountainBikeRide => "EMountainBikeRide",
            Sport::Golf => "Golf",
            Sport::GravelRide => "GravelRide",
            Sport::Handcycle => "Handcycle",
            Sport::HighIntensityIntervalTraining => "HighIntensityIntervalTraining",
            Sport::Hike => "Hike",
            Sport::IceSkate => "IceSkate",
            Sport::InlineSkate => "InlineSkate",
            Sport::Kayaking => "Kayaking",
            Sport::Kitesurf => "Kitesurf",
            Sport::MountainBikeRide => "MountainBikeRide",
            Sport::NordicSki => "NordicSki",
            Sport::Pickleball => "Pickleball",
            Sport::Pilates => "Pilates",
            Sport::Racquetball => "Racquetball",
            Sport::Ride => "Ride",
            Sport::RockClimbing => "RockClimbing",
            Sport::RollerSki => "RollerSki",
            Sport::Rowing => "Rowing",
            Sport::Run => "Run",
            Sport::Sail => "Sail",
            Sport::Skateboard => "Skateboard",
            Sport::Snowboard => "Snowboard",
            Sport::Snowshoe => "Snowshoe",
            Sport::Soccer => "Soccer",
            Sport::Squash => "Squash",
            Sport::StairStepper => "StairStepper",
            Sport::StandUpPaddling => "StandUpPaddling",
            Sport::Surfing => "Surfing",
            Sport::Swim => "Swim",
            Sport::TableTennis => "TableTennis",
            Sport::Tennis => "Tennis",
            Sport::TrailRun => "TrailRun",
            Sport::Velomobile => "Velomobile",
            Sport::VirtualRide => "VirtualRide",
            Sport::VirtualRow => "VirtualRow",
            Sport::VirtualRun => "VirtualRun",
            Sport::Walk => "Walk",
            Sport::WeightTraining => "WeightTraining",
            Sport::Wheelchair => "Wheelchair",
            Sport::Windsurf => "Windsurf",
            Sport::Workout => "Workout",
            Sport::Yoga => "Yoga",
        }
    }
}

impl FromStr for Sport {
    type Err = StravaError;

    /// Case-insensitive match on the Strava name.
    fn from_str(s: &str) -> Result<Self> {
        Sport::ALL
            .iter()
            .copied()
            .find(|sport| sport.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StravaError::InvalidSport(s.to_string()))
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Sport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Sport {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Start of an activity in one of the three accepted forms
///
/// All three render to the same local ISO 8601 string when they describe the
/// same instant:
///
/// ```rust
/// use chrono::NaiveDate;
/// use stravalink::models::StartTime;
///
/// let at = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap().and_hms_opt(7, 30, 0).unwrap();
/// assert_eq!(StartTime::from(at).to_iso8601().unwrap(), "2024-03-09T07:30:00");
/// assert_eq!(
///     StartTime::from("2024-03-09T07:30:00").to_iso8601().unwrap(),
///     "2024-03-09T07:30:00"
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum StartTime {
    /// Already formatted, sent as is
    Iso(String),
    /// Unix seconds, interpreted in the local time zone
    Timestamp(f64),
    /// Local wall-clock time
    DateTime(NaiveDateTime),
}

impl StartTime {
    /// Fails with [`StravaError::InvalidStartTime`] for a timestamp that is
    /// not finite or lies outside the representable date range.
    pub fn to_iso8601(&self) -> Result<String> {
        match self {
            StartTime::Iso(s) => Ok(s.clone()),
            StartTime::Timestamp(ts) => Ok(format_local(timestamp_to_local(*ts)?)),
            StartTime::DateTime(dt) => Ok(format_local(*dt)),
        }
    }
}

fn timestamp_to_local(ts: f64) -> Result<NaiveDateTime> {
    let invalid = || StravaError::InvalidStartTime(ts.to_string());
    if !ts.is_finite() || ts.abs() >= i64::MAX as f64 {
        return Err(invalid());
    }

    let secs = ts.floor();
    // Round to whole microseconds, the finest unit rendered.
    let micros = ((ts - secs) * 1_000_000.0).round() as i64;
    let utc = DateTime::from_timestamp(secs as i64, 0)
        .and_then(|dt| dt.checked_add_signed(chrono::Duration::microseconds(micros)))
        .ok_or_else(invalid)?;
    Ok(utc.with_timezone(&Local).naive_local())
}

/// `YYYY-MM-DDTHH:MM:SS`, with `.ffffff` appended only for a non-zero
/// sub-second part.
fn format_local(dt: NaiveDateTime) -> String {
    let micros = dt.nanosecond() / 1_000;
    if micros == 0 {
        dt.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        format!("{}.{:06}", dt.format("%Y-%m-%dT%H:%M:%S"), micros)
    }
}

impl From<&str> for StartTime {
    fn from(s: &str) -> Self {
        StartTime::Iso(s.to_string())
    }
}

impl From<String> for StartTime {
    fn from(s: String) -> Self {
        StartTime::Iso(s)
    }
}

impl From<f64> for StartTime {
    fn from(ts: f64) -> Self {
        StartTime::Timestamp(ts)
    }
}

impl From<i64> for StartTime {
    fn from(ts: i64) -> Self {
        StartTime::Timestamp(ts as f64)
    }
}

impl From<NaiveDateTime> for StartTime {
    fn from(dt: NaiveDateTime) -> Self {
        StartTime::DateTime(dt)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for StartTime {
    /// Zoned date-times are converted to local wall time.
    fn from(dt: DateTime<Tz>) -> Self {
        StartTime::DateTime(dt.with_timezone(&Local).naive_local())
    }
}

/// A manually entered activity
///
/// ```rust
/// use stravalink::models::{ManualActivity, Sport};
///
/// let activity = ManualActivity::new("Lunch Run", Sport::Run, "2024-03-09T12:00:00", 1800)
///     .distance(5000.0)
///     .commute(true);
/// assert_eq!(activity.distance, 5000.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ManualActivity {
    pub name: String,
    pub sport_type: Sport,
    pub start_date_local: StartTime,
    /// Seconds
    pub elapsed_time: u64,
    /// Meters
    pub distance: f64,
    pub description: Option<String>,
    pub trainer: bool,
    pub commute: bool,
}

impl ManualActivity {
    pub fn new(
        name: impl Into<String>,
        sport_type: Sport,
        start_date_local: impl Into<StartTime>,
        elapsed_time: u64,
    ) -> Self {
        Self {
            name: name.into(),
            sport_type,
            start_date_local: start_date_local.into(),
            elapsed_time,
            distance: 0.0,
            description: None,
            trainer: false,
            commute: false,
        }
    }

    pub fn distance(mut self, meters: f64) -> Self {
        self.distance = meters;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn trainer(mut self, trainer: bool) -> Self {
        self.trainer = trainer;
        self
    }

    pub fn commute(mut self, commute: bool) -> Self {
        self.commute = commute;
        self
    }

    /// Form fields for `POST /activities`
    pub fn to_form(&self) -> Result<Vec<(&'static str, String)>> {
        Ok(vec![
            ("name", self.name.clone()),
            ("sport_type", self.sport_type.as_str().to_string()),
            ("start_date_local", self.start_date_local.to_iso8601()?),
            ("elapsed_time", self.elapsed_time.to_string()),
            ("distance", self.distance.to_string()),
            ("description", self.description.clone().unwrap_or_default()),
            ("trainer", u8::from(self.trainer).to_string()),
            ("commute", u8::from(self.commute).to_string()),
        ])
    }
}

/// File formats accepted by `POST /uploads`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityFileType {
    Fit,
    FitGz,
    Tcx,
    TcxGz,
    Gpx,
    GpxGz,
}

impl ActivityFileType {
    pub const ALL: [ActivityFileType; 6] = [
        ActivityFileType::Fit,
        ActivityFileType::FitGz,
        ActivityFileType::Tcx,
        ActivityFileType::TcxGz,
        ActivityFileType::Gpx,
        ActivityFileType::GpxGz,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityFileType::Fit => "fit",
            ActivityFileType::FitGz => "fit.gz",
            ActivityFileType::Tcx => "tcx",
            ActivityFileType::TcxGz => "tcx.gz",
            ActivityFileType::Gpx => "gpx",
            ActivityFileType::GpxGz => "gpx.gz",
        }
    }

    /// Infer the type from a file name such as `ride.tcx.gz`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        Self::ALL
            .into_iter()
            .find(|t| name.ends_with(&format!(".{}", t.as_str())))
            .ok_or_else(|| StravaError::UnknownFileType(path.display().to_string()))
    }
}

impl FromStr for ActivityFileType {
    type Err = StravaError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().trim_start_matches('.').to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or(StravaError::UnknownFileType(s))
    }
}

impl fmt::Display for ActivityFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata sent alongside an uploaded activity file
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityUpload {
    pub data_type: ActivityFileType,
    pub name: Option<String>,
    pub description: Option<String>,
    pub trainer: bool,
    pub commute: bool,
    /// Caller-chosen identifier echoed back by Strava
    pub external_id: Option<String>,
}

impl ActivityUpload {
    pub fn new(data_type: ActivityFileType) -> Self {
        Self {
            data_type,
            name: None,
            description: None,
            trainer: false,
            commute: false,
            external_id: None,
        }
    }

    /// Text fields of the multipart form, excluding the file itself
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("data_type", self.data_type.as_str().to_string()),
            ("trainer", u8::from(self.trainer).to_string()),
            ("commute", u8::from(self.commute).to_string()),
        ];
        if let Some(name) = &self.name {
            fields.push(("name", name.clone()));
        }
        if let Some(description) = &self.description {
            fields.push(("description", description.clone()));
        }
        if let Some(external_id) = &self.external_id {
            fields.push(("external_id", external_id.clone()));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use std::collections::HashMap;

    #[test]
    fn test_sport_names_roundtrip() {
        for sport in Sport::ALL {
            assert_eq!(sport.as_str().parse::<Sport>().unwrap(), sport);
        }
        assert_eq!("run".parse::<Sport>().unwrap(), Sport::Run);
        assert!("Quidditch".parse::<Sport>().is_err());
    }

    #[test]
    fn test_sport_serde_uses_strava_name() {
        let json = serde_json::to_string(&Sport::EMountainBikeRide).unwrap();
        assert_eq!(json, "\"EMountainBikeRide\"");
        let sport: Sport = serde_json::from_str("\"VirtualRide\"").unwrap();
        assert_eq!(sport, Sport::VirtualRide);
    }

    #[test]
    fn test_start_time_representations_agree() {
        let local = NaiveDate::from_ymd_opt(2022, 8, 16)
            .unwrap()
            .and_hms_opt(14, 58, 13)
            .unwrap();
        let timestamp = Local
            .from_local_datetime(&local)
            .single()
            .expect("unambiguous local time")
            .timestamp();

        let iso = StartTime::from("2022-08-16T14:58:13").to_iso8601().unwrap();
        let from_ts = StartTime::from(timestamp as f64).to_iso8601().unwrap();
        let from_dt = StartTime::from(local).to_iso8601().unwrap();

        assert_eq!(iso, "2022-08-16T14:58:13");
        assert_eq!(from_ts, iso);
        assert_eq!(from_dt, iso);
    }

    #[test]
    fn test_start_time_fractional_seconds() {
        let local = NaiveDate::from_ymd_opt(2022, 8, 16)
            .unwrap()
            .and_hms_micro_opt(14, 58, 13, 250_000)
            .unwrap();
        assert_eq!(
            StartTime::from(local).to_iso8601().unwrap(),
            "2022-08-16T14:58:13.250000"
        );

        let base = Local
            .from_local_datetime(&local.with_nanosecond(0).unwrap())
            .single()
            .unwrap()
            .timestamp();
        assert_eq!(
            StartTime::from(base as f64 + 0.25).to_iso8601().unwrap(),
            "2022-08-16T14:58:13.250000"
        );
    }

    #[test]
    fn test_start_time_from_zoned_datetime() {
        let utc = Utc::now();
        let expected = format_local(utc.with_timezone(&Local).naive_local());
        assert_eq!(StartTime::from(utc).to_iso8601().unwrap(), expected);
    }

    #[test]
    fn test_start_time_rejects_unrepresentable_timestamps() {
        for ts in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 1e20, -1e20, 1e15] {
            let err = StartTime::from(ts).to_iso8601().unwrap_err();
            assert!(matches!(err, StravaError::InvalidStartTime(_)), "{ts}: {err}");
        }
    }

    #[test]
    fn test_manual_activity_form_rejects_nan_start() {
        let activity = ManualActivity::new("Night Run", Sport::Run, f64::NAN, 600);
        assert!(matches!(
            activity.to_form(),
            Err(StravaError::InvalidStartTime(_))
        ));
    }

    #[test]
    fn test_manual_activity_form() {
        let activity = ManualActivity::new("Morning Run", Sport::Run, "2024-01-15T08:00:00", 1800)
            .distance(5000.0)
            .trainer(true);

        let form: HashMap<_, _> = activity.to_form().unwrap().into_iter().collect();
        assert_eq!(form["name"], "Morning Run");
        assert_eq!(form["sport_type"], "Run");
        assert_eq!(form["start_date_local"], "2024-01-15T08:00:00");
        assert_eq!(form["elapsed_time"], "1800");
        assert_eq!(form["distance"], "5000");
        assert_eq!(form["description"], "");
        assert_eq!(form["trainer"], "1");
        assert_eq!(form["commute"], "0");
    }

    #[test]
    fn test_file_type_from_path() {
        assert_eq!(
            ActivityFileType::from_path(Path::new("/tmp/ride.FIT")).unwrap(),
            ActivityFileType::Fit
        );
        assert_eq!(
            ActivityFileType::from_path(Path::new("run.tcx.gz")).unwrap(),
            ActivityFileType::TcxGz
        );
        assert_eq!(
            ActivityFileType::from_path(Path::new("hike.gpx")).unwrap(),
            ActivityFileType::Gpx
        );
        assert!(ActivityFileType::from_path(Path::new("notes.txt")).is_err());
        assert!(ActivityFileType::from_path(Path::new("archive.gz")).is_err());
    }

    #[test]
    fn test_file_type_from_str() {
        assert_eq!("gpx.gz".parse::<ActivityFileType>().unwrap(), ActivityFileType::GpxGz);
        assert_eq!(".fit".parse::<ActivityFileType>().unwrap(), ActivityFileType::Fit);
        assert!("kml".parse::<ActivityFileType>().is_err());
    }

    #[test]
    fn test_upload_fields_skip_absent_metadata() {
        let mut upload = ActivityUpload::new(ActivityFileType::Gpx);
        upload.name = Some("Hill repeats".to_string());

        let fields: HashMap<_, _> = upload.to_fields().into_iter().collect();
        assert_eq!(fields["data_type"], "gpx");
        assert_eq!(fields["name"], "Hill repeats");
        assert_eq!(fields["trainer"], "0");
        assert!(!fields.contains_key("description"));
        assert!(!fields.contains_key("external_id"));
    }
}
