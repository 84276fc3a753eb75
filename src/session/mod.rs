pub mod archive;
pub mod provider;

use std::convert::TryFrom;
use std::time::Duration;

use yaml_rust::{ Yaml, YamlLoader };

use crate::error::{ Error, Result };
use crate::telemetry::CarData;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverInfo {
    pub code: String,
    pub team: String,
    /// "#RRGGBB" when known
    pub team_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lap {
    pub driver: String,
    pub lap_number: u32,
    pub lap_time: Option<Duration>,
    pub compound: Option<String>,
    pub car_data: CarData,
}

impl Lap {
    pub fn lap_time_seconds(&self) -> Option<f64> {
        self.lap_time.map(|t| t.as_secs_f64())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub year: i32,
    pub event_name: String,
    pub name: String,
    pub drivers: Vec<DriverInfo>,
    pub laps: Vec<Lap>,
}

impl Session {
    /// The lap with the smallest recorded lap time. Laps without a time are ignored.
    pub fn fastest_lap<'a>(&'a self, driver: &str) -> Option<&'a Lap> {
        self.laps.iter()
            .filter(|lap| lap.driver == driver && lap.lap_time.is_some())
            .min_by_key(|lap| lap.lap_time)
    }

    /// Sorted, de-duplicated codes of every driver that set a lap.
    pub fn driver_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.laps.iter().map(|lap| lap.driver.clone()).collect();
        codes.sort();
        codes.dedup();
        codes
    }

    pub fn driver(&self, code: &str) -> Option<&DriverInfo> {
        self.drivers.iter().find(|driver| driver.code == code)
    }
}

/// Formats a lap time as `HH:MM:SS.mmm`.
pub fn format_lap_time(lap_time: Duration) -> String {
    let total_ms = lap_time.as_millis();
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let seconds = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;
    format!["{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub name: String,
    pub sessions: Vec<String>,
}

impl Event {
    pub fn is_pre_season(&self) -> bool {
        self.name.to_lowercase().contains("pre-season")
    }

    /// Sessions offered for selection. Pre-season testing is always offered as three days.
    pub fn session_names(&self) -> Vec<String> {
        if self.is_pre_season() {
            return vec!["Day 1".to_string(), "Day 2".to_string(), "Day 3".to_string()];
        }
        self.sessions.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub year: i32,
    pub events: Vec<Event>,
}

impl Schedule {
    pub fn parse(year: i32, str: &str) -> Result<Schedule> {
        let docs = YamlLoader::load_from_str(str)?;
        let parsed = docs.first()
            .ok_or_else(|| Error::schema("schedule", "empty document"))?;

        let entries = match &parsed["events"] {
            Yaml::Array(entries) => entries,
            Yaml::BadValue | Yaml::Null => return Ok(Schedule { year, events: vec![] }),
            _ => return Err(Error::schema("schedule", "events must be a list")),
        };

        let events = entries.iter()
            .map(|entry| Event::try_from(entry))
            .collect::<Result<Vec<Event>>>()?;

        Ok(Schedule { year, events })
    }

    pub fn event(&self, name: &str) -> Option<&Event> {
        self.events.iter().find(|event| event.name == name)
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events.iter().map(|event| event.name.clone()).collect()
    }
}

impl TryFrom<&Yaml> for Event {
    type Error = Error;

    fn try_from(entry: &Yaml) -> Result<Event> {
        let name = entry["name"].as_str()
            .ok_or_else(|| Error::schema("schedule", "event without name"))?;

        let sessions = match &entry["sessions"] {
            Yaml::Array(sessions) => sessions.iter()
                .map(|session| session.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::schema("schedule", format!["non-string session in {}", name])))
                .collect::<Result<Vec<String>>>()?,
            Yaml::BadValue | Yaml::Null => vec![],
            _ => return Err(Error::schema("schedule", format!["sessions of {} must be a list", name])),
        };

        Ok(Event { name: name.to_string(), sessions })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::telemetry::CarData;

    pub fn lap(driver: &str, lap_number: u32, seconds: Option<f64>, compound: &str) -> Lap {
        Lap {
            driver: driver.to_string(),
            lap_number,
            lap_time: seconds.map(Duration::from_secs_f64),
            compound: if compound.is_empty() { None } else { Some(compound.to_string()) },
            car_data: CarData::default(),
        }
    }

    const SCHEDULE: &str = "
events:
  - name: Pre-Season Testing
    sessions: []
  - name: Bahrain Grand Prix
    sessions: [Practice 1, Practice 2, Practice 3, Qualifying, Race]
";

    #[test]
    fn parses_schedule() {
        let schedule = Schedule::parse(2024, SCHEDULE).unwrap();
        assert_eq!(schedule.year, 2024);
        assert_eq!(schedule.event_names(), vec!["Pre-Season Testing", "Bahrain Grand Prix"]);
        let bahrain = schedule.event("Bahrain Grand Prix").unwrap();
        assert_eq!(bahrain.session_names().last().map(String::as_str), Some("Race"));
    }

    #[test]
    fn pre_season_offers_three_days() {
        let schedule = Schedule::parse(2024, SCHEDULE).unwrap();
        let testing = schedule.event("Pre-Season Testing").unwrap();
        assert!(testing.is_pre_season());
        assert_eq!(testing.session_names(), vec!["Day 1", "Day 2", "Day 3"]);
    }

    #[test]
    fn rejects_event_without_name() {
        assert!(Schedule::parse(2024, "events:\n  - sessions: [Race]\n").is_err());
    }

    #[test]
    fn fastest_lap_skips_missing_times() {
        let session = Session {
            year: 2024,
            event_name: "Test".to_string(),
            name: "Race".to_string(),
            drivers: vec![],
            laps: vec![
                lap("VER", 1, None, "SOFT"),
                lap("VER", 2, Some(92.5), "SOFT"),
                lap("VER", 3, Some(91.25), "SOFT"),
                lap("LEC", 1, Some(90.0), "SOFT"),
            ],
        };
        assert_eq!(session.fastest_lap("VER").map(|l| l.lap_number), Some(3));
        assert!(session.fastest_lap("HAM").is_none());
        assert_eq!(session.driver_codes(), vec!["LEC", "VER"]);
    }

    #[test]
    fn fastest_lap_outlives_driver_code() {
        let session = Session {
            year: 2024,
            event_name: "Test".to_string(),
            name: "Race".to_string(),
            drivers: vec![],
            laps: vec![lap("NOR", 1, Some(88.0), "SOFT"), lap("NOR", 2, Some(87.5), "SOFT")],
        };
        let fastest = {
            let code = String::from("NOR");
            session.fastest_lap(&code)
        };
        assert_eq!(fastest.map(|l| l.lap_number), Some(2));
    }

    #[test]
    fn formats_lap_time() {
        assert_eq!(format_lap_time(Duration::from_millis(91_234)), "00:01:31.234");
        assert_eq!(format_lap_time(Duration::from_millis(3_723_004)), "01:02:03.004");
    }
}
