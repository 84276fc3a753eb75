use std::convert::TryFrom;
use std::path::{ Path, PathBuf };
use std::time::Duration;

use async_std::fs::File;
use async_std::prelude::*;
use prost::Message;

use crate::error::{ Error, Result };
use crate::session::{ DriverInfo, Lap, Schedule, Session };
use crate::telemetry::CarData;

pub mod proto {
    include!(concat!(env!("OUT_DIR"), "/laptrace.session.rs"));
}

/// Lowercase, with every run of non-alphanumerics collapsed to one `_`.
pub fn slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_separator = true;
        }
    }
    slug
}

pub fn schedule_path(root: &Path, year: i32) -> PathBuf {
    root.join(year.to_string()).join("schedule.yaml")
}

pub fn session_path(root: &Path, year: i32, event: &str, session: &str) -> PathBuf {
    root.join(year.to_string())
        .join(slug(event))
        .join(format!["{}.dat", slug(session)])
}

async fn read_file(path: &Path) -> Result<Vec<u8>> {
    let io_error = |source| Error::Io { path: path.display().to_string(), source };

    let mut file = File::open(path).await.map_err(io_error)?;
    let mut buffer = vec![];
    file.read_to_end(&mut buffer).await.map_err(io_error)?;
    Ok(buffer)
}

pub async fn load_schedule(root: &Path, year: i32) -> Result<Schedule> {
    let path = schedule_path(root, year);
    info!["Loading schedule file {}", path.display()];

    let buffer = read_file(&path).await?;
    let contents = String::from_utf8(buffer)
        .map_err(|_err| Error::schema("schedule", "file is not valid UTF-8"))?;
    Schedule::parse(year, &contents)
}

pub async fn load_session(root: &Path, year: i32, event: &str, session: &str) -> Result<Session> {
    let path = session_path(root, year, event, session);
    info!["Loading session file {}", path.display()];

    let buffer = read_file(&path).await?;
    let archive = proto::SessionArchive::decode(&*buffer)?;
    Session::try_from(archive)
}

impl From<proto::CarData> for CarData {
    fn from(data: proto::CarData) -> CarData {
        CarData {
            time: data.time,
            speed: data.speed,
            rpm: data.rpm,
            gear: data.gear,
            throttle: data.throttle,
            brake: data.brake,
            drs: data.drs,
        }
    }
}

impl From<&CarData> for proto::CarData {
    fn from(data: &CarData) -> proto::CarData {
        proto::CarData {
            time: data.time.clone(),
            speed: data.speed.clone(),
            rpm: data.rpm.clone(),
            gear: data.gear.clone(),
            throttle: data.throttle.clone(),
            brake: data.brake.clone(),
            drs: data.drs.clone(),
        }
    }
}

fn lap_time(duration: Option<prost_types::Duration>) -> Result<Option<Duration>> {
    match duration {
        None => Ok(None),
        Some(d) if d.seconds < 0 || d.nanos < 0 => {
            Err(Error::Session(format!["negative lap time {}s {}ns", d.seconds, d.nanos]))
        },
        Some(d) => Ok(Some(Duration::new(d.seconds as u64, d.nanos as u32))),
    }
}

impl TryFrom<proto::SessionArchive> for Session {
    type Error = Error;

    fn try_from(archive: proto::SessionArchive) -> Result<Session> {
        let drivers = archive.drivers.into_iter()
            .map(|driver| DriverInfo {
                code: driver.code,
                team: driver.team,
                team_color: if driver.team_color.is_empty() { None } else { Some(driver.team_color) },
            })
            .collect();

        let laps = archive.laps.into_iter()
            .map(|lap| Ok(Lap {
                lap_time: lap_time(lap.lap_time)?,
                driver: lap.driver,
                lap_number: lap.lap_number,
                compound: if lap.compound.is_empty() { None } else { Some(lap.compound) },
                car_data: lap.car_data.map(CarData::from).unwrap_or_default(),
            }))
            .collect::<Result<Vec<Lap>>>()?;

        Ok(Session {
            year: archive.year,
            event_name: archive.event_name,
            name: archive.session_name,
            drivers,
            laps,
        })
    }
}

impl From<&Session> for proto::SessionArchive {
    fn from(session: &Session) -> proto::SessionArchive {
        proto::SessionArchive {
            year: session.year,
            event_name: session.event_name.clone(),
            session_name: session.name.clone(),
            drivers: session.drivers.iter()
                .map(|driver| proto::DriverEntry {
                    code: driver.code.clone(),
                    team: driver.team.clone(),
                    team_color: driver.team_color.clone().unwrap_or_default(),
                })
                .collect(),
            laps: session.laps.iter()
                .map(|lap| proto::LapRecord {
                    driver: lap.driver.clone(),
                    lap_number: lap.lap_number,
                    lap_time: lap.lap_time.map(|t| prost_types::Duration {
                        seconds: t.as_secs() as i64,
                        nanos: t.subsec_nanos() as i32,
                    }),
                    compound: lap.compound.clone().unwrap_or_default(),
                    car_data: Some(proto::CarData::from(&lap.car_data)),
                })
                .collect(),
        }
    }
}

/// Writes a session where `load_session` expects to find it.
pub fn write_session(root: &Path, session: &Session) -> Result<PathBuf> {
    let path = session_path(root, session.year, &session.event_name, &session.name);
    let io_error = |source| Error::Io { path: path.display().to_string(), source };

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(io_error)?;
    }
    let buffer = proto::SessionArchive::from(session).encode_to_vec();
    std::fs::write(&path, buffer).map_err(io_error)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_std::task;
    use crate::session::tests::lap;

    #[test]
    fn slugs_names() {
        assert_eq!(slug("Bahrain Grand Prix"), "bahrain_grand_prix");
        assert_eq!(slug("São Paulo  Grand Prix!"), "são_paulo_grand_prix");
        assert_eq!(slug("Practice 1"), "practice_1");
        assert_eq!(slug(" - Day 1"), "day_1");
    }

    #[test]
    fn session_round_trips_through_archive() {
        let dir = tempfile::tempdir().unwrap();
        let mut fast = lap("VER", 12, Some(91.234), "SOFT");
        fast.car_data = CarData {
            time: vec![0.0, 0.5],
            speed: vec![280.0, 290.0],
            rpm: vec![11000.0, 11500.0],
            gear: vec![7, 8],
            throttle: vec![100.0, 100.0],
            brake: vec![false, false],
            drs: vec![12, 12],
        };
        let session = Session {
            year: 2024,
            event_name: "Bahrain Grand Prix".to_string(),
            name: "Qualifying".to_string(),
            drivers: vec![DriverInfo {
                code: "VER".to_string(),
                team: "Red Bull Racing".to_string(),
                team_color: Some("#3671C6".to_string()),
            }],
            laps: vec![fast, lap("VER", 13, None, "")],
        };

        let path = write_session(dir.path(), &session).unwrap();
        assert!(path.ends_with("2024/bahrain_grand_prix/qualifying.dat"));

        let loaded = task::block_on(load_session(dir.path(), 2024, "Bahrain Grand Prix", "Qualifying")).unwrap();
        assert_eq!(loaded, session);
    }

    #[test]
    fn missing_session_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = task::block_on(load_session(dir.path(), 2024, "Nowhere", "Race"));
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[test]
    fn garbage_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = session_path(dir.path(), 2024, "Monaco Grand Prix", "Race");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, [0xff, 0xff, 0xff, 0xff]).unwrap();

        let result = task::block_on(load_session(dir.path(), 2024, "Monaco Grand Prix", "Race"));
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn negative_lap_time_is_rejected() {
        let archive = proto::SessionArchive {
            laps: vec![proto::LapRecord {
                driver: "VER".to_string(),
                lap_time: Some(prost_types::Duration { seconds: -1, nanos: 0 }),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(Session::try_from(archive).is_err());
    }
}
