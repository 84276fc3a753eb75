//! Application state shared by every handler of the event loop.
//!
//! Long running work (schedule fetches, session loads, chart building) runs on
//! `async_std` tasks; their results come back as `AppUpdate`s over a channel
//! that the event loop drains with `poll_updates`.

use std::collections::HashMap;
use std::sync::Arc;

use async_std::channel::{ self, Receiver, Sender };
use async_std::task;

use crate::config::Config;
use crate::cursor::{ DriverPair, InteractiveCursor, RenderSurface, StatusLine, StatusSink };
use crate::error::Result;
use crate::figure::{ Figure, PointerEvent };
use crate::plot::{ AnalysisKind, PlotOutput };
use crate::session::provider::{ SessionKey, SessionProvider };
use crate::session::{ Schedule, Session };

pub const MIN_YEAR: i32 = 1950;

pub enum AppUpdate {
    ScheduleLoaded { year: i32, result: Result<Schedule> },
    SessionLoaded { generation: u64, key: SessionKey, result: Result<Arc<Session>> },
    AnalysisReady { generation: u64, kind: AnalysisKind, output: PlotOutput },
}

/// Selectable controls, in focus order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Field {
    #[default]
    Year,
    Event,
    Session,
    Analysis,
    Driver1,
    Driver2,
}

impl Field {
    pub fn all() -> &'static [Field] {
        &[Field::Year, Field::Event, Field::Session, Field::Analysis, Field::Driver1, Field::Driver2]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Field::Year => "Year",
            Field::Event => "Event",
            Field::Session => "Session",
            Field::Analysis => "Analysis",
            Field::Driver1 => "Driver 1",
            Field::Driver2 => "Driver 2",
        }
    }

    pub fn next(&self) -> Field {
        let all = Field::all();
        let idx = all.iter().position(|f| f == self).unwrap_or(0);
        all[(idx + 1) % all.len()]
    }

    pub fn previous(&self) -> Field {
        let all = Field::all();
        let idx = all.iter().position(|f| f == self).unwrap_or(0);
        all[(idx + all.len() - 1) % all.len()]
    }
}

/// A list of choices with an optional selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Choice {
    pub options: Vec<String>,
    pub selected: Option<usize>,
}

impl Choice {
    pub fn new(options: Vec<String>, selected: Option<usize>) -> Choice {
        let selected = selected.filter(|idx| *idx < options.len());
        Choice { options, selected }
    }

    pub fn value(&self) -> Option<&str> {
        self.selected.and_then(|idx| self.options.get(idx)).map(String::as_str)
    }

    pub fn step(&mut self, delta: i32) {
        if self.options.is_empty() {
            return;
        }
        let len = self.options.len() as i32;
        let current = self.selected.unwrap_or(0) as i32;
        self.selected = Some((current + delta).rem_euclid(len) as usize);
    }
}

pub struct AppState {
    pub config: Config,
    provider: Arc<dyn SessionProvider>,

    pub focus: Field,
    pub year: i32,
    schedules: HashMap<i32, Schedule>,
    pub events: Choice,
    pub sessions: Choice,
    pub analysis: AnalysisKind,
    pub driver1: Choice,
    pub driver2: Choice,

    pub session: Option<Arc<Session>>,
    pub figure: Option<Figure>,
    pub cursor: Option<InteractiveCursor>,
    pub status: StatusLine,
    pub busy: bool,

    generation: u64,
    sender: Sender<AppUpdate>,
    receiver: Receiver<AppUpdate>,
}

impl AppState {
    pub fn new(config: Config, provider: Arc<dyn SessionProvider>) -> AppState {
        let (sender, receiver) = channel::unbounded();
        AppState {
            year: config.default_year,
            config,
            provider,
            focus: Field::default(),
            schedules: HashMap::new(),
            events: Choice::default(),
            sessions: Choice::default(),
            analysis: AnalysisKind::default(),
            driver1: Choice::default(),
            driver2: Choice::default(),
            session: None,
            figure: None,
            cursor: None,
            status: StatusLine::new("Ready. Select a session."),
            busy: false,
            generation: 0,
            sender,
            receiver,
        }
    }

    fn set_status(&mut self, text: &str) {
        self.status.set_status(text);
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn drivers(&self) -> Option<DriverPair> {
        Some(DriverPair {
            d1: self.driver1.value()?.to_string(),
            d2: self.driver2.value()?.to_string(),
        })
    }

    /// Switches the year; the schedule comes from the cache or a background fetch.
    pub fn select_year(&mut self, year: i32) {
        self.year = year.max(MIN_YEAR);
        if let Some(schedule) = self.schedules.get(&self.year).cloned() {
            self.apply_schedule(&schedule);
            return;
        }

        self.events = Choice::default();
        self.sessions = Choice::default();
        self.set_status(&format!["Fetching schedule for {}...", self.year]);

        let provider = self.provider.clone();
        let sender = self.sender.clone();
        let year = self.year;
        task::spawn(async move {
            let result = provider.schedule(year).await;
            if sender.send(AppUpdate::ScheduleLoaded { year, result }).await.is_err() {
                debug!["Schedule for {} arrived after shutdown", year];
            }
        });
    }

    fn apply_schedule(&mut self, schedule: &Schedule) {
        let names = schedule.event_names();
        let selected = if names.is_empty() { None } else { Some(0) };
        self.events = Choice::new(names, selected);
        self.refresh_sessions();
        if self.events.options.is_empty() {
            self.set_status(&format!["No events found for {}.", self.year]);
        } else {
            self.set_status("Ready.");
        }
    }

    /// Session list of the selected event, with the last session preselected.
    fn refresh_sessions(&mut self) {
        let names = self.events.value()
            .and_then(|event| self.schedules.get(&self.year)?.event(event))
            .map(|event| event.session_names())
            .unwrap_or_default();
        let selected = names.len().checked_sub(1);
        self.sessions = Choice::new(names, selected);
    }

    /// Moves the value of the focused control by `delta`.
    pub fn step_focused(&mut self, delta: i32) {
        match self.focus {
            Field::Year => self.select_year(self.year + delta),
            Field::Event => {
                self.events.step(delta);
                self.refresh_sessions();
            },
            Field::Session => self.sessions.step(delta),
            Field::Analysis => {
                let all = AnalysisKind::all();
                let idx = all.iter().position(|k| *k == self.analysis).unwrap_or(0) as i32;
                self.analysis = all[(idx + delta).rem_euclid(all.len() as i32) as usize];
            },
            Field::Driver1 => self.driver1.step(delta),
            Field::Driver2 => self.driver2.step(delta),
        }
    }

    /// Disconnects and drops the cursor, then the figure it overlays.
    fn clear_figure<S: RenderSurface>(&mut self, surface: &mut S) {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.disconnect(surface);
        }
        self.figure = None;
        surface.draw_idle();
    }

    /// Starts loading the selected session. Results of earlier requests are discarded.
    pub fn request_load<S: RenderSurface>(&mut self, surface: &mut S) {
        let key = match (self.events.value(), self.sessions.value()) {
            (Some(event), Some(session)) => SessionKey::new(self.year, event, session),
            _ => {
                self.set_status("Select an event and a session first.");
                return;
            }
        };

        self.generation += 1;
        self.clear_figure(surface);
        self.session = None;
        self.driver1 = Choice::default();
        self.driver2 = Choice::default();
        self.busy = true;
        self.set_status("Loading session data...");
        info!["Loading {:?} (generation {})", key, self.generation];

        let provider = self.provider.clone();
        let sender = self.sender.clone();
        let generation = self.generation;
        task::spawn(async move {
            let result = provider.load_session(&key).await;
            if sender.send(AppUpdate::SessionLoaded { generation, key, result }).await.is_err() {
                debug!["Session load {} finished after shutdown", generation];
            }
        });
    }

    /// Builds the selected analysis for the loaded session in the background.
    pub fn request_analysis(&mut self) {
        let session = match &self.session {
            Some(session) => session.clone(),
            None => {
                self.set_status("Load a session first.");
                return;
            }
        };

        let drivers = self.drivers();
        if self.analysis.needs_drivers() {
            match &drivers {
                Some(pair) if pair.d1 == pair.d2 => {
                    self.set_status("Please select two different drivers.");
                    return;
                },
                None => {
                    self.set_status("Please select two drivers.");
                    return;
                },
                _ => (),
            }
        }

        self.generation += 1;
        self.busy = true;
        self.set_status("Building chart...");

        let sender = self.sender.clone();
        let generation = self.generation;
        let kind = self.analysis;
        task::spawn(async move {
            let output = kind.build(&session, drivers.as_ref());
            if sender.send(AppUpdate::AnalysisReady { generation, kind, output }).await.is_err() {
                debug!["Analysis {} finished after shutdown", generation];
            }
        });
    }

    /// Applies every update that has arrived since the last call.
    pub fn poll_updates<S: RenderSurface>(&mut self, surface: &mut S) -> usize {
        let mut applied = 0;
        while let Ok(update) = self.receiver.try_recv() {
            self.apply(update, surface);
            applied += 1;
        }
        applied
    }

    /// Waits for the next update without applying it.
    #[cfg(test)]
    pub async fn next_update(&self) -> Option<AppUpdate> {
        self.receiver.recv().await.ok()
    }

    pub fn apply<S: RenderSurface>(&mut self, update: AppUpdate, surface: &mut S) {
        match update {
            AppUpdate::ScheduleLoaded { year, result } => match result {
                Ok(schedule) => {
                    self.schedules.insert(year, schedule.clone());
                    if year == self.year {
                        self.apply_schedule(&schedule);
                    }
                },
                Err(err) => {
                    error!["Failed to fetch schedule for {}: {}", year, err];
                    if year == self.year {
                        self.events = Choice::default();
                        self.sessions = Choice::default();
                        self.set_status(&format!["Could not fetch the schedule for {}.", year]);
                    }
                },
            },

            AppUpdate::SessionLoaded { generation, key, result } => {
                if generation != self.generation {
                    debug!["Dropping stale session load {} for {:?}", generation, key];
                    return;
                }
                self.busy = false;
                match result {
                    Ok(session) => {
                        let codes = session.driver_codes();
                        let d2 = if codes.len() > 1 { Some(1) } else { Some(0) };
                        self.driver1 = Choice::new(codes.clone(), Some(0));
                        self.driver2 = Choice::new(codes, d2);
                        self.set_status(&format![
                            "Loaded {} {} - {}.", session.year, session.event_name, session.name,
                        ]);
                        self.session = Some(session);
                    },
                    Err(err) => {
                        error!["Failed to load {:?}: {}", key, err];
                        self.set_status(&format!["Error while loading the session: {}", err]);
                    },
                }
            },

            AppUpdate::AnalysisReady { generation, kind, output } => {
                if generation != self.generation {
                    debug!["Dropping stale {} chart {}", kind.display_name(), generation];
                    return;
                }
                self.busy = false;
                self.clear_figure(surface);

                if let Some(input) = output.cursor {
                    match InteractiveCursor::new(
                        surface,
                        &input.panels,
                        input.telemetry,
                        input.drivers,
                        Box::new(self.status.clone()),
                    ) {
                        Ok(cursor) => self.cursor = Some(cursor),
                        Err(err) => error!["Interactive cursor unavailable: {}", err],
                    }
                }
                self.figure = Some(output.figure);
                self.set_status("Chart generated successfully.");
            },
        }
    }

    pub fn on_pointer_motion<S: RenderSurface>(&mut self, surface: &mut S, event: &PointerEvent) {
        if let Some(cursor) = &mut self.cursor {
            cursor.on_pointer_motion(surface, event);
        }
    }

    /// Unsubscribes the cursor before the surface goes away.
    pub fn shutdown<S: RenderSurface>(&mut self, surface: &mut S) {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.disconnect(surface);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::cursor::SubscriptionId;
    use crate::error::Error;
    use crate::telemetry::CarData;
    use crate::session::{ DriverInfo, Event, Lap };
    use std::time::Duration;

    struct StubProvider;

    fn car_data(speed: f64) -> CarData {
        let n = 10;
        CarData {
            time: (0..n).map(|i| i as f64).collect(),
            speed: vec![speed; n],
            rpm: vec![11000.0; n],
            gear: vec![7; n],
            throttle: vec![100.0; n],
            brake: vec![false; n],
            drs: vec![0; n],
        }
    }

    fn lap(driver: &str, seconds: f64, speed: f64) -> Lap {
        Lap {
            driver: driver.to_string(),
            lap_number: 1,
            lap_time: Some(Duration::from_secs_f64(seconds)),
            compound: Some("SOFT".to_string()),
            car_data: car_data(speed),
        }
    }

    #[async_trait]
    impl SessionProvider for StubProvider {
        async fn schedule(&self, year: i32) -> Result<Schedule> {
            if year != 2024 {
                return Err(Error::Session(format!["no schedule for {}", year]));
            }
            Ok(Schedule {
                year,
                events: vec![
                    Event { name: "Bahrain Grand Prix".to_string(), sessions: vec!["Qualifying".to_string(), "Race".to_string()] },
                    Event { name: "Pre-Season Testing".to_string(), sessions: vec![] },
                ],
            })
        }

        async fn load_session(&self, key: &SessionKey) -> Result<Arc<Session>> {
            Ok(Arc::new(Session {
                year: key.year,
                event_name: key.event.clone(),
                name: key.session.clone(),
                drivers: vec![DriverInfo { code: "VER".to_string(), team: "Red Bull Racing".to_string(), team_color: None }],
                laps: vec![lap("VER", 90.0, 200.0), lap("LEC", 90.5, 198.0)],
            }))
        }
    }

    #[derive(Default)]
    struct Surface {
        connected: usize,
        redraws: usize,
    }

    impl RenderSurface for Surface {
        fn connect_motion(&mut self) -> SubscriptionId {
            self.connected += 1;
            SubscriptionId(self.connected as u64)
        }

        fn disconnect_motion(&mut self, _id: SubscriptionId) {
            self.connected -= 1;
        }

        fn draw_idle(&mut self) {
            self.redraws += 1;
        }
    }

    fn state() -> AppState {
        AppState::new(Config::default(), Arc::new(StubProvider))
    }

    fn settle(state: &mut AppState, surface: &mut Surface) {
        let update = task::block_on(state.next_update()).unwrap();
        state.apply(update, surface);
    }

    fn loaded_state(surface: &mut Surface) -> AppState {
        let mut state = state();
        state.select_year(2024);
        settle(&mut state, surface);
        state.request_load(surface);
        settle(&mut state, surface);
        state
    }

    #[test]
    fn year_cascades_to_events_and_sessions() {
        let mut surface = Surface::default();
        let mut state = state();

        state.select_year(2024);
        settle(&mut state, &mut surface);

        assert_eq!(state.events.value(), Some("Bahrain Grand Prix"));
        assert_eq!(state.sessions.value(), Some("Race"));

        state.focus = Field::Event;
        state.step_focused(1);
        assert_eq!(state.events.value(), Some("Pre-Season Testing"));
        assert_eq!(state.sessions.options, vec!["Day 1", "Day 2", "Day 3"]);
        assert_eq!(state.sessions.value(), Some("Day 3"));
    }

    #[test]
    fn schedule_is_cached_per_year() {
        let mut surface = Surface::default();
        let mut state = state();
        state.select_year(2024);
        settle(&mut state, &mut surface);

        state.select_year(2023);
        settle(&mut state, &mut surface);
        assert!(state.events.options.is_empty());
        assert_eq!(state.status.get(), "Could not fetch the schedule for 2023.");

        state.select_year(2024);
        assert_eq!(state.events.value(), Some("Bahrain Grand Prix"));
        assert_eq!(state.poll_updates(&mut surface), 0);
    }

    #[test]
    fn loaded_session_populates_drivers() {
        let mut surface = Surface::default();
        let state = loaded_state(&mut surface);

        assert_eq!(state.session.as_ref().map(|s| s.name.as_str()), Some("Race"));
        assert_eq!(state.drivers(), Some(DriverPair { d1: "LEC".to_string(), d2: "VER".to_string() }));
        assert!(!state.busy);
    }

    #[test]
    fn stale_results_are_discarded() {
        let mut surface = Surface::default();
        let mut state = loaded_state(&mut surface);
        let stale = state.generation();

        state.focus = Field::Session;
        state.step_focused(-1);
        state.request_load(&mut surface);
        let stale_update = AppUpdate::SessionLoaded {
            generation: stale,
            key: SessionKey::new(2024, "Bahrain Grand Prix", "Race"),
            result: Err(Error::Session("late".to_string())),
        };
        state.apply(stale_update, &mut surface);
        assert!(state.session.is_none());
        assert!(state.busy);

        settle(&mut state, &mut surface);
        assert_eq!(state.session.as_ref().map(|s| s.name.as_str()), Some("Qualifying"));
    }

    #[test]
    fn same_driver_comparison_is_rejected() {
        let mut surface = Surface::default();
        let mut state = loaded_state(&mut surface);
        let generation = state.generation();

        state.focus = Field::Driver2;
        state.step_focused(1);
        state.request_analysis();

        assert_eq!(state.status.get(), "Please select two different drivers.");
        assert_eq!(state.generation(), generation);
    }

    #[test]
    fn analysis_installs_figure_and_cursor() {
        let mut surface = Surface::default();
        let mut state = loaded_state(&mut surface);

        state.request_analysis();
        settle(&mut state, &mut surface);

        assert_eq!(state.figure.as_ref().map(|f| f.panels.len()), Some(7));
        assert!(state.cursor.is_some());
        assert_eq!(surface.connected, 1);

        state.on_pointer_motion(&mut surface, &PointerEvent::over(1, 100.0));
        assert!(state.status.get().starts_with("Dist: 100m | LEC: V="));

        // A second chart replaces the first cursor rather than stacking subscriptions
        state.analysis = AnalysisKind::LapTimeDistribution;
        state.request_analysis();
        settle(&mut state, &mut surface);
        assert!(state.cursor.is_none());
        assert_eq!(surface.connected, 0);
    }

    #[test]
    fn new_load_disconnects_cursor() {
        let mut surface = Surface::default();
        let mut state = loaded_state(&mut surface);
        state.request_analysis();
        settle(&mut state, &mut surface);
        assert_eq!(surface.connected, 1);

        state.request_load(&mut surface);
        assert!(state.cursor.is_none());
        assert!(state.figure.is_none());
        assert_eq!(surface.connected, 0);
    }

    #[test]
    fn load_without_selection_only_sets_status() {
        let mut surface = Surface::default();
        let mut state = state();
        state.request_load(&mut surface);
        assert_eq!(state.status.get(), "Select an event and a session first.");
        assert_eq!(state.generation(), 0);
    }

    #[test]
    fn focus_cycles_through_fields() {
        assert_eq!(Field::Year.previous(), Field::Driver2);
        assert_eq!(Field::Driver2.next(), Field::Year);
        assert_eq!(Field::Event.next(), Field::Session);
    }
}
