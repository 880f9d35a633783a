use crate::{
    catalog::CatalogStore,
    draw::ScriptedRandom,
    session::{
        AnimationPort,
        SessionMachine,
        SpinRequest,
    },
    store::ProfileState,
};
use chrono::{
    DateTime,
    TimeZone,
    Utc,
};
use std::sync::Arc;

/// Animation stand-in that only remembers what it was asked to play.
#[derive(Debug, Default)]
pub struct RecordingAnimation {
    requests: Vec<SpinRequest>,
}

impl RecordingAnimation {
    pub fn requests(&self) -> &[SpinRequest] {
        &self.requests
    }

    pub fn last(&self) -> Option<&SpinRequest> {
        self.requests.last()
    }
}

impl AnimationPort for RecordingAnimation {
    fn start(&mut self, request: SpinRequest) {
        self.requests.push(request);
    }
}

pub type TestMachine = SessionMachine<ScriptedRandom, RecordingAnimation>;

pub fn fixed_clock() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Built-in catalog, `stars` to spend and a random source replaying `draws`.
pub fn machine_with(stars: u64, draws: impl IntoIterator<Item = f64>) -> TestMachine {
    machine_with_catalog(CatalogStore::builtin(), stars, draws)
}

pub fn machine_with_catalog(
    catalog: CatalogStore,
    stars: u64,
    draws: impl IntoIterator<Item = f64>,
) -> TestMachine {
    SessionMachine::new(
        Arc::new(catalog),
        ProfileState::starting(stars, 0),
        ScriptedRandom::new(draws),
        RecordingAnimation::default(),
    )
    .with_clock(fixed_clock)
}
