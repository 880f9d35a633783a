use crate::ui;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use crossterm::event::EventStream;
use futures::StreamExt;
use gift_cases::{
    AnimationPort,
    CatalogStore,
    Completion,
    Currency,
    InMemoryProfileStore,
    InventoryItem,
    JsonFileProfileStore,
    Phase,
    ProfileState,
    ProfileStore,
    Rarity,
    SessionError,
    SessionId,
    SessionMachine,
    SpinRequest,
    draw::SessionRandom,
};
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
    sync::Arc,
    time::{
        Duration,
        Instant,
    },
};
use tokio::{
    sync::mpsc,
    time,
};
use tracing::{
    error,
    info,
    warn,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::EnvFilter;

pub const DEFAULT_STARTING_STARS: u64 = 20_000;
/// 123.45 TON, in hundredths.
pub const DEFAULT_STARTING_TON: u64 = 12_345;
pub const DEFAULT_SPIN_MILLIS: u64 = 2_800;
const FRAME_INTERVAL: Duration = Duration::from_millis(50);
const MAX_ERRORS: usize = 5;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub catalog_path: Option<PathBuf>,
    pub state_path: Option<PathBuf>,
    pub starting_stars: u64,
    pub starting_ton: u64,
    pub seed: Option<u64>,
    pub spin_duration: Duration,
    pub log_dir: PathBuf,
}

pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

pub fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let appender = rolling::daily(log_dir, "gift-cases.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!("failed to install tracing subscriber: {e}"))?;
    Ok(guard)
}

/// Forwards spin requests to the UI loop, which animates them and reports
/// back through [`AppController::settle`].
pub struct ChannelAnimation {
    tx: mpsc::UnboundedSender<SpinRequest>,
}

impl ChannelAnimation {
    pub fn new(tx: mpsc::UnboundedSender<SpinRequest>) -> Self {
        Self { tx }
    }
}

impl AnimationPort for ChannelAnimation {
    fn start(&mut self, request: SpinRequest) {
        let session = request.session;
        if self.tx.send(request).is_err() {
            warn!(%session, "animation channel closed; spin will not be shown");
        }
    }
}

#[derive(Clone, Debug)]
pub struct GiftView {
    pub name: String,
    pub rarity: Rarity,
    pub value: u64,
    pub chance: f64,
}

#[derive(Clone, Debug)]
pub struct CaseView {
    pub name: String,
    pub description: String,
    pub cost: u64,
    pub affordable: bool,
    pub gifts: Vec<GiftView>,
}

#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub cases: Vec<CaseView>,
    pub selected_case: usize,
    pub stars: u64,
    pub ton: u64,
    pub items: Vec<InventoryItem>,
    pub collection_value: u64,
    pub phase: Phase,
    pub busy: bool,
    pub last_result: Option<InventoryItem>,
    pub status: String,
    pub errors: Vec<String>,
}

pub struct AppController {
    machine: SessionMachine<SessionRandom, ChannelAnimation>,
    store: Box<dyn ProfileStore>,
    selected_case: usize,
    status: String,
    errors: Vec<String>,
}

impl AppController {
    pub fn new(config: &AppConfig, spins: mpsc::UnboundedSender<SpinRequest>) -> Result<Self> {
        let catalog = match &config.catalog_path {
            Some(path) => CatalogStore::from_json_file(path)
                .wrap_err_with(|| format!("Loading catalog {}", path.display()))?,
            None => CatalogStore::builtin(),
        };
        if catalog.is_empty() {
            return Err(eyre!("No valid cases in catalog"));
        }
        let rejected: Vec<String> = catalog
            .rejected()
            .iter()
            .map(|e| format!("Case unavailable: {e}"))
            .collect();

        let store: Box<dyn ProfileStore> = match &config.state_path {
            Some(path) => {
                info!(path = %path.display(), "using profile file");
                Box::new(JsonFileProfileStore::new(path))
            }
            None => Box::new(InMemoryProfileStore::new()),
        };
        let profile = match store.load().wrap_err("Loading stored profile")? {
            Some(profile) => {
                info!(items = profile.items.len(), "restored profile");
                profile
            }
            None => ProfileState::starting(config.starting_stars, config.starting_ton),
        };

        let machine = SessionMachine::new(
            Arc::new(catalog),
            profile,
            SessionRandom::from_seed(config.seed),
            ChannelAnimation::new(spins),
        );
        let mut controller = Self {
            machine,
            store,
            selected_case: 0,
            status: String::from("Ready"),
            errors: Vec::new(),
        };
        controller.push_errors(rejected);
        Ok(controller)
    }

    pub fn select_next_case(&mut self) {
        let len = self.machine.catalog().cases().len();
        if len > 0 {
            self.selected_case = (self.selected_case + 1) % len;
        }
    }

    pub fn select_prev_case(&mut self) {
        let len = self.machine.catalog().cases().len();
        if len > 0 {
            self.selected_case = (self.selected_case + len - 1) % len;
        }
    }

    pub fn open_selected(&mut self) {
        let Some(case) = self.machine.catalog().cases().get(self.selected_case) else {
            return;
        };
        let case_id = case.id.clone();
        let case_name = case.name.clone();
        match self.machine.begin(&case_id) {
            Ok(session) => {
                self.set_status(format!("Opening {case_name}..."));
                info!(%session, case = %case_id, "opening started");
                self.persist();
            }
            Err(SessionError::InsufficientFunds { .. }) => {
                self.set_status("Not enough Stars to open this case.");
            }
            Err(SessionError::SessionAlreadyActive { .. }) => {
                self.set_status("A case is already being opened.");
            }
            Err(e) => {
                error!(error = %e, "opening failed");
                self.push_errors(vec![format!("Opening failed: {e}")]);
            }
        }
    }

    pub fn settle(&mut self, session: SessionId) {
        match self.machine.on_animation_complete(session) {
            Completion::Settled(item) => {
                self.set_status(format!("You got {} ({})!", item.name, item.rarity));
                self.persist();
            }
            Completion::DuplicateSignal => {}
        }
    }

    /// Delivers the completion signal for an opening whose animation will
    /// never finish, so its debit is not left without an item.
    pub fn finish_pending(&mut self) {
        if let Some(session) = self.machine.active_session().map(|s| s.id) {
            info!(%session, "settling unfinished opening before exit");
            self.settle(session);
        }
    }

    pub fn dismiss_result(&mut self) {
        self.machine.reset();
    }

    pub fn is_busy(&self) -> bool {
        self.machine.is_busy()
    }

    pub fn snapshot(&self) -> AppSnapshot {
        let stars = self.machine.balance();
        let cases = self
            .machine
            .catalog()
            .cases()
            .iter()
            .map(|case| CaseView {
                name: case.name.clone(),
                description: case.description.clone(),
                cost: case.open_cost,
                affordable: stars >= case.open_cost,
                gifts: case
                    .gifts
                    .iter()
                    .zip(case.drop_chances())
                    .map(|(g, chance)| GiftView {
                        name: g.name.clone(),
                        rarity: g.rarity,
                        value: g.value,
                        chance,
                    })
                    .collect(),
            })
            .collect();
        let inventory = self.machine.inventory();
        AppSnapshot {
            cases,
            selected_case: self.selected_case,
            stars,
            ton: self.machine.ledger().balance(Currency::Ton),
            items: inventory.newest_first().cloned().collect(),
            collection_value: inventory.total_value(),
            phase: self.machine.phase(),
            busy: self.machine.is_busy(),
            last_result: self.machine.last_result().cloned(),
            status: self.status.clone(),
            errors: self.errors.clone(),
        }
    }

    fn persist(&mut self) {
        if let Err(err) = self.store.save(&self.machine.profile()) {
            warn!(?err, "saving profile failed");
            self.push_errors(vec![format!("Saving profile failed: {err}")]);
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    fn push_errors(&mut self, items: Vec<String>) {
        for item in items {
            warn!("{}", item);
            self.errors.push(item);
        }
        if self.errors.len() > MAX_ERRORS {
            let excess = self.errors.len() - MAX_ERRORS;
            self.errors.drain(..excess);
        }
    }
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let (spin_tx, spin_rx) = mpsc::unbounded_channel();
    let controller = AppController::new(&config, spin_tx)?;
    let mut ui_state = ui::UiState::default();

    tracing::info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(controller, &mut ui_state, spin_rx, config.spin_duration).await;
    ui::terminal_exit()?;
    res
}

async fn run_loop(
    mut controller: AppController,
    ui_state: &mut ui::UiState,
    mut spin_rx: mpsc::UnboundedReceiver<SpinRequest>,
    spin_duration: Duration,
) -> Result<()> {
    let mut input = EventStream::new();
    let mut ticker = time::interval(FRAME_INTERVAL);
    ui::draw(ui_state, &controller.snapshot()).wrap_err("initial draw failed")?;

    loop {
        tokio::select! {
            Some(request) = spin_rx.recv() => {
                ui_state.start_spin(request, Instant::now(), spin_duration);
            }
            _ = ticker.tick(), if ui_state.is_spinning() => {
                if let Some(session) = ui_state.advance_spin(Instant::now()) {
                    controller.settle(session);
                }
            }
            maybe_event = input.next() => {
                let Some(raw) = maybe_event else {
                    warn!("terminal input stream ended");
                    break;
                };
                let event = raw.wrap_err("reading terminal input failed")?;
                let Some(ev) = ui::interpret_event(ui_state, event, controller.is_busy()) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Redraw => {}
                    ui::UserEvent::NextCase => controller.select_next_case(),
                    ui::UserEvent::PrevCase => controller.select_prev_case(),
                    ui::UserEvent::Buy => controller.open_selected(),
                    ui::UserEvent::DismissResult => controller.dismiss_result(),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
        ui::draw(ui_state, &controller.snapshot()).wrap_err("redraw failed")?;
    }

    if let Some(session) = ui_state.take_spin() {
        controller.settle(session);
    }
    controller.finish_pending();
    info!("UI loop finished");
    Ok(())
}
