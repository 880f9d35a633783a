use crate::{
    catalog::{
        CaseDefinition,
        CatalogStore,
        GiftDefinition,
        Rarity,
        UnknownCase,
    },
    draw::{
        RandomSource,
        roll,
    },
    inventory::{
        Inventory,
        InventoryItem,
        ItemId,
    },
    ledger::{
        Currency,
        Ledger,
        LedgerError,
    },
    store::ProfileState,
};
use chrono::{
    DateTime,
    Utc,
};
use std::{
    fmt,
    sync::Arc,
};
use thiserror::Error;
use tracing::{
    debug,
    info,
    warn,
};

/// Currency every case is priced in.
pub const PURCHASE_CURRENCY: Currency = Currency::Stars;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Phase {
    #[default]
    Idle,
    Validating,
    Rejected,
    Drawing,
    Animating,
    Settling,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Validating => "validating",
            Phase::Rejected => "rejected",
            Phase::Drawing => "drawing",
            Phase::Animating => "animating",
            Phase::Settling => "settling",
        }
    }
}

/// One wheel segment handed to the animation.
#[derive(Clone, Debug, PartialEq)]
pub struct WheelOption {
    pub gift_id: String,
    pub name: String,
    pub rarity: Rarity,
    /// Normalized share of the wheel, `0.0..=1.0`.
    pub share: f64,
}

impl WheelOption {
    pub fn for_case(case: &CaseDefinition) -> Vec<Self> {
        case.gifts
            .iter()
            .zip(case.drop_chances())
            .map(|(gift, share)| WheelOption {
                gift_id: gift.id.clone(),
                name: gift.name.clone(),
                rarity: gift.rarity,
                share,
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpinRequest {
    pub session: SessionId,
    pub case_id: String,
    pub outcome_index: usize,
    pub options: Vec<WheelOption>,
}

/// Plays the draw for the user.
///
/// Implementations must report completion for `request.session` exactly once
/// through [`SessionMachine::on_animation_complete`]; extra or stale reports
/// are tolerated and ignored.
pub trait AnimationPort {
    fn start(&mut self, request: SpinRequest);
}

/// The in-flight opening between purchase and settlement.
#[derive(Clone, Debug, PartialEq)]
pub struct OpeningSession {
    pub id: SessionId,
    pub case_id: String,
    pub outcome_index: usize,
    pub gift: GiftDefinition,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("a case opening is already in progress ({active})")]
    SessionAlreadyActive { active: SessionId },

    #[error(transparent)]
    UnknownCase(#[from] UnknownCase),

    #[error("not enough {currency} to open {case_id}: costs {required}, balance {available}")]
    InsufficientFunds {
        case_id: String,
        currency: Currency,
        required: u64,
        available: u64,
    },

    #[error("case {case_id} has no gift to draw")]
    EmptyPool { case_id: String },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Completion {
    Settled(InventoryItem),
    /// No live animation for that session; nothing changed.
    DuplicateSignal,
}

pub type Clock = fn() -> DateTime<Utc>;

pub struct SessionMachine<R, A> {
    catalog: Arc<CatalogStore>,
    ledger: Ledger,
    inventory: Inventory,
    random: R,
    animation: A,
    phase: Phase,
    active: Option<OpeningSession>,
    last_result: Option<InventoryItem>,
    next_session: u64,
    next_item_seq: u64,
    clock: Clock,
}

impl<R: RandomSource, A: AnimationPort> SessionMachine<R, A> {
    pub fn new(
        catalog: Arc<CatalogStore>,
        profile: ProfileState,
        random: R,
        animation: A,
    ) -> Self {
        let ProfileState {
            ledger,
            items,
            next_item_seq,
        } = profile;
        Self {
            catalog,
            ledger,
            inventory: Inventory::from_items(items),
            random,
            animation,
            phase: Phase::Idle,
            active: None,
            last_result: None,
            next_session: 1,
            next_item_seq,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Validates, debits and draws in one step, then hands the outcome to
    /// the animation. Nothing is mutated when an error is returned.
    pub fn begin(&mut self, case_id: &str) -> Result<SessionId, SessionError> {
        if let Some(active) = &self.active {
            debug!(requested = case_id, active = %active.id, "rejecting begin while busy");
            return Err(SessionError::SessionAlreadyActive { active: active.id });
        }

        let catalog = Arc::clone(&self.catalog);
        let case = catalog.get_case(case_id)?;

        self.transition(Phase::Validating);
        let available = self.ledger.balance(PURCHASE_CURRENCY);
        if available < case.open_cost {
            self.transition(Phase::Rejected);
            self.transition(Phase::Idle);
            info!(
                case = case_id,
                cost = case.open_cost,
                balance = available,
                "not enough funds to open case"
            );
            return Err(SessionError::InsufficientFunds {
                case_id: case_id.to_string(),
                currency: PURCHASE_CURRENCY,
                required: case.open_cost,
                available,
            });
        }

        self.transition(Phase::Drawing);
        if let Err(LedgerError::InsufficientFunds {
            currency,
            required,
            available,
        }) = self.ledger.debit(PURCHASE_CURRENCY, case.open_cost)
        {
            self.transition(Phase::Idle);
            return Err(SessionError::InsufficientFunds {
                case_id: case_id.to_string(),
                currency,
                required,
                available,
            });
        }

        let Some(outcome_index) = roll(&case.weights(), &mut self.random) else {
            warn!(case = case_id, "empty gift pool reached the draw; refunding");
            self.ledger.credit(PURCHASE_CURRENCY, case.open_cost);
            self.transition(Phase::Idle);
            return Err(SessionError::EmptyPool {
                case_id: case_id.to_string(),
            });
        };

        let id = SessionId(self.next_session);
        self.next_session += 1;
        let gift = case.gifts[outcome_index].clone();
        info!(
            session = %id,
            case = case_id,
            cost = case.open_cost,
            outcome = outcome_index,
            gift = %gift.id,
            balance = self.ledger.balance(PURCHASE_CURRENCY),
            "case opened"
        );
        self.active = Some(OpeningSession {
            id,
            case_id: case.id.clone(),
            outcome_index,
            gift,
        });
        self.transition(Phase::Animating);
        self.animation.start(SpinRequest {
            session: id,
            case_id: case.id.clone(),
            outcome_index,
            options: WheelOption::for_case(case),
        });
        Ok(id)
    }

    /// Settles `session` into the inventory. Signals arriving outside the
    /// live animation of that session change nothing.
    pub fn on_animation_complete(&mut self, session: SessionId) -> Completion {
        if self.phase != Phase::Animating {
            debug!(%session, phase = self.phase.label(), "ignoring completion signal");
            return Completion::DuplicateSignal;
        }
        let Some(opening) = self.active.take_if(|s| s.id == session) else {
            debug!(%session, "ignoring completion signal for stale session");
            return Completion::DuplicateSignal;
        };

        self.transition(Phase::Settling);
        let seq = self.next_item_seq;
        self.next_item_seq += 1;
        let item = InventoryItem::from_gift(
            ItemId::new(&opening.gift.id, seq),
            &opening.case_id,
            &opening.gift,
            (self.clock)(),
        );
        self.inventory.add(item.clone());
        self.last_result = Some(item.clone());
        self.transition(Phase::Idle);
        info!(
            session = %opening.id,
            item = %item.id,
            rarity = %item.rarity,
            "case settled"
        );
        Completion::Settled(item)
    }

    /// Dismisses the last result; never touches funds or sessions.
    pub fn reset(&mut self) {
        self.last_result = None;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_session(&self) -> Option<&OpeningSession> {
        self.active.as_ref()
    }

    pub fn last_result(&self) -> Option<&InventoryItem> {
        self.last_result.as_ref()
    }

    pub fn balance(&self) -> u64 {
        self.ledger.balance(PURCHASE_CURRENCY)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn animation(&self) -> &A {
        &self.animation
    }

    pub fn animation_mut(&mut self) -> &mut A {
        &mut self.animation
    }

    /// What a profile store needs to restore balances and items later.
    pub fn profile(&self) -> ProfileState {
        ProfileState {
            ledger: self.ledger.clone(),
            items: self.inventory.list().to_vec(),
            next_item_seq: self.next_item_seq,
        }
    }

    fn transition(&mut self, to: Phase) {
        debug!(from = self.phase.label(), to = to.label(), "session phase");
        self.phase = to;
    }
}
