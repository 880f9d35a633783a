pub mod catalog;

pub mod draw;

pub mod inventory;

pub mod ledger;

pub mod session;

pub mod store;

pub mod test_helpers;

pub use catalog::{
    CaseDefinition,
    CatalogError,
    CatalogStore,
    GiftDefinition,
    Rarity,
    UnknownCase,
};
pub use draw::{
    RandomSource,
    roll,
};
pub use inventory::{
    Inventory,
    InventoryItem,
    ItemId,
};
pub use ledger::{
    Currency,
    Ledger,
    LedgerError,
};
pub use session::{
    AnimationPort,
    Completion,
    Phase,
    SessionError,
    SessionId,
    SessionMachine,
    SpinRequest,
    WheelOption,
};
pub use store::{
    InMemoryProfileStore,
    JsonFileProfileStore,
    ProfileState,
    ProfileStore,
    StoreError,
};
