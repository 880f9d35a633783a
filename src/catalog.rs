use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::HashSet,
    fmt,
    fs,
    path::Path,
};
use thiserror::Error;
use tracing::{
    info,
    warn,
};

#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Mythic,
    Legendary,
}

impl Rarity {
    pub fn label(self) -> &'static str {
        match self {
            Rarity::Common => "Common",
            Rarity::Rare => "Rare",
            Rarity::Mythic => "Mythic",
            Rarity::Legendary => "Legendary",
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GiftDefinition {
    pub id: String,
    pub name: String,
    pub rarity: Rarity,
    /// Approximate worth in Stars, shown next to owned items.
    pub value: u64,
    #[serde(default)]
    pub image_url: String,
    pub drop_weight: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaseDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    pub open_cost: u64,
    pub gifts: Vec<GiftDefinition>,
}

impl CaseDefinition {
    pub fn weights(&self) -> Vec<f64> {
        self.gifts.iter().map(|g| g.drop_weight).collect()
    }

    pub fn total_weight(&self) -> f64 {
        self.gifts.iter().map(|g| g.drop_weight).sum()
    }

    /// Normalized probability of each gift, in pool order.
    pub fn drop_chances(&self) -> Vec<f64> {
        let total = self.total_weight();
        if total <= 0.0 {
            return vec![0.0; self.gifts.len()];
        }
        self.gifts.iter().map(|g| g.drop_weight / total).collect()
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.gifts.is_empty() {
            return Err(CatalogError::EmptyPool {
                case_id: self.id.clone(),
            });
        }
        if self.open_cost == 0 {
            return Err(CatalogError::FreeCase {
                case_id: self.id.clone(),
            });
        }
        let mut seen = HashSet::new();
        for gift in &self.gifts {
            if !gift.drop_weight.is_finite() || gift.drop_weight < 0.0 {
                return Err(CatalogError::InvalidWeight {
                    case_id: self.id.clone(),
                    gift_id: gift.id.clone(),
                    weight: gift.drop_weight,
                });
            }
            if !seen.insert(gift.id.as_str()) {
                return Err(CatalogError::DuplicateGift {
                    case_id: self.id.clone(),
                    gift_id: gift.id.clone(),
                });
            }
        }
        let total = self.total_weight();
        if total <= 0.0 {
            return Err(CatalogError::ZeroWeight {
                case_id: self.id.clone(),
            });
        }
        if !total.is_finite() {
            return Err(CatalogError::WeightOverflow {
                case_id: self.id.clone(),
            });
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("case {case_id} has no gifts")]
    EmptyPool { case_id: String },

    #[error("case {case_id} has drop weights summing to zero")]
    ZeroWeight { case_id: String },

    #[error("case {case_id}: gift {gift_id} has invalid drop weight {weight}")]
    InvalidWeight {
        case_id: String,
        gift_id: String,
        weight: f64,
    },

    #[error("case {case_id} has drop weights too large to sum")]
    WeightOverflow { case_id: String },

    #[error("case {case_id} has an open cost of zero")]
    FreeCase { case_id: String },

    #[error("case {case_id} lists gift {gift_id} more than once")]
    DuplicateGift { case_id: String, gift_id: String },

    #[error("case id {case_id} is defined more than once")]
    DuplicateCase { case_id: String },

    #[error("failed to read catalog file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse catalog file {path}: {reason}")]
    Parse { path: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown case {0}")]
pub struct UnknownCase(pub String);

#[derive(Serialize, Deserialize)]
struct CatalogFile {
    cases: Vec<CaseDefinition>,
}

/// Read-only case definitions, validated once at load.
#[derive(Clone, Debug, Default)]
pub struct CatalogStore {
    cases: Vec<CaseDefinition>,
    rejected: Vec<CatalogError>,
}

impl CatalogStore {
    /// Keeps every valid definition and records the rest as rejected so a
    /// bad case is never offered but does not take the others down with it.
    pub fn load(definitions: Vec<CaseDefinition>) -> Self {
        let mut cases: Vec<CaseDefinition> = Vec::with_capacity(definitions.len());
        let mut rejected = Vec::new();
        for def in definitions {
            let outcome = if cases.iter().any(|c| c.id == def.id) {
                Err(CatalogError::DuplicateCase {
                    case_id: def.id.clone(),
                })
            } else {
                def.validate()
            };
            match outcome {
                Ok(()) => cases.push(def),
                Err(err) => {
                    warn!(error = %err, "rejecting case definition");
                    rejected.push(err);
                }
            }
        }
        info!(
            cases = cases.len(),
            rejected = rejected.len(),
            "catalog loaded"
        );
        Self { cases, rejected }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| CatalogError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_slice(&data).map_err(|e| match e {
            CatalogError::Parse { reason, .. } => CatalogError::Parse {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    pub fn from_json_slice(data: &[u8]) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            serde_json::from_slice(data).map_err(|e| CatalogError::Parse {
                path: String::from("<memory>"),
                reason: e.to_string(),
            })?;
        Ok(Self::load(file.cases))
    }

    pub fn get_case(&self, id: &str) -> Result<&CaseDefinition, UnknownCase> {
        self.cases
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| UnknownCase(id.to_string()))
    }

    pub fn cases(&self) -> &[CaseDefinition] {
        &self.cases
    }

    pub fn rejected(&self) -> &[CatalogError] {
        &self.rejected
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn builtin() -> Self {
        Self::load(default_cases())
    }

    /// Skips validation; lets tests reach states a loaded catalog rules out.
    #[cfg(test)]
    pub(crate) fn unchecked(cases: Vec<CaseDefinition>) -> Self {
        Self {
            cases,
            rejected: Vec::new(),
        }
    }
}

fn gift(
    id: &str,
    name: &str,
    rarity: Rarity,
    value: u64,
    image: &str,
    drop_weight: f64,
) -> GiftDefinition {
    GiftDefinition {
        id: id.to_string(),
        name: name.to_string(),
        rarity,
        value,
        image_url: format!("/images/gifts/{image}.png"),
        drop_weight,
    }
}

/// The three cases shipped with the app when no catalog file is configured.
pub fn default_cases() -> Vec<CaseDefinition> {
    vec![
        CaseDefinition {
            id: String::from("new-year"),
            name: String::from("New Year Drop"),
            description: String::from("Holiday gifts and stickers for the New Year."),
            image_url: String::from("/images/cases/new-year.png"),
            open_cost: 500,
            gifts: vec![
                gift("ny-hat", "Santa Hat", Rarity::Common, 200, "santa-hat", 0.55),
                gift(
                    "ny-fireworks",
                    "Fireworks Scene",
                    Rarity::Rare,
                    750,
                    "fireworks",
                    0.30,
                ),
                gift(
                    "ny-golden-tree",
                    "Golden Tree",
                    Rarity::Legendary,
                    3000,
                    "golden-tree",
                    0.15,
                ),
            ],
        },
        CaseDefinition {
            id: String::from("memes"),
            name: String::from("Meme Pack"),
            description: String::from("Meme gifts and collectible art."),
            image_url: String::from("/images/cases/memes.png"),
            open_cost: 800,
            gifts: vec![
                gift("mm-clown", "Clown Moment", Rarity::Common, 150, "clown", 0.70),
                gift(
                    "mm-doge",
                    "Doge Rocket",
                    Rarity::Mythic,
                    2500,
                    "doge-rocket",
                    0.22,
                ),
                gift(
                    "mm-pepe",
                    "Gold Pepe",
                    Rarity::Legendary,
                    6500,
                    "gold-pepe",
                    0.08,
                ),
            ],
        },
        CaseDefinition {
            id: String::from("ton-whales"),
            name: String::from("TON Whales"),
            description: String::from("Gifts for TON maximalists."),
            image_url: String::from("/images/cases/ton-whales.png"),
            open_cost: 1500,
            gifts: vec![
                gift(
                    "tw-star-rain",
                    "Star Rain",
                    Rarity::Common,
                    300,
                    "star-rain",
                    0.25,
                ),
                gift(
                    "tw-diamond-hands",
                    "Diamond Hands",
                    Rarity::Rare,
                    1200,
                    "diamond-hands",
                    0.40,
                ),
                gift(
                    "tw-ton-whale",
                    "TON Whale",
                    Rarity::Mythic,
                    4000,
                    "ton-whale",
                    0.35,
                ),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn case_with(id: &str, weights: &[f64]) -> CaseDefinition {
        CaseDefinition {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            image_url: String::new(),
            open_cost: 100,
            gifts: weights
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    gift(&format!("{id}-{i}"), "Gift", Rarity::Common, 10, "g", *w)
                })
                .collect(),
        }
    }

    #[test]
    fn load__keeps_valid_cases_in_definition_order() {
        // when
        let store = CatalogStore::builtin();

        // then
        let ids: Vec<_> = store.cases().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["new-year", "memes", "ton-whales"]);
        assert!(store.rejected().is_empty());
    }

    #[test]
    fn load__rejects_weights_overflowing_to_infinity() {
        // given
        let defs = vec![
            case_with("huge", &[f64::MAX, f64::MAX]),
            case_with("ok", &[1.0]),
        ];

        // when
        let store = CatalogStore::load(defs);

        // then
        assert!(store.get_case("huge").is_err());
        assert!(store.get_case("ok").is_ok());
        assert_eq!(
            store.rejected(),
            &[CatalogError::WeightOverflow {
                case_id: String::from("huge")
            }]
        );
    }

    #[test]
    fn load__accepts_large_weights_with_finite_total() {
        let store =
            CatalogStore::load(vec![case_with("big", &[f64::MAX / 4.0, f64::MAX / 4.0])]);

        let case = store.get_case("big").unwrap();

        assert_eq!(case.drop_chances(), vec![0.5, 0.5]);
    }

    #[test]
    fn load__rejects_empty_pool_without_dropping_other_cases() {
        // given
        let defs = vec![case_with("empty", &[]), case_with("ok", &[1.0])];

        // when
        let store = CatalogStore::load(defs);

        // then
        assert!(store.get_case("ok").is_ok());
        assert_eq!(
            store.get_case("empty"),
            Err(UnknownCase(String::from("empty")))
        );
        assert_eq!(
            store.rejected(),
            &[CatalogError::EmptyPool {
                case_id: String::from("empty")
            }]
        );
    }

    #[test]
    fn load__rejects_weights_summing_to_zero() {
        let store = CatalogStore::load(vec![case_with("zero", &[0.0, 0.0])]);

        assert!(store.is_empty());
        assert_eq!(
            store.rejected(),
            &[CatalogError::ZeroWeight {
                case_id: String::from("zero")
            }]
        );
    }

    #[test]
    fn load__rejects_negative_and_nan_weights() {
        let store = CatalogStore::load(vec![
            case_with("neg", &[1.0, -0.5]),
            case_with("nan", &[f64::NAN]),
        ]);

        assert!(store.is_empty());
        assert_eq!(store.rejected().len(), 2);
    }

    #[test]
    fn load__rejects_duplicate_case_ids_keeping_the_first() {
        let mut second = case_with("dup", &[1.0]);
        second.open_cost = 999;

        let store = CatalogStore::load(vec![case_with("dup", &[1.0]), second]);

        assert_eq!(store.get_case("dup").unwrap().open_cost, 100);
        assert_eq!(
            store.rejected(),
            &[CatalogError::DuplicateCase {
                case_id: String::from("dup")
            }]
        );
    }

    #[test]
    fn load__rejects_free_cases_and_duplicate_gifts() {
        let mut free = case_with("free", &[1.0]);
        free.open_cost = 0;
        let mut twice = case_with("twice", &[1.0, 1.0]);
        twice.gifts[1].id = twice.gifts[0].id.clone();

        let store = CatalogStore::load(vec![free, twice]);

        assert!(store.is_empty());
        assert!(matches!(
            store.rejected(),
            [CatalogError::FreeCase { .. }, CatalogError::DuplicateGift { .. }]
        ));
    }

    #[test]
    fn drop_chances__normalizes_unscaled_weights() {
        let case = case_with("scaled", &[2.0, 6.0]);

        assert_eq!(case.drop_chances(), vec![0.25, 0.75]);
    }

    #[test]
    fn from_json_slice__reads_catalog_file_shape() {
        // given
        let json = r#"{
            "cases": [{
                "id": "tiny",
                "name": "Tiny",
                "open_cost": 10,
                "gifts": [{
                    "id": "pebble",
                    "name": "Pebble",
                    "rarity": "mythic",
                    "value": 5,
                    "image_url": "/pebble.png",
                    "drop_weight": 3.5
                }]
            }]
        }"#;

        // when
        let store = CatalogStore::from_json_slice(json.as_bytes()).unwrap();

        // then
        let case = store.get_case("tiny").unwrap();
        assert_eq!(case.gifts[0].rarity, Rarity::Mythic);
        assert_eq!(case.description, "");
    }

    #[test]
    fn from_json_slice__reports_malformed_input() {
        let err = CatalogStore::from_json_slice(b"{ not json").unwrap_err();

        assert!(matches!(err, CatalogError::Parse { .. }));
    }

    #[test]
    fn rarity__orders_by_ascending_scarcity() {
        assert!(Rarity::Common < Rarity::Rare);
        assert!(Rarity::Rare < Rarity::Mythic);
        assert!(Rarity::Mythic < Rarity::Legendary);
    }
}
