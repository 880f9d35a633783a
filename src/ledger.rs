use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::BTreeMap,
    fmt,
};
use thiserror::Error;

#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    /// Case purchases are priced in Stars.
    Stars,
    /// Held in hundredths; display only.
    Ton,
}

impl Currency {
    pub fn ticker(self) -> &'static str {
        match self {
            Currency::Stars => "Stars",
            Currency::Ton => "TON",
        }
    }

    /// Renders an amount in this currency's minor units.
    pub fn format_amount(self, amount: u64) -> String {
        match self {
            Currency::Stars => format!("{amount} {}", self.ticker()),
            Currency::Ton => {
                format!("{}.{:02} {}", amount / 100, amount % 100, self.ticker())
            }
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ticker())
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient {currency}: need {required}, have {available}")]
    InsufficientFunds {
        currency: Currency,
        required: u64,
        available: u64,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    balances: BTreeMap<Currency, u64>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balances(balances: impl IntoIterator<Item = (Currency, u64)>) -> Self {
        Self {
            balances: balances.into_iter().collect(),
        }
    }

    pub fn balance(&self, currency: Currency) -> u64 {
        self.balances.get(&currency).copied().unwrap_or(0)
    }

    pub fn can_afford(&self, currency: Currency, amount: u64) -> bool {
        self.balance(currency) >= amount
    }

    /// All-or-nothing: the balance is untouched on failure.
    pub fn debit(&mut self, currency: Currency, amount: u64) -> Result<(), LedgerError> {
        let available = self.balance(currency);
        let remaining = available.checked_sub(amount).ok_or(
            LedgerError::InsufficientFunds {
                currency,
                required: amount,
                available,
            },
        )?;
        self.balances.insert(currency, remaining);
        Ok(())
    }

    pub fn credit(&mut self, currency: Currency, amount: u64) {
        let entry = self.balances.entry(currency).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    pub fn balances(&self) -> impl Iterator<Item = (Currency, u64)> + '_ {
        self.balances.iter().map(|(c, v)| (*c, *v))
    }
}
