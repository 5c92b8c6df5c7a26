use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tidepool_core::{Address, Amount, TokenId};

/// Scenario configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Clock the router checks deadlines against (unix seconds)
    pub timestamp: u64,

    /// Deadline granted to every action, relative to `timestamp`
    pub deadline_secs: u64,

    /// Tokens known to the in-memory bank
    pub tokens: Vec<TokenEntry>,

    /// Funded accounts; every account approves the router for all tokens
    pub accounts: Vec<AccountEntry>,

    /// Actions executed in order, each atomically
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEntry {
    pub symbol: String,
    /// Basis points burned on every transfer
    #[serde(default)]
    pub transfer_fee_bps: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountEntry {
    pub name: String,
    /// Starting balance per token symbol
    pub balances: BTreeMap<String, Amount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    AddLiquidity {
        account: String,
        token_a: String,
        token_b: String,
        #[serde(with = "tidepool_core::serialize::amount")]
        amount_a: Amount,
        #[serde(with = "tidepool_core::serialize::amount")]
        amount_b: Amount,
        #[serde(default, with = "tidepool_core::serialize::amount")]
        amount_a_min: Amount,
        #[serde(default, with = "tidepool_core::serialize::amount")]
        amount_b_min: Amount,
    },
    RemoveLiquidity {
        account: String,
        token_a: String,
        token_b: String,
        #[serde(with = "tidepool_core::serialize::amount")]
        liquidity: Amount,
        #[serde(default, with = "tidepool_core::serialize::amount")]
        amount_a_min: Amount,
        #[serde(default, with = "tidepool_core::serialize::amount")]
        amount_b_min: Amount,
    },
    SwapExactIn {
        account: String,
        path: Vec<String>,
        #[serde(with = "tidepool_core::serialize::amount")]
        amount_in: Amount,
        #[serde(default, with = "tidepool_core::serialize::amount")]
        amount_out_min: Amount,
        /// Price each hop from what the pair actually received
        #[serde(default)]
        fee_on_transfer: bool,
    },
    SwapExactOut {
        account: String,
        path: Vec<String>,
        #[serde(with = "tidepool_core::serialize::amount")]
        amount_out: Amount,
        #[serde(with = "tidepool_core::serialize::amount")]
        amount_in_max: Amount,
    },
    Sync {
        token_a: String,
        token_b: String,
    },
    Skim {
        account: String,
        token_a: String,
        token_b: String,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::AddLiquidity { .. } => "add_liquidity",
            Action::RemoveLiquidity { .. } => "remove_liquidity",
            Action::SwapExactIn { .. } => "swap_exact_in",
            Action::SwapExactOut { .. } => "swap_exact_out",
            Action::Sync { .. } => "sync",
            Action::Skim { .. } => "skim",
        }
    }

    fn tokens(&self) -> Vec<&str> {
        match self {
            Action::AddLiquidity { token_a, token_b, .. }
            | Action::RemoveLiquidity { token_a, token_b, .. }
            | Action::Sync { token_a, token_b }
            | Action::Skim { token_a, token_b, .. } => vec![token_a.as_str(), token_b.as_str()],
            Action::SwapExactIn { path, .. } | Action::SwapExactOut { path, .. } => {
                path.iter().map(String::as_str).collect()
            }
        }
    }

    fn account(&self) -> Option<&str> {
        match self {
            Action::AddLiquidity { account, .. }
            | Action::RemoveLiquidity { account, .. }
            | Action::SwapExactIn { account, .. }
            | Action::SwapExactOut { account, .. }
            | Action::Skim { account, .. } => Some(account.as_str()),
            Action::Sync { .. } => None,
        }
    }
}

impl ScenarioConfig {
    /// Load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ScenarioConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject duplicate names and references to unknown tokens or accounts
    pub fn validate(&self) -> Result<()> {
        let mut symbols = BTreeSet::new();
        for token in &self.tokens {
            if !symbols.insert(token.symbol.as_str()) {
                bail!("Duplicate token symbol: {}", token.symbol);
            }
        }

        let mut names = BTreeSet::new();
        for account in &self.accounts {
            if !names.insert(account.name.as_str()) {
                bail!("Duplicate account: {}", account.name);
            }
            for symbol in account.balances.keys() {
                if !symbols.contains(symbol.as_str()) {
                    bail!("Account {} holds unknown token {}", account.name, symbol);
                }
            }
        }

        for (index, action) in self.actions.iter().enumerate() {
            for symbol in action.tokens() {
                if !symbols.contains(symbol) {
                    bail!("Action {} ({}) uses unknown token {}", index, action.name(), symbol);
                }
            }
            if let Some(account) = action.account() {
                if !names.contains(account) {
                    bail!("Action {} ({}) uses unknown account {}", index, action.name(), account);
                }
            }
        }
        Ok(())
    }

    /// Deadline handed to every router call
    pub fn deadline(&self) -> u64 {
        self.timestamp.saturating_add(self.deadline_secs)
    }
}

/// Deterministic token identity for a symbol
pub fn token_id(symbol: &str) -> TokenId {
    Address::from_label(&format!("token:{}", symbol))
}

/// Deterministic account identity for a name
pub fn account_id(name: &str) -> Address {
    Address::from_label(&format!("account:{}", name))
}

/// Generate a sample scenario: two pools, a two-hop trade and a fee-on-transfer token
pub fn generate_sample_config() -> ScenarioConfig {
    let tokens = vec![
        TokenEntry { symbol: "USDC".into(), transfer_fee_bps: 0 },
        TokenEntry { symbol: "WETH".into(), transfer_fee_bps: 0 },
        TokenEntry { symbol: "DAI".into(), transfer_fee_bps: 0 },
        TokenEntry { symbol: "TAX".into(), transfer_fee_bps: 100 },
    ];
    let funded = |amount: Amount| -> BTreeMap<String, Amount> {
        tokens.iter().map(|t| (t.symbol.clone(), amount)).collect()
    };
    let accounts = vec![
        AccountEntry { name: "lp".into(), balances: funded(10_000_000_000_000) },
        AccountEntry { name: "trader".into(), balances: funded(1_000_000_000) },
    ];

    let actions = vec![
        Action::AddLiquidity {
            account: "lp".into(),
            token_a: "USDC".into(),
            token_b: "WETH".into(),
            amount_a: 2_000_000_000_000,
            amount_b: 1_000_000_000,
            amount_a_min: 0,
            amount_b_min: 0,
        },
        Action::AddLiquidity {
            account: "lp".into(),
            token_a: "WETH".into(),
            token_b: "DAI".into(),
            amount_a: 1_000_000_000,
            amount_b: 2_000_000_000_000,
            amount_a_min: 0,
            amount_b_min: 0,
        },
        Action::AddLiquidity {
            account: "lp".into(),
            token_a: "TAX".into(),
            token_b: "USDC".into(),
            amount_a: 5_000_000_000,
            amount_b: 5_000_000_000,
            amount_a_min: 0,
            amount_b_min: 0,
        },
        Action::SwapExactIn {
            account: "trader".into(),
            path: vec!["USDC".into(), "WETH".into(), "DAI".into()],
            amount_in: 100_000_000,
            amount_out_min: 0,
            fee_on_transfer: false,
        },
        Action::SwapExactOut {
            account: "trader".into(),
            path: vec!["DAI".into(), "WETH".into()],
            amount_out: 10_000,
            amount_in_max: 100_000_000,
        },
        Action::SwapExactIn {
            account: "trader".into(),
            path: vec!["TAX".into(), "USDC".into()],
            amount_in: 1_000_000,
            amount_out_min: 0,
            fee_on_transfer: true,
        },
        Action::RemoveLiquidity {
            account: "lp".into(),
            token_a: "WETH".into(),
            token_b: "USDC".into(),
            liquidity: 1_000_000,
            amount_a_min: 0,
            amount_b_min: 0,
        },
    ];

    ScenarioConfig {
        timestamp: 1_700_000_000,
        deadline_secs: 600,
        tokens,
        accounts,
        actions,
    }
}
