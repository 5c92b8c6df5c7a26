use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use serde::Serialize;
use tidepool_amm::{
    AddLiquidity, AmmError, Exchange, LiquidityAdded, MemoryBank, PairRegistry, Receipt,
    RemoveLiquidity, Router, SwapExactIn, SwapExactOut, TokenClient,
};
use tidepool_core::{Address, AmmEvent, Amount, EventSink, Reserves, TokenId};
use tracing::{debug, info, warn};

use crate::config::{account_id, token_id, Action, ScenarioConfig};

/// Logs every committed event
struct LogSink;

impl EventSink for LogSink {
    fn on_events(&self, events: &[AmmEvent]) {
        for event in events {
            debug!("Event {}: {:?}", event.name(), event);
        }
    }
}

/// Value returned by a committed action
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Added(LiquidityAdded),
    Removed { amount_a: Amount, amount_b: Amount },
    Amounts(Vec<Amount>),
    Received(Amount),
    Synced(Reserves),
    Skimmed { amount0: Amount, amount1: Amount },
}

/// Outcome of one scenario action
#[derive(Debug, Serialize)]
pub struct ActionReport {
    pub index: usize,
    pub action: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub events: Vec<AmmEvent>,
}

/// Pair snapshot with symbols instead of raw token ids
#[derive(Debug, Serialize)]
pub struct PairView {
    pub pair: Address,
    pub token0: String,
    pub token1: String,
    pub reserve0: Amount,
    pub reserve1: Amount,
    pub total_supply: Amount,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub actions: Vec<ActionReport>,
    pub pairs: Vec<PairView>,
    pub balances: BTreeMap<String, BTreeMap<String, Amount>>,
}

/// In-memory exchange driven by a scenario file
pub struct Simulation {
    config: ScenarioConfig,
    exchange: Exchange,
    router: Router,
    symbols: BTreeMap<TokenId, String>,
}

impl Simulation {
    /// Fund accounts, configure tokens and approve the router everywhere
    pub fn new(config: ScenarioConfig) -> Result<Self> {
        config.validate()?;
        let router = Router::new(Address::from_label("tidepool:router"), config.timestamp);
        let mut exchange = Exchange::new(
            PairRegistry::new(Address::from_label("tidepool:registry")),
            MemoryBank::new(),
        );
        exchange.subscribe(Box::new(LogSink));

        let spender = router.address();
        exchange.seed(|bank| {
            for token in &config.tokens {
                let id = token_id(&token.symbol);
                bank.set_transfer_fee_bps(&id, token.transfer_fee_bps);
                for account in &config.accounts {
                    bank.approve(&id, &account_id(&account.name), &spender, Amount::MAX);
                }
            }
            for account in &config.accounts {
                let holder = account_id(&account.name);
                for (symbol, amount) in &account.balances {
                    bank.mint(&token_id(symbol), &holder, *amount)?;
                }
            }
            Ok(())
        })?;

        let symbols = config
            .tokens
            .iter()
            .map(|t| (token_id(&t.symbol), t.symbol.clone()))
            .collect();

        info!(
            "Scenario ready: {} tokens, {} accounts, {} actions",
            config.tokens.len(),
            config.accounts.len(),
            config.actions.len()
        );
        Ok(Simulation {
            config,
            exchange,
            router,
            symbols,
        })
    }

    /// Execute every action in order. A rejected action is reported and the
    /// run continues.
    pub fn run(&mut self) -> Vec<ActionReport> {
        let actions = self.config.actions.clone();
        actions
            .iter()
            .enumerate()
            .map(|(index, action)| match self.apply(action) {
                Ok(receipt) => ActionReport {
                    index,
                    action: action.name(),
                    ok: true,
                    result: Some(receipt.value),
                    error: None,
                    events: receipt.events,
                },
                Err(err) => {
                    warn!("Action {} ({}) rejected: {}", index, action.name(), err);
                    ActionReport {
                        index,
                        action: action.name(),
                        ok: false,
                        result: None,
                        error: Some(err.to_string()),
                        events: Vec::new(),
                    }
                }
            })
            .collect()
    }

    fn apply(&mut self, action: &Action) -> Result<Receipt<Outcome>, AmmError> {
        let router = self.router;
        let deadline = self.config.deadline();

        match action {
            Action::AddLiquidity {
                account,
                token_a,
                token_b,
                amount_a,
                amount_b,
                amount_a_min,
                amount_b_min,
            } => {
                let caller = account_id(account);
                let params = AddLiquidity {
                    token_a: token_id(token_a),
                    token_b: token_id(token_b),
                    amount_a_desired: *amount_a,
                    amount_b_desired: *amount_b,
                    amount_a_min: *amount_a_min,
                    amount_b_min: *amount_b_min,
                    to: caller,
                    deadline,
                };
                self.exchange
                    .execute(action.name(), |registry, bank, events| {
                        router
                            .add_liquidity(registry, bank, &caller, &params, events)
                            .map(Outcome::Added)
                    })
            }
            Action::RemoveLiquidity {
                account,
                token_a,
                token_b,
                liquidity,
                amount_a_min,
                amount_b_min,
            } => {
                let caller = account_id(account);
                let params = RemoveLiquidity {
                    token_a: token_id(token_a),
                    token_b: token_id(token_b),
                    liquidity: *liquidity,
                    amount_a_min: *amount_a_min,
                    amount_b_min: *amount_b_min,
                    to: caller,
                    deadline,
                };
                self.exchange
                    .execute(action.name(), |registry, bank, events| {
                        let ledger = registry
                            .ledger_for_mut(&params.token_a, &params.token_b)?;
                        ledger.approve_shares(&caller, &router.address(), params.liquidity);
                        let (amount_a, amount_b) =
                            router.remove_liquidity(registry, bank, &caller, &params, events)?;
                        Ok(Outcome::Removed { amount_a, amount_b })
                    })
            }
            Action::SwapExactIn {
                account,
                path,
                amount_in,
                amount_out_min,
                fee_on_transfer,
            } => {
                let caller = account_id(account);
                let params = SwapExactIn {
                    amount_in: *amount_in,
                    amount_out_min: *amount_out_min,
                    path: path.iter().map(|s| token_id(s)).collect(),
                    to: caller,
                    deadline,
                };
                let fee_on_transfer = *fee_on_transfer;
                self.exchange
                    .execute(action.name(), |registry, bank, events| {
                        if fee_on_transfer {
                            let received = router
                                .swap_exact_tokens_for_tokens_supporting_fee_on_transfer(
                                    registry, bank, &caller, &params, events,
                                )?;
                            Ok(Outcome::Received(received))
                        } else {
                            let amounts = router.swap_exact_tokens_for_tokens(
                                registry, bank, &caller, &params, events,
                            )?;
                            Ok(Outcome::Amounts(amounts))
                        }
                    })
            }
            Action::SwapExactOut {
                account,
                path,
                amount_out,
                amount_in_max,
            } => {
                let caller = account_id(account);
                let params = SwapExactOut {
                    amount_out: *amount_out,
                    amount_in_max: *amount_in_max,
                    path: path.iter().map(|s| token_id(s)).collect(),
                    to: caller,
                    deadline,
                };
                self.exchange
                    .execute(action.name(), |registry, bank, events| {
                        let amounts = router.swap_tokens_for_exact_tokens(
                            registry, bank, &caller, &params, events,
                        )?;
                        Ok(Outcome::Amounts(amounts))
                    })
            }
            Action::Sync { token_a, token_b } => {
                let (token_a, token_b) = (token_id(token_a), token_id(token_b));
                self.exchange
                    .execute(action.name(), |registry, bank, events| {
                        let reserves = registry
                            .ledger_for_mut(&token_a, &token_b)?
                            .sync(bank, events)?;
                        Ok(Outcome::Synced(reserves))
                    })
            }
            Action::Skim {
                account,
                token_a,
                token_b,
            } => {
                let to = account_id(account);
                let (token_a, token_b) = (token_id(token_a), token_id(token_b));
                self.exchange
                    .execute(action.name(), |registry, bank, _| {
                        let (excess0, excess1) =
                            registry.ledger_for(&token_a, &token_b)?.skim(bank, &to)?;
                        Ok(Outcome::Skimmed {
                            amount0: excess0,
                            amount1: excess1,
                        })
                    })
            }
        }
    }

    /// Price `amount` along `path` against the current reserves
    pub fn quote(&self, path: &[String], amount: Amount, exact_out: bool) -> Result<Vec<Amount>> {
        let mut route = Vec::with_capacity(path.len());
        for symbol in path {
            if !self.config.tokens.iter().any(|t| &t.symbol == symbol) {
                return Err(anyhow!("Unknown token: {}", symbol));
            }
            route.push(token_id(symbol));
        }

        let registry = self.exchange.registry();
        let amounts = if exact_out {
            self.router.get_amounts_in(registry, amount, &route)?
        } else {
            self.router.get_amounts_out(registry, amount, &route)?
        };
        Ok(amounts)
    }

    pub fn pairs(&self) -> Result<Vec<PairView>> {
        let infos = self.exchange.registry().pairs()?;
        Ok(infos
            .into_iter()
            .map(|info| PairView {
                pair: info.pair,
                token0: self.symbol(&info.token0),
                token1: self.symbol(&info.token1),
                reserve0: info.reserve0,
                reserve1: info.reserve1,
                total_supply: info.total_supply,
            })
            .collect())
    }

    /// Token balances per account, by symbol
    pub fn balances(&self) -> Result<BTreeMap<String, BTreeMap<String, Amount>>> {
        let tokens = self.exchange.tokens();
        let mut balances = BTreeMap::new();
        for account in &self.config.accounts {
            let holder = account_id(&account.name);
            let mut held = BTreeMap::new();
            for t in &self.config.tokens {
                let amount = tokens.balance_of(&token_id(&t.symbol), &holder)?;
                held.insert(t.symbol.clone(), amount);
            }
            balances.insert(account.name.clone(), held);
        }
        Ok(balances)
    }

    pub fn report(&self, actions: Vec<ActionReport>) -> Result<Report> {
        Ok(Report {
            actions,
            pairs: self.pairs()?,
            balances: self.balances()?,
        })
    }

    fn symbol(&self, token: &TokenId) -> String {
        self.symbols
            .get(token)
            .cloned()
            .unwrap_or_else(|| token.to_hex())
    }
}
