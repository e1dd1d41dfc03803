//! The relayer fee market.
//!
//! Relayers enroll with a quoted fee and locked collateral. Each accepted
//! message opens an order assigned to the `K` cheapest eligible relayers;
//! settlement on delivery confirmation rewards whoever actually carried the
//! proofs and penalizes an assigned set that sat past its deadlines.

use std::collections::BTreeMap;

use ethers_core::types::{Address, U256};
use tracing::{debug, info, warn};

use crate::types::LaneId;

/// Fee market errors
#[derive(Debug, thiserror::Error)]
pub enum FeeMarketError {
    /// Enrollment collateral below the per-order requirement
    #[error("Insufficient collateral: required {required}, got {got}")]
    InsufficientCollateral {
        /// The per-order requirement
        required: U256,
        /// The offered collateral
        got: U256,
    },
    /// The predecessor hint does not immediately precede the correct slot
    #[error("Enrollment hint does not precede the correct slot")]
    InvalidHint,
    /// Not enough eligible relayers to assign an order
    #[error("Insufficient relayers: {eligible} eligible, {required} required")]
    InsufficientRelayers {
        /// Relayers currently eligible for assignment
        eligible: usize,
        /// The configured assignment size
        required: usize,
    },
    /// The address is not enrolled
    #[error("Unknown relayer: {0}")]
    UnknownRelayer(Address),
    /// No open order with this id
    #[error("Unknown or already settled order: {0}")]
    UnknownOrder(u64),
    /// An order with this id is already open
    #[error("Order already open: {0}")]
    OrderExists(u64),
    /// Withdrawal would dip into collateral locked by open orders
    #[error("Collateral locked: {locked} locked, {requested} requested of {free} free")]
    CollateralLocked {
        /// Collateral locked by open orders
        locked: U256,
        /// The requested withdrawal
        requested: U256,
        /// Collateral free to withdraw
        free: U256,
    },
}

/// Fixed market parameters. Set at construction, not runtime-mutable.
#[derive(Debug, Clone)]
pub struct FeeMarketConfig {
    /// Destination of slashed collateral
    pub vault: Address,
    /// Collateral locked per assigned relayer per order
    pub collateral_per_order: U256,
    /// Assignment size `K`
    pub assigned_relayers_number: usize,
    /// Seconds an assigned set has to deliver at full reward
    pub relay_time: u64,
    /// Seconds until the assigned set's collateral is fully forfeit
    pub slash_time: u64,
    /// Percent of the reward pool paid to delivering relayers; the
    /// remainder goes to the confirming relayer
    pub delivery_share_percent: u32,
}

impl FeeMarketConfig {
    fn late_penalty(&self) -> U256 {
        self.collateral_per_order / 5
    }
}

/// An enrolled relayer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relayer {
    /// The relayer's address
    pub address: Address,
    /// Quoted fee per order
    pub fee: U256,
    /// Total collateral on deposit
    pub collateral: U256,
    /// Collateral locked by open orders
    pub locked: U256,
    /// When the relayer enrolled (or last re-enrolled)
    pub enrolled_at: u64,
}

impl Relayer {
    fn free_collateral(&self) -> U256 {
        self.collateral.saturating_sub(self.locked)
    }
}

/// A relayer assignment recorded inside an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignedRelayer {
    /// The assigned relayer
    pub address: Address,
    /// Their quoted fee at assignment time
    pub fee: U256,
}

/// How a settled order resolved against its deadlines.
///
/// Stored orders are always awaiting settlement; settling removes the order
/// and the outcome travels in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// Confirmed within `relay_time`
    RelayedOnTime,
    /// Confirmed between `relay_time` and `slash_time`
    RelayedLate,
    /// Confirmed after `slash_time`; assigned collateral forfeited
    Slashed,
}

/// One unit of relayer assignment and reward/slash accounting, keyed by the
/// message nonce it covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// The covered nonce
    pub id: u64,
    /// The lane the message travels on
    pub lane: LaneId,
    /// Order price: the `K`-th lowest quoted fee at assignment
    pub fee: U256,
    /// The assigned relayer set, cheapest first
    pub assigned: Vec<AssignedRelayer>,
    /// Assignment time
    pub created_at: u64,
    /// Full-reward deadline
    pub relay_deadline: u64,
    /// Collateral-forfeit deadline
    pub slash_deadline: u64,
}

/// Outcome of settling one order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementReport {
    /// The settled order
    pub order_id: u64,
    /// How the order resolved
    pub outcome: SettlementOutcome,
    /// Rewards credited, `(address, amount)`
    pub rewards: Vec<(Address, U256)>,
    /// Collateral forfeited to the vault, `(address, amount)`
    pub slashed: Vec<(Address, U256)>,
}

/// The relayer marketplace for one outbound lane
#[derive(Debug, Clone)]
pub struct FeeMarket {
    config: FeeMarketConfig,
    /// Fee-ascending; ties keep enrollment order
    relayers: Vec<Relayer>,
    orders: BTreeMap<u64, Order>,
    rewards: BTreeMap<Address, U256>,
    vault_balance: U256,
}

impl FeeMarket {
    /// Instantiate an empty market
    pub fn new(config: FeeMarketConfig) -> Self {
        Self {
            config,
            relayers: Vec::new(),
            orders: BTreeMap::new(),
            rewards: BTreeMap::new(),
            vault_balance: U256::zero(),
        }
    }

    /// The market parameters
    pub fn config(&self) -> &FeeMarketConfig {
        &self.config
    }

    /// The enrolled relayers, cheapest first
    pub fn relayers(&self) -> &[Relayer] {
        &self.relayers
    }

    /// Look up an enrolled relayer
    pub fn relayer(&self, address: Address) -> Option<&Relayer> {
        self.relayers.iter().find(|r| r.address == address)
    }

    /// Look up an order by id
    pub fn order(&self, id: u64) -> Option<&Order> {
        self.orders.get(&id)
    }

    /// Claimable reward balance of an address
    pub fn balance_of(&self, address: Address) -> U256 {
        self.rewards.get(&address).copied().unwrap_or_default()
    }

    /// Collateral accumulated in the slash vault
    pub fn vault_balance(&self) -> U256 {
        self.vault_balance
    }

    /// Current order price: the `K`-th lowest fee among eligible relayers
    pub fn market_fee(&self) -> Option<U256> {
        self.eligible()
            .nth(self.config.assigned_relayers_number.saturating_sub(1))
            .map(|r| r.fee)
    }

    fn eligible(&self) -> impl Iterator<Item = &Relayer> {
        let per_order = self.config.collateral_per_order;
        self.relayers
            .iter()
            .filter(move |r| r.free_collateral() >= per_order)
    }

    /// Enroll (or re-enroll with a new fee) at the slot immediately after
    /// `predecessor`.
    ///
    /// The hint must name the entry that precedes the correct fee-ascending
    /// slot (`None` for the head); a wrong hint is rejected rather than
    /// silently re-sorted. Re-enrollment carries collateral and locks over.
    pub fn enroll(
        &mut self,
        caller: Address,
        predecessor: Option<Address>,
        fee: U256,
        collateral_deposit: U256,
        now: u64,
    ) -> Result<(), FeeMarketError> {
        // remember the slot so a failed call restores the exact ordering
        let existing = self
            .relayers
            .iter()
            .position(|r| r.address == caller)
            .map(|i| (i, self.relayers.remove(i)));

        let (collateral, locked) = match &existing {
            Some((_, prev)) => (prev.collateral + collateral_deposit, prev.locked),
            None => (collateral_deposit, U256::zero()),
        };

        if collateral < self.config.collateral_per_order {
            if let Some((slot, prev)) = existing {
                self.relayers.insert(slot, prev);
            }
            return Err(FeeMarketError::InsufficientCollateral {
                required: self.config.collateral_per_order,
                got: collateral,
            });
        }

        let pos = match predecessor {
            None => 0,
            Some(addr) => match self.relayers.iter().position(|r| r.address == addr) {
                Some(i) => i + 1,
                None => {
                    if let Some((slot, prev)) = existing {
                        self.relayers.insert(slot, prev);
                    }
                    return Err(FeeMarketError::InvalidHint);
                }
            },
        };

        let hint_ok = (pos == 0 || self.relayers[pos - 1].fee <= fee)
            && (pos == self.relayers.len() || self.relayers[pos].fee > fee);
        if !hint_ok {
            if let Some((slot, prev)) = existing {
                self.relayers.insert(slot, prev);
            }
            return Err(FeeMarketError::InvalidHint);
        }

        info!(relayer = ?caller, %fee, %collateral, "Relayer enrolled");
        self.relayers.insert(
            pos,
            Relayer {
                address: caller,
                fee,
                collateral,
                locked,
                enrolled_at: now,
            },
        );
        Ok(())
    }

    /// Add collateral to an existing enrollment
    pub fn deposit(&mut self, caller: Address, amount: U256) -> Result<(), FeeMarketError> {
        let relayer = self
            .relayers
            .iter_mut()
            .find(|r| r.address == caller)
            .ok_or(FeeMarketError::UnknownRelayer(caller))?;
        relayer.collateral += amount;
        Ok(())
    }

    /// Withdraw free collateral. Collateral locked by open orders stays.
    pub fn withdraw(&mut self, caller: Address, amount: U256) -> Result<(), FeeMarketError> {
        let relayer = self
            .relayers
            .iter_mut()
            .find(|r| r.address == caller)
            .ok_or(FeeMarketError::UnknownRelayer(caller))?;
        let free = relayer.free_collateral();
        if amount > free {
            return Err(FeeMarketError::CollateralLocked {
                locked: relayer.locked,
                requested: amount,
                free,
            });
        }
        relayer.collateral -= amount;
        Ok(())
    }

    /// Open the order for `nonce`: assign the `K` cheapest eligible
    /// relayers, lock their collateral, and fix the deadlines.
    pub fn assign_order(
        &mut self,
        lane: LaneId,
        nonce: u64,
        now: u64,
    ) -> Result<u64, FeeMarketError> {
        if self.orders.contains_key(&nonce) {
            return Err(FeeMarketError::OrderExists(nonce));
        }

        let required = self.config.assigned_relayers_number;
        let assigned: Vec<AssignedRelayer> = self
            .eligible()
            .take(required)
            .map(|r| AssignedRelayer {
                address: r.address,
                fee: r.fee,
            })
            .collect();
        if assigned.len() < required {
            return Err(FeeMarketError::InsufficientRelayers {
                eligible: assigned.len(),
                required,
            });
        }

        let per_order = self.config.collateral_per_order;
        for a in &assigned {
            if let Some(r) = self.relayers.iter_mut().find(|r| r.address == a.address) {
                r.locked += per_order;
            }
        }

        let fee = assigned.last().map(|a| a.fee).unwrap_or_default();
        let order = Order {
            id: nonce,
            lane,
            fee,
            assigned,
            created_at: now,
            relay_deadline: now + self.config.relay_time,
            slash_deadline: now + self.config.slash_time,
        };
        debug!(order = nonce, %lane, %fee, "Order assigned");
        self.orders.insert(nonce, order);
        Ok(nonce)
    }

    /// Settle the order for a confirmed nonce. The order is removed; its
    /// locked collateral releases and double settlement is `UnknownOrder`.
    ///
    /// On time, the order fee is split between the delivering and
    /// confirming relayers by the configured weights. Late, the reward pool
    /// halves (the difference going to the vault) and every assigned
    /// relayer pays a late penalty. Past the slash deadline, each assigned
    /// relayer forfeits the full per-order collateral and the reward still
    /// goes to whoever actually acted.
    pub fn settle(
        &mut self,
        order_id: u64,
        delivering_relayer: Address,
        confirming_relayer: Address,
        message_count: u64,
        now: u64,
    ) -> Result<SettlementReport, FeeMarketError> {
        let order = self
            .orders
            .remove(&order_id)
            .ok_or(FeeMarketError::UnknownOrder(order_id))?;

        let outcome = if now <= order.relay_deadline {
            SettlementOutcome::RelayedOnTime
        } else if now <= order.slash_deadline {
            SettlementOutcome::RelayedLate
        } else {
            SettlementOutcome::Slashed
        };

        let per_order = self.config.collateral_per_order;
        for a in &order.assigned {
            if let Some(r) = self.relayers.iter_mut().find(|r| r.address == a.address) {
                r.locked = r.locked.saturating_sub(per_order);
            }
        }

        let (pool, penalty) = match outcome {
            SettlementOutcome::RelayedOnTime => (order.fee, U256::zero()),
            SettlementOutcome::RelayedLate => {
                let pool = order.fee / 2;
                self.vault_balance += order.fee - pool;
                (pool, self.config.late_penalty())
            }
            SettlementOutcome::Slashed => (order.fee, per_order),
        };

        let mut slashed = Vec::new();
        if !penalty.is_zero() {
            for a in &order.assigned {
                let taken = self.slash(a.address, penalty);
                if !taken.is_zero() {
                    slashed.push((a.address, taken));
                }
            }
        }

        let delivery_reward = pool * self.config.delivery_share_percent / 100;
        let confirm_reward = pool - delivery_reward;
        let mut rewards = Vec::new();
        for (address, amount) in [
            (delivering_relayer, delivery_reward),
            (confirming_relayer, confirm_reward),
        ] {
            if !amount.is_zero() {
                *self.rewards.entry(address).or_default() += amount;
                rewards.push((address, amount));
            }
        }

        info!(
            order = order_id,
            ?outcome,
            message_count,
            deliverer = ?delivering_relayer,
            confirmer = ?confirming_relayer,
            "Order settled"
        );
        Ok(SettlementReport {
            order_id,
            outcome,
            rewards,
            slashed,
        })
    }

    /// Deduct up to `amount` of a relayer's collateral into the vault; a
    /// relayer left below the per-order requirement is dropped from the
    /// enrollment list.
    fn slash(&mut self, address: Address, amount: U256) -> U256 {
        let Some(idx) = self.relayers.iter().position(|r| r.address == address) else {
            return U256::zero();
        };
        let relayer = &mut self.relayers[idx];
        let taken = amount.min(relayer.collateral);
        relayer.collateral -= taken;
        self.vault_balance += taken;
        if relayer.collateral < self.config.collateral_per_order {
            warn!(relayer = ?address, "Relayer collateral exhausted, dropping enrollment");
            self.relayers.remove(idx);
        }
        taken
    }
}
