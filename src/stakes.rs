//! Make-stake modal
//!
//! Opening the modal asks the stakes channel to render the form for a pool
//! address. The reply carries the markup plus the amounts the form is
//! validated against. Submitting shifts the entered amount into base units
//! and hands it to the staking contract.

pub mod amount;

pub use amount::{deserialize_amount, format_units, parse_stake_amount};

use async_trait::async_trait;
use num_bigint::{BigInt, Sign};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::StakesConfig;
use crate::dom::{Document, NodeId};
use crate::error::{ExplorerError, Result};
use crate::feed::{PhoenixSocket, RealtimeChannel};

pub const RENDER_MAKE_STAKE_EVENT: &str = "render_make_stake";

const STAKE_INPUT: &str = "[delegator-stake]";
const AVAILABLE_AMOUNT: &str = "[data-available-amount]";
const AVAILABLE_AMOUNT_ATTR: &str = "data-available-amount";

/// Who is staking and with which token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakesContext {
    /// Connected wallet account, if any.
    pub account: Option<String>,
    pub network_supported: bool,
    pub token_decimals: u32,
    pub token_symbol: String,
}

impl StakesContext {
    pub fn from_config(config: &StakesConfig, account: Option<String>, network_supported: bool) -> Self {
        Self {
            account,
            network_supported,
            token_decimals: config.token_decimals,
            token_symbol: config.token_symbol.clone(),
        }
    }
}

/// Reply to `render_make_stake`. Amounts are in base units.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MakeStakeResponse {
    pub html: String,
    #[serde(deserialize_with = "deserialize_amount")]
    pub self_staked_amount: BigInt,
    #[serde(deserialize_with = "deserialize_amount")]
    pub total_staked_amount: BigInt,
    #[serde(deserialize_with = "deserialize_amount")]
    pub min_stake: BigInt,
    #[serde(deserialize_with = "deserialize_amount")]
    pub delegator_staked: BigInt,
    #[serde(deserialize_with = "deserialize_amount")]
    pub balance: BigInt,
}

impl MakeStakeResponse {
    /// Share of the pool staked by its owner, in whole percent. `None` for an
    /// empty pool.
    pub fn self_staked_percent(&self) -> Option<BigInt> {
        if self.total_staked_amount.sign() != Sign::Plus {
            return None;
        }
        Some(&self.self_staked_amount * 100 / &self.total_staked_amount)
    }
}

#[async_trait]
pub trait StakesChannel: Send {
    /// Push `event` and resolve to the server's reply.
    async fn push(&mut self, event: &str, payload: Value) -> Result<Value>;
}

#[async_trait]
pub trait ModalHost: Send {
    async fn open_warning(&mut self, title: &str, message: &str);
    async fn open(&mut self, markup: &str) -> Result<()>;
    /// Disable the open modal while a transaction is pending.
    async fn lock(&mut self);
    async fn unlock(&mut self);
}

#[async_trait]
pub trait StakingContract: Send + Sync {
    /// Stake `amount` base units into the pool at `address`; returns the
    /// transaction hash.
    async fn stake(&self, address: &str, amount: &BigInt) -> Result<String>;
}

/// [`StakesChannel`] over a joined Phoenix topic.
pub struct SocketStakesChannel {
    socket: PhoenixSocket,
    topic: String,
}

impl SocketStakesChannel {
    pub async fn join(mut socket: PhoenixSocket, topic: impl Into<String>) -> Result<Self> {
        let topic = topic.into();
        socket.join(&topic).await?;
        info!(topic = %topic, "stakes.joined");
        Ok(Self { socket, topic })
    }
}

#[async_trait]
impl StakesChannel for SocketStakesChannel {
    async fn push(&mut self, event: &str, payload: Value) -> Result<Value> {
        self.socket.call(&self.topic, event, payload).await
    }
}

/// Open the make-stake modal for `target_address`, or for the connected
/// account when no pool address is given.
///
/// Returns `Ok(None)` after showing a warning when staking is not possible.
pub async fn open_make_stake_modal<C, M>(
    ctx: &StakesContext,
    target_address: Option<&str>,
    channel: &mut C,
    modals: &mut M,
) -> Result<Option<MakeStakeForm>>
where
    C: StakesChannel,
    M: ModalHost,
{
    let Some(account) = ctx.account.as_deref() else {
        modals
            .open_warning("Unauthorized", "Please login with MetaMask")
            .await;
        return Ok(None);
    };
    if !ctx.network_supported {
        modals
            .open_warning("Unauthorized", "Connect to a supported network to stake")
            .await;
        return Ok(None);
    }

    let address = target_address
        .filter(|a| !a.is_empty())
        .unwrap_or(account)
        .to_string();

    let reply = channel
        .push(RENDER_MAKE_STAKE_EVENT, json!({ "address": address }))
        .await?;
    let response: MakeStakeResponse = serde_json::from_value(reply)?;
    let form = MakeStakeForm::new(ctx.clone(), address, response)?;

    modals.open(&form.response.html).await?;
    info!(address = %form.address, "stakes.modal_opened");
    Ok(Some(form))
}

/// Check the entered amount against the pool's minimum and the balance.
/// The error is the message shown under the input.
pub fn validate_delegator_stake(
    input: &str,
    ctx: &StakesContext,
    response: &MakeStakeResponse,
    address: &str,
) -> std::result::Result<(), String> {
    let stake = match parse_stake_amount(input, ctx.token_decimals) {
        Some(stake) if stake.sign() == Sign::Plus => stake,
        _ => return Err("Invalid amount".to_string()),
    };

    if &stake + &response.delegator_staked < response.min_stake {
        let account = ctx.account.as_deref().unwrap_or_default();
        let staker = if account.eq_ignore_ascii_case(address) {
            "candidate"
        } else {
            "delegate"
        };
        return Err(format!(
            "Minimum {} stake is {} {}",
            staker,
            format_units(&response.min_stake, ctx.token_decimals),
            ctx.token_symbol
        ));
    }

    if stake > response.balance {
        return Err("Insufficient funds".to_string());
    }

    Ok(())
}

/// An open make-stake modal.
pub struct MakeStakeForm {
    ctx: StakesContext,
    address: String,
    response: MakeStakeResponse,
    modal: Document,
    input: Option<NodeId>,
}

impl MakeStakeForm {
    pub fn new(ctx: StakesContext, address: String, response: MakeStakeResponse) -> Result<Self> {
        let modal = Document::parse(&response.html)?;
        let input = modal.select(STAKE_INPUT)?.first().copied();
        if input.is_none() {
            warn!(address = %address, "stakes.no_amount_input");
        }
        Ok(Self {
            ctx,
            address,
            response,
            modal,
            input,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn response(&self) -> &MakeStakeResponse {
        &self.response
    }

    pub fn modal(&self) -> &Document {
        &self.modal
    }

    /// Amounts offered as one-click shortcuts by the modal markup.
    pub fn available_amounts(&self) -> Vec<String> {
        self.modal
            .select(AVAILABLE_AMOUNT)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|node| self.modal.attr(node, AVAILABLE_AMOUNT_ATTR))
            .map(str::to_string)
            .collect()
    }

    pub fn amount(&self) -> &str {
        self.input
            .and_then(|input| self.modal.attr(input, "value"))
            .unwrap_or_default()
    }

    pub fn set_amount(&mut self, value: &str) {
        if let Some(input) = self.input {
            self.modal.set_attr(input, "value", value);
        }
    }

    /// Copy a shortcut amount into the input.
    pub fn fill_available_amount(&mut self, amount: &str) {
        self.set_amount(amount);
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        validate_delegator_stake(self.amount(), &self.ctx, &self.response, &self.address)
    }

    /// Validate, lock the modal and stake the entered amount. The modal is
    /// unlocked again if the contract call fails.
    pub async fn submit<K, M>(&self, contract: &K, modals: &mut M) -> Result<String>
    where
        K: StakingContract + ?Sized,
        M: ModalHost,
    {
        self.validate().map_err(ExplorerError::InvalidAmount)?;
        let stake = parse_stake_amount(self.amount(), self.ctx.token_decimals)
            .ok_or_else(|| ExplorerError::InvalidAmount(self.amount().to_string()))?;

        modals.lock().await;
        info!(address = %self.address, amount = %stake, "stakes.submit");
        match contract.stake(&self.address, &stake).await {
            Ok(tx_hash) => {
                info!(address = %self.address, tx = %tx_hash, "stakes.submitted");
                Ok(tx_hash)
            }
            Err(e) => {
                warn!(address = %self.address, error = %e, "stakes.failed");
                modals.unlock().await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT: &str = "0xAbC0000000000000000000000000000000000001";

    fn ctx() -> StakesContext {
        StakesContext {
            account: Some(ACCOUNT.to_string()),
            network_supported: true,
            token_decimals: 18,
            token_symbol: "TRI".to_string(),
        }
    }

    fn response(min_stake: &str, delegator_staked: &str, balance: &str) -> MakeStakeResponse {
        serde_json::from_value(json!({
            "html": "<div><form><input delegator-stake></form></div>",
            "self_staked_amount": "0",
            "total_staked_amount": "0",
            "min_stake": min_stake,
            "delegator_staked": delegator_staked,
            "balance": balance,
        }))
        .unwrap()
    }

    const ONE: &str = "1000000000000000000";
    const TEN: &str = "10000000000000000000";

    #[test]
    fn test_invalid_amounts() {
        let resp = response(ONE, "0", TEN);
        for input in ["", "abc", "0", "-1", "0,0"] {
            assert_eq!(
                validate_delegator_stake(input, &ctx(), &resp, "0xpool"),
                Err("Invalid amount".to_string()),
                "{:?}",
                input
            );
        }
    }

    #[test]
    fn test_minimum_names_candidate_or_delegate() {
        let resp = response(TEN, "0", TEN);
        assert_eq!(
            validate_delegator_stake("1", &ctx(), &resp, &ACCOUNT.to_lowercase()),
            Err("Minimum candidate stake is 10 TRI".to_string())
        );
        assert_eq!(
            validate_delegator_stake("1", &ctx(), &resp, "0xpool"),
            Err("Minimum delegate stake is 10 TRI".to_string())
        );
    }

    #[test]
    fn test_existing_stake_counts_towards_minimum() {
        let resp = response(TEN, "9000000000000000000", TEN);
        assert_eq!(validate_delegator_stake("1", &ctx(), &resp, "0xpool"), Ok(()));
    }

    #[test]
    fn test_insufficient_funds_checked_last() {
        let resp = response(ONE, "0", ONE);
        assert_eq!(
            validate_delegator_stake("1,5", &ctx(), &resp, "0xpool"),
            Err("Insufficient funds".to_string())
        );
        assert_eq!(validate_delegator_stake("1", &ctx(), &resp, "0xpool"), Ok(()));
    }

    #[test]
    fn test_self_staked_percent() {
        let mut resp = response(ONE, "0", ONE);
        assert_eq!(resp.self_staked_percent(), None);
        resp.self_staked_amount = BigInt::from(25);
        resp.total_staked_amount = BigInt::from(200);
        assert_eq!(resp.self_staked_percent(), Some(BigInt::from(12)));
    }

    #[test]
    fn test_form_reads_shortcuts_and_fills_input() {
        let mut resp = response(ONE, "0", TEN);
        resp.html = r##"<div class="modal">
<form><input type="text" delegator-stake value=""><button type="submit">Stake</button></form>
<a href="#" data-available-amount="4.5">max</a>
</div>"##
            .to_string();

        let mut form = MakeStakeForm::new(ctx(), "0xpool".to_string(), resp).unwrap();
        assert_eq!(form.available_amounts(), vec!["4.5"]);
        assert_eq!(form.amount(), "");
        assert!(form.validate().is_err());

        form.fill_available_amount("4.5");
        assert_eq!(form.amount(), "4.5");
        assert_eq!(form.validate(), Ok(()));
    }
}
