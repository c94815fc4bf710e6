//! Integration tests for the make-stake modal flow

use async_trait::async_trait;
use num_bigint::BigInt;
use serde_json::{json, Value};
use std::sync::Mutex;
use trinity_explorer::config::StakesConfig;
use trinity_explorer::stakes::{
    open_make_stake_modal, MakeStakeForm, ModalHost, StakesChannel, StakesContext,
    StakingContract,
};
use trinity_explorer::{ExplorerError, Result};

const ACCOUNT: &str = "0x00000000000000000000000000000000000000a1";
const POOL: &str = "0x00000000000000000000000000000000000000b2";

const MODAL: &str = r#"<div class="modal" id="becomeDelegateModal">
  <div class="js-stakes-progress"></div>
  <form>
    <input type="text" delegator-stake placeholder="Amount">
    <span data-available-amount="25">Max</span>
    <button type="submit">Stake</button>
  </form>
</div>"#;

#[derive(Default)]
struct RecordingChannel {
    pushes: Vec<(String, Value)>,
}

#[async_trait]
impl StakesChannel for RecordingChannel {
    async fn push(&mut self, event: &str, payload: Value) -> Result<Value> {
        self.pushes.push((event.to_string(), payload));
        Ok(json!({
            "html": MODAL,
            "self_staked_amount": "40000000000000000000",
            "total_staked_amount": "160000000000000000000",
            "min_stake": "10000000000000000000",
            "delegator_staked": "0",
            "balance": "25000000000000000000",
        }))
    }
}

#[derive(Default)]
struct RecordingModals {
    warnings: Vec<(String, String)>,
    opened: Vec<String>,
    locked: bool,
    unlocks: usize,
}

#[async_trait]
impl ModalHost for RecordingModals {
    async fn open_warning(&mut self, title: &str, message: &str) {
        self.warnings.push((title.to_string(), message.to_string()));
    }

    async fn open(&mut self, markup: &str) -> Result<()> {
        self.opened.push(markup.to_string());
        Ok(())
    }

    async fn lock(&mut self) {
        self.locked = true;
    }

    async fn unlock(&mut self) {
        self.locked = false;
        self.unlocks += 1;
    }
}

struct MockContract {
    calls: Mutex<Vec<(String, BigInt)>>,
    fail: bool,
}

impl MockContract {
    fn new(fail: bool) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail,
        }
    }
}

#[async_trait]
impl StakingContract for MockContract {
    async fn stake(&self, address: &str, amount: &BigInt) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((address.to_string(), amount.clone()));
        if self.fail {
            Err(ExplorerError::ContractError("user rejected".to_string()))
        } else {
            Ok("0xfeed".to_string())
        }
    }
}

fn ctx(account: Option<&str>, network_supported: bool) -> StakesContext {
    StakesContext::from_config(
        &StakesConfig::default(),
        account.map(str::to_string),
        network_supported,
    )
}

async fn open(target: Option<&str>) -> (MakeStakeForm, RecordingChannel, RecordingModals) {
    let mut channel = RecordingChannel::default();
    let mut modals = RecordingModals::default();
    let form = open_make_stake_modal(&ctx(Some(ACCOUNT), true), target, &mut channel, &mut modals)
        .await
        .unwrap()
        .expect("modal should open");
    (form, channel, modals)
}

#[tokio::test]
async fn test_requires_account() {
    let mut channel = RecordingChannel::default();
    let mut modals = RecordingModals::default();

    let form = open_make_stake_modal(&ctx(None, true), Some(POOL), &mut channel, &mut modals)
        .await
        .unwrap();

    assert!(form.is_none());
    assert_eq!(
        modals.warnings,
        vec![("Unauthorized".to_string(), "Please login with MetaMask".to_string())]
    );
    assert!(channel.pushes.is_empty());
}

#[tokio::test]
async fn test_requires_supported_network() {
    let mut channel = RecordingChannel::default();
    let mut modals = RecordingModals::default();

    let form = open_make_stake_modal(&ctx(Some(ACCOUNT), false), Some(POOL), &mut channel, &mut modals)
        .await
        .unwrap();

    assert!(form.is_none());
    assert_eq!(modals.warnings.len(), 1);
    assert_eq!(modals.warnings[0].1, "Connect to a supported network to stake");
    assert!(modals.opened.is_empty());
}

#[tokio::test]
async fn test_opens_modal_for_pool() {
    let (form, channel, modals) = open(Some(POOL)).await;

    assert_eq!(
        channel.pushes,
        vec![("render_make_stake".to_string(), json!({ "address": POOL }))]
    );
    assert_eq!(modals.opened, vec![MODAL.to_string()]);
    assert_eq!(form.address(), POOL);
    assert_eq!(form.available_amounts(), vec!["25"]);
    assert_eq!(form.response().self_staked_percent(), Some(BigInt::from(25)));
}

#[tokio::test]
async fn test_defaults_to_own_account() {
    let (form, channel, _) = open(None).await;
    assert_eq!(form.address(), ACCOUNT);
    assert_eq!(channel.pushes[0].1, json!({ "address": ACCOUNT }));

    let mut form = form;
    form.set_amount("5");
    assert_eq!(
        form.validate(),
        Err("Minimum candidate stake is 10 TRI".to_string())
    );
}

#[tokio::test]
async fn test_submit_stakes_base_units() {
    let (mut form, _, mut modals) = open(Some(POOL)).await;
    let contract = MockContract::new(false);

    form.set_amount("12,5");
    let tx = form.submit(&contract, &mut modals).await.unwrap();

    assert_eq!(tx, "0xfeed");
    assert!(modals.locked);
    let calls = contract.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, POOL);
    assert_eq!(calls[0].1.to_string(), "12500000000000000000");
}

#[tokio::test]
async fn test_submit_rejects_invalid_amount_without_locking() {
    let (mut form, _, mut modals) = open(Some(POOL)).await;
    let contract = MockContract::new(false);

    form.set_amount("30");
    let err = form.submit(&contract, &mut modals).await.unwrap_err();

    assert_eq!(err, ExplorerError::InvalidAmount("Insufficient funds".to_string()));
    assert!(!modals.locked);
    assert!(contract.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_available_amount_shortcut_then_contract_failure() {
    let (mut form, _, mut modals) = open(Some(POOL)).await;
    let contract = MockContract::new(true);

    let max = form.available_amounts().remove(0);
    form.fill_available_amount(&max);
    assert_eq!(form.amount(), "25");

    let err = form.submit(&contract, &mut modals).await.unwrap_err();
    assert!(matches!(err, ExplorerError::ContractError(_)));
    assert!(!modals.locked);
    assert_eq!(modals.unlocks, 1);
    assert_eq!(contract.calls.lock().unwrap().len(), 1);
}
