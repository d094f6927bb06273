//! Shared mocks and fixtures for the engine integration tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::{DateTime, TimeZone, Utc};
use k256::ecdsa::SigningKey;

use aegis_engine::{
    AdminAction, CallContext, CallExecutor, CallOutcome, Clock, EngineConfig, EngineState,
    EventSink, OperationEvent, OperationRequest, PaymentRail, SecureOperationEngine,
};
use aegis_metatx::envelope_message_hash;
use aegis_types::{
    keccak256, ActionBitmap, Address, FunctionPermission, MetaTxEnvelope, MetaTxParams,
    OperationCategory, PaymentDetails, RoleId, Selector, TxAction,
};

pub const T0: i64 = 1_700_000_000;
pub const CHAIN_ID: u64 = 31337;
pub const TIMELOCK: i64 = 3600;
pub const SELF: Address = Address([0xEE; 20]);
pub const TARGET: Address = Address([0xAA; 20]);

pub fn t(offset: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(T0 + offset, 0).unwrap()
}

pub fn addr(byte: u8) -> Address {
    Address([byte; 20])
}

// ── mock collaborators ──────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct CallLog(pub Rc<RefCell<Vec<(Address, u128, Vec<u8>)>>>);

pub struct MockExecutor {
    pub log: CallLog,
    pub fail: Rc<Cell<bool>>,
    pub output: Vec<u8>,
}

impl CallExecutor for MockExecutor {
    fn invoke(&mut self, target: Address, value: u128, data: &[u8]) -> CallOutcome {
        self.log.0.borrow_mut().push((target, value, data.to_vec()));
        if self.fail.get() {
            CallOutcome { success: false, output: b"revert: mock failure".to_vec() }
        } else {
            CallOutcome { success: true, output: self.output.clone() }
        }
    }
}

#[derive(Clone, Default)]
pub struct TransferLog(pub Rc<RefCell<Vec<(Option<Address>, Address, u128)>>>);

pub struct MockPayments {
    pub log: TransferLog,
    pub balance: u128,
    pub fail_native: Rc<Cell<bool>>,
    pub fail_token: Rc<Cell<bool>>,
}

impl PaymentRail for MockPayments {
    fn transfer(&mut self, token: Option<Address>, recipient: Address, amount: u128) -> bool {
        let fail = match token {
            None => self.fail_native.get(),
            Some(_) => self.fail_token.get(),
        };
        if fail {
            return false;
        }
        self.log.0.borrow_mut().push((token, recipient, amount));
        true
    }

    fn native_balance(&self) -> u128 {
        self.balance
    }
}

#[derive(Clone, Default)]
pub struct EventLog(pub Rc<RefCell<Vec<OperationEvent>>>);

pub struct MockSink {
    pub log: EventLog,
    pub fail: Rc<Cell<bool>>,
}

impl EventSink for MockSink {
    fn notify(&mut self, event: &OperationEvent) -> Result<(), String> {
        if self.fail.get() {
            return Err("sink offline".into());
        }
        self.log.0.borrow_mut().push(event.clone());
        Ok(())
    }
}

#[derive(Clone)]
pub struct ManualClock(pub Rc<Cell<i64>>);

impl ManualClock {
    pub fn advance(&self, secs: i64) {
        self.0.set(self.0.get() + secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.0.get(), 0).unwrap()
    }
}

// ── fixture ─────────────────────────────────────────────────────────

pub type TestEngine = SecureOperationEngine<MockExecutor, MockPayments, MockSink, ManualClock>;

pub struct Fixture {
    pub engine: TestEngine,
    pub clock: ManualClock,
    pub calls: CallLog,
    pub transfers: TransferLog,
    pub events: EventLog,
    pub executor_fail: Rc<Cell<bool>>,
    pub native_fail: Rc<Cell<bool>>,
    pub sink_fail: Rc<Cell<bool>>,
    pub exec_selector: Selector,
    pub meta_selector: Selector,
    pub category: OperationCategory,
    pub requester: Address,
    pub approver: Address,
    pub canceller: Address,
    pub relayer: Address,
    pub signer_key: SigningKey,
    pub signer: Address,
}

pub fn address_of(key: &SigningKey) -> Address {
    let point = key.verifying_key().to_encoded_point(false);
    let digest = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&digest[12..]).unwrap()
}

fn grant(
    state: &mut EngineState,
    role: &str,
    wallet: Address,
    selector: Selector,
    actions: &[TxAction],
    handled: Vec<Selector>,
) {
    let id = match state.roles.create_role(role, 4, false) {
        Ok(id) => id,
        Err(_) => RoleId::from_name(role),
    };
    if !state.roles.role(&id).unwrap().wallets.contains(&wallet) {
        state.roles.assign_wallet(&id, wallet).unwrap();
    }
    state
        .add_function_to_role(
            &id,
            FunctionPermission {
                selector,
                actions: ActionBitmap::from_actions(actions),
                handled_selectors: handled,
            },
        )
        .unwrap();
}

pub fn fixture() -> Fixture {
    let exec_selector = Selector::from_signature("run(bytes)");
    let meta_selector = Selector::from_signature("executeWithAuthorization(bytes)");
    let category = OperationCategory::from_operation_name("GUARDED_CALL");

    let mut state = EngineState::new();
    state
        .initialize(EngineConfig { self_address: SELF, chain_id: CHAIN_ID, timelock_secs: TIMELOCK })
        .unwrap();

    let all = ActionBitmap::from_actions(&TxAction::ALL);
    state
        .registry
        .create_schema("run(bytes)", exec_selector, "GUARDED_CALL", all, false, vec![exec_selector])
        .unwrap();
    state
        .registry
        .create_schema(
            "executeWithAuthorization(bytes)",
            meta_selector,
            "GUARDED_CALL",
            all,
            false,
            vec![exec_selector],
        )
        .unwrap();
    state.whitelist.add_target(exec_selector, TARGET).unwrap();

    let requester = addr(0x01);
    let approver = addr(0x02);
    let canceller = addr(0x03);
    let relayer = addr(0x04);
    let signer_key = SigningKey::random(&mut rand::rngs::OsRng);
    let signer = address_of(&signer_key);

    grant(&mut state, "REQUESTER", requester, exec_selector, &[TxAction::TimeDelayRequest], vec![exec_selector]);
    grant(&mut state, "APPROVER", approver, exec_selector, &[TxAction::TimeDelayApprove], vec![exec_selector]);
    grant(&mut state, "CANCELLER", canceller, exec_selector, &[TxAction::TimeDelayCancel], vec![exec_selector]);
    let sign_actions = [
        TxAction::SignMetaApprove,
        TxAction::SignMetaCancel,
        TxAction::SignMetaRequestAndApprove,
    ];
    grant(&mut state, "META_SIGNER", signer, meta_selector, &sign_actions, vec![exec_selector]);
    grant(&mut state, "META_SIGNER_EXEC", signer, exec_selector, &sign_actions, vec![exec_selector]);
    let relay_actions = [
        TxAction::ExecuteMetaApprove,
        TxAction::ExecuteMetaCancel,
        TxAction::ExecuteMetaRequestAndApprove,
    ];
    grant(&mut state, "RELAYER", relayer, meta_selector, &relay_actions, vec![exec_selector]);

    let clock = ManualClock(Rc::new(Cell::new(T0)));
    let calls = CallLog::default();
    let transfers = TransferLog::default();
    let events = EventLog::default();
    let executor_fail = Rc::new(Cell::new(false));
    let native_fail = Rc::new(Cell::new(false));
    let sink_fail = Rc::new(Cell::new(false));

    let engine = SecureOperationEngine::new(
        state,
        MockExecutor { log: calls.clone(), fail: executor_fail.clone(), output: b"ok".to_vec() },
        MockPayments {
            log: transfers.clone(),
            balance: 1_000_000,
            fail_native: native_fail.clone(),
            fail_token: Rc::new(Cell::new(false)),
        },
        MockSink { log: events.clone(), fail: sink_fail.clone() },
        clock.clone(),
    )
    .unwrap();

    Fixture {
        engine,
        clock,
        calls,
        transfers,
        events,
        executor_fail,
        native_fail,
        sink_fail,
        exec_selector,
        meta_selector,
        category,
        requester,
        approver,
        canceller,
        relayer,
        signer_key,
        signer,
    }
}

pub fn ctx(caller: Address) -> CallContext {
    CallContext { caller, gas_price: 50 }
}

pub fn basic_request(fx: &Fixture) -> OperationRequest {
    OperationRequest {
        requester: fx.requester,
        target: TARGET,
        value: 100,
        gas_budget: 200_000,
        category: fx.category,
        handler_selector: fx.exec_selector,
        execution_selector: fx.exec_selector,
        call_data: vec![0xca, 0xfe],
        payment: PaymentDetails::default(),
    }
}

/// Sign an envelope over `record` with the fixture signer.
pub fn signed_envelope(
    fx: &Fixture,
    record: aegis_types::TxRecord,
    action: TxAction,
    nonce: u64,
    deadline_offset: i64,
    max_gas_price: u128,
) -> MetaTxEnvelope {
    let params = MetaTxParams {
        chain_id: CHAIN_ID,
        nonce,
        handler_contract: SELF,
        handler_selector: fx.meta_selector,
        action,
        deadline: t(deadline_offset),
        max_gas_price,
        signer: fx.signer,
    };
    let message = envelope_message_hash(&record, &params, &fx.engine.domain_context());
    let (sig, recid) = fx.signer_key.sign_prehash_recoverable(&message.0).unwrap();
    let mut signature = sig.to_bytes().to_vec();
    signature.push(recid.to_byte() + 27);
    let data = record.params.call_data.clone();
    MetaTxEnvelope { record, params, message_hash: message, signature, data }
}

/// Convenience: request through the time-delay path and return the id.
pub fn request_one(fx: &mut Fixture) -> u64 {
    fx.engine.request(&ctx(fx.requester), basic_request(fx)).unwrap()
}

/// Keep admin helpers exercised from the integration suites too.
pub fn whitelist_action(selector: Selector, target: Address) -> AdminAction {
    AdminAction::AddWhitelistTarget { selector, target }
}
