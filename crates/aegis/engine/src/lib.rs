//! Aegis Engine - the secure-operation orchestrator.
//!
//! Turns arbitrary state-changing calls into governed workflows: either a
//! mandatory waiting period gates execution, or an off-line-signed
//! authorization is executed by a separate relayer. The engine composes the
//! permission store, schema registry, whitelist guard, ledger, and the
//! meta-transaction verifier, and drives the external collaborators.
//!
//! Reentrancy discipline: every status transition and nonce increment is
//! written to state before any outward call, and every entry point that
//! resumes a pending transaction re-validates `Pending` first. The state
//! machine is the concurrency-control primitive; there is no lock object.

#![deny(unsafe_code)]

pub mod admin;
pub mod collab;
pub mod state;

pub use admin::AdminAction;
pub use collab::{
    CallContext, CallExecutor, CallOutcome, Clock, EventSink, OperationEvent, PaymentRail,
    SystemClock,
};
pub use state::{EngineConfig, EngineState};

use tracing::{info, warn};

use aegis_metatx::{verify_envelope, DomainContext, PROTOCOL_NAME, PROTOCOL_VERSION};
use aegis_types::{
    Address, EngineError, EngineResult, FunctionPermission, Hash32, MetaTxEnvelope,
    OperationCategory, PaymentDetails, RoleId, Selector, TxAction, TxParams, TxRecord, TxStatus,
};

/// Parameters of a new operation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationRequest {
    pub requester: Address,
    pub target: Address,
    pub value: u128,
    pub gas_budget: u64,
    pub category: OperationCategory,
    pub handler_selector: Selector,
    pub execution_selector: Selector,
    pub call_data: Vec<u8>,
    pub payment: PaymentDetails,
}

/// The secure-operation engine for one guarded account.
pub struct SecureOperationEngine<X, P, S, C>
where
    X: CallExecutor,
    P: PaymentRail,
    S: EventSink,
    C: Clock,
{
    state: EngineState,
    executor: X,
    payments: P,
    sink: S,
    clock: C,
}

impl<X, P, S, C> SecureOperationEngine<X, P, S, C>
where
    X: CallExecutor,
    P: PaymentRail,
    S: EventSink,
    C: Clock,
{
    /// Wrap an initialized state aggregate with its collaborators.
    pub fn new(state: EngineState, executor: X, payments: P, sink: S, clock: C) -> EngineResult<Self> {
        state.ensure_initialized()?;
        Ok(Self { state, executor, payments, sink, clock })
    }

    // ── time-delay flow ──────────────────────────────────────────────

    /// Record a new operation request; it becomes approvable once the
    /// time-lock elapses.
    pub fn request(&mut self, ctx: &CallContext, request: OperationRequest) -> EngineResult<u64> {
        self.state.ensure_initialized()?;
        if request.requester.is_zero() {
            return Err(EngineError::InvalidAddress("requester must not be zero".into()));
        }
        if request.target.is_zero() {
            return Err(EngineError::InvalidAddress("target must not be zero".into()));
        }
        self.require_permission(&ctx.caller, &request.handler_selector, TxAction::TimeDelayRequest)?;
        self.require_handler_covers(&request.handler_selector, &request.execution_selector)?;
        self.check_target(&request.execution_selector, &request.target)?;

        let release_time = self.clock.now() + chrono::Duration::seconds(self.state.timelock_secs);
        let params = TxParams {
            requester: request.requester,
            target: request.target,
            value: request.value,
            gas_budget: request.gas_budget,
            category: request.category,
            execution_selector: request.execution_selector,
            call_data: request.call_data,
        };
        let record =
            self.state.ledger.record(params, release_time, Hash32::ZERO, request.payment)?;
        let id = record.id;
        let event = Self::event_of(record);
        self.emit(&event);
        info!(tx_id = id, caller = %ctx.caller, "operation requested");
        Ok(id)
    }

    /// Approve a pending request once its release time has passed.
    pub fn approve(
        &mut self,
        ctx: &CallContext,
        tx_id: u64,
        handler_selector: Selector,
    ) -> EngineResult<()> {
        self.state.ensure_initialized()?;
        self.require_permission(&ctx.caller, &handler_selector, TxAction::TimeDelayApprove)?;
        let record = self.state.ledger.get(tx_id)?.clone();
        self.require_handler_covers(&handler_selector, &record.params.execution_selector)?;
        // Re-check the whitelist: a target delisted while the request was
        // pending must not slip through at execution time.
        self.check_target(&record.params.execution_selector, &record.params.target)?;
        self.check_funds(&record)?;

        let now = self.clock.now();
        self.state.ledger.begin_execution(tx_id, Some(now))?;
        self.execute_and_settle(tx_id);
        Ok(())
    }

    /// Cancel a pending request unconditionally.
    pub fn cancel(
        &mut self,
        ctx: &CallContext,
        tx_id: u64,
        handler_selector: Selector,
    ) -> EngineResult<()> {
        self.state.ensure_initialized()?;
        self.require_permission(&ctx.caller, &handler_selector, TxAction::TimeDelayCancel)?;
        let record = self.state.ledger.get(tx_id)?.clone();
        self.require_handler_covers(&handler_selector, &record.params.execution_selector)?;

        self.state.ledger.cancel(tx_id)?;
        let record = self.state.ledger.get(tx_id)?;
        let event = Self::event_of(record);
        self.emit(&event);
        Ok(())
    }

    // ── meta-transaction flow ────────────────────────────────────────

    /// Execute an approval signed off-line by an authorized signer.
    ///
    /// The signature replaces the waiting period: the release-time gate is
    /// not applied here.
    pub fn approve_with_authorization(
        &mut self,
        ctx: &CallContext,
        envelope: &MetaTxEnvelope,
    ) -> EngineResult<()> {
        self.state.ensure_initialized()?;
        self.require_action(envelope, TxAction::SignMetaApprove)?;
        let stored = self.state.ledger.get(envelope.record.id)?.clone();
        Self::require_pending(&stored)?;
        Self::require_envelope_matches(&stored, envelope)?;
        let signer = self.verify_authorization(ctx, envelope, TxAction::ExecuteMetaApprove)?;
        self.check_target(&stored.params.execution_selector, &stored.params.target)?;
        self.check_funds(&stored)?;

        // Replay window closes before anything can re-enter.
        self.state.bump_nonce(&signer);
        self.state.ledger.set_message_hash(envelope.record.id, envelope.message_hash)?;
        self.state.ledger.begin_execution(envelope.record.id, None)?;
        self.execute_and_settle(envelope.record.id);
        Ok(())
    }

    /// Cancel a pending request on behalf of an authorized signer.
    pub fn cancel_with_authorization(
        &mut self,
        ctx: &CallContext,
        envelope: &MetaTxEnvelope,
    ) -> EngineResult<()> {
        self.state.ensure_initialized()?;
        self.require_action(envelope, TxAction::SignMetaCancel)?;
        let stored = self.state.ledger.get(envelope.record.id)?.clone();
        Self::require_pending(&stored)?;
        Self::require_envelope_matches(&stored, envelope)?;
        let signer = self.verify_authorization(ctx, envelope, TxAction::ExecuteMetaCancel)?;

        self.state.bump_nonce(&signer);
        self.state.ledger.cancel(envelope.record.id)?;
        let record = self.state.ledger.get(envelope.record.id)?;
        let event = Self::event_of(record);
        self.emit(&event);
        Ok(())
    }

    /// Record and immediately execute an operation authorized in a single
    /// signature.
    pub fn request_and_approve_with_authorization(
        &mut self,
        ctx: &CallContext,
        envelope: &MetaTxEnvelope,
    ) -> EngineResult<u64> {
        self.state.ensure_initialized()?;
        self.require_action(envelope, TxAction::SignMetaRequestAndApprove)?;
        let signer =
            self.verify_authorization(ctx, envelope, TxAction::ExecuteMetaRequestAndApprove)?;
        if envelope.record.params.target.is_zero() {
            return Err(EngineError::InvalidAddress("target must not be zero".into()));
        }
        self.check_target(
            &envelope.record.params.execution_selector,
            &envelope.record.params.target,
        )?;
        self.check_funds(&envelope.record)?;

        self.state.bump_nonce(&signer);
        let record = self.state.ledger.record(
            envelope.record.params.clone(),
            envelope.record.release_time,
            envelope.message_hash,
            envelope.record.payment.clone(),
        )?;
        let id = record.id;
        self.state.ledger.begin_execution(id, None)?;
        self.execute_and_settle(id);
        Ok(id)
    }

    // ── administration ───────────────────────────────────────────────

    pub fn apply_admin(&mut self, action: AdminAction) -> EngineResult<()> {
        self.state.apply_admin(action)
    }

    pub fn execute_batch(&mut self, actions: Vec<AdminAction>) -> EngineResult<()> {
        self.state.execute_batch(actions)
    }

    // ── query surface ────────────────────────────────────────────────

    pub fn transaction(&self, tx_id: u64) -> EngineResult<&TxRecord> {
        self.state.ledger.get(tx_id)
    }

    pub fn pending_transaction_ids(&self) -> Vec<u64> {
        self.state.ledger.pending_ids()
    }

    pub fn wallet_roles(&self, wallet: &Address) -> Vec<RoleId> {
        self.state.roles.wallet_roles(wallet)
    }

    pub fn roles(&self) -> Vec<&aegis_roles::Role> {
        self.state.roles.roles()
    }

    pub fn function_schemas(&self) -> Vec<&aegis_registry::FunctionSchema> {
        self.state.registry.schemas()
    }

    pub fn permission(&self, role: &RoleId, selector: &Selector) -> Option<&FunctionPermission> {
        self.state.roles.permission(role, selector)
    }

    pub fn nonce(&self, signer: &Address) -> u64 {
        self.state.nonce(signer)
    }

    pub fn whitelist_targets(&self, selector: &Selector) -> Vec<Address> {
        self.state.whitelist.targets(selector)
    }

    pub fn macro_selectors(&self) -> Vec<Selector> {
        self.state.macro_selectors.to_vec()
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Direct state access for wrapper layers; all writes still go through
    /// the validated component entry points.
    pub fn state_mut(&mut self) -> &mut EngineState {
        &mut self.state
    }

    pub fn domain_context(&self) -> DomainContext {
        DomainContext {
            protocol_name: PROTOCOL_NAME.into(),
            protocol_version: PROTOCOL_VERSION.into(),
            chain_id: self.state.chain_id,
            account: self.state.self_address,
        }
    }

    // ── internals ────────────────────────────────────────────────────

    /// Run the verifier pipeline and the permission checks shared by all
    /// meta-transaction entry points. Returns the recovered signer.
    fn verify_authorization(
        &self,
        ctx: &CallContext,
        envelope: &MetaTxEnvelope,
        executor_action: TxAction,
    ) -> EngineResult<Address> {
        let domain = self.domain_context();
        let signer = verify_envelope(
            envelope,
            &domain,
            self.clock.now(),
            ctx.gas_price,
            self.state.nonce(&envelope.params.signer),
            self.state.ledger.next_id(),
        )?;

        let handler = &envelope.params.handler_selector;
        let execution = &envelope.record.params.execution_selector;
        self.require_handler_covers(handler, execution)?;
        // The signer authorizes both the entry point and the operation.
        self.require_permission(&signer, handler, envelope.params.action)?;
        self.require_permission(&signer, execution, envelope.params.action)?;
        // The relayer holds the matching execute-meta grant.
        self.require_permission(&ctx.caller, handler, executor_action)?;
        Ok(signer)
    }

    fn require_action(&self, envelope: &MetaTxEnvelope, expected: TxAction) -> EngineResult<()> {
        if envelope.params.action != expected {
            return Err(EngineError::InvalidParameter(format!(
                "envelope action {:?} does not fit this entry point (expected {expected:?})",
                envelope.params.action
            )));
        }
        Ok(())
    }

    /// A stored record may only be resumed while `Pending`. Checked before
    /// any nonce or message-hash write: a stale envelope against an already
    /// cancelled or executed record must leave zero state change.
    fn require_pending(stored: &TxRecord) -> EngineResult<()> {
        if stored.status != TxStatus::Pending {
            return Err(EngineError::TransactionStatusMismatch {
                expected: TxStatus::Pending,
                actual: stored.status,
            });
        }
        Ok(())
    }

    /// The signed record must agree with the stored one field for field;
    /// only the signature may add information.
    fn require_envelope_matches(stored: &TxRecord, envelope: &MetaTxEnvelope) -> EngineResult<()> {
        if envelope.record.params != stored.params
            || envelope.record.payment != stored.payment
            || envelope.record.release_time != stored.release_time
        {
            return Err(EngineError::InvalidParameter(
                "envelope record diverges from the stored transaction".into(),
            ));
        }
        Ok(())
    }

    fn require_permission(
        &self,
        wallet: &Address,
        selector: &Selector,
        action: TxAction,
    ) -> EngineResult<()> {
        if !self.state.roles.has_action_permission(wallet, selector, action) {
            return Err(EngineError::NoPermission(format!(
                "wallet {wallet} lacks {action:?} on selector {selector}"
            )));
        }
        Ok(())
    }

    /// A handler entry point may only drive execution selectors it declares.
    fn require_handler_covers(&self, handler: &Selector, execution: &Selector) -> EngineResult<()> {
        let schema = self
            .state
            .registry
            .schema(handler)
            .ok_or_else(|| EngineError::ResourceNotFound(format!("function {handler}")))?;
        if !schema.handled_selectors.contains(execution) {
            return Err(EngineError::HandlerSelectorMismatch(format!(
                "handler {handler} does not cover execution selector {execution}"
            )));
        }
        Ok(())
    }

    /// Whitelist plus the macro-target gate for self-addressed calls.
    fn check_target(&self, execution: &Selector, target: &Address) -> EngineResult<()> {
        if *target == self.state.self_address && !self.state.macro_selectors.contains(execution) {
            return Err(EngineError::TargetNotWhitelisted {
                selector: *execution,
                target: *target,
            });
        }
        self.state.whitelist.check(
            execution,
            target,
            &self.state.self_address,
            self.state.registry.contains(execution),
        )
    }

    /// Native funds must cover the forwarded value and the native payment.
    fn check_funds(&self, record: &TxRecord) -> EngineResult<()> {
        let required = record.params.value.saturating_add(record.payment.native_amount);
        let available = self.payments.native_balance();
        if required > available {
            return Err(EngineError::InsufficientBalance { required, available });
        }
        Ok(())
    }

    /// Invoke the target and settle payment. The record is already out of
    /// `Pending` when this runs, so re-entrant calls bounce off the status
    /// checks. Target-call failures finalize as `Failed` and do not
    /// propagate.
    fn execute_and_settle(&mut self, tx_id: u64) {
        let record = match self.state.ledger.get(tx_id) {
            Ok(record) => record.clone(),
            Err(_) => return,
        };
        let outcome =
            self.executor.invoke(record.params.target, record.params.value, &record.params.call_data);

        let final_status = if outcome.success {
            if record.payment.is_none() {
                let _ = self.state.ledger.finalize(tx_id, TxStatus::Completed, outcome.output);
                TxStatus::Completed
            } else {
                // Payment guard mirrors the execution guard: flip first,
                // then call out.
                let _ = self.state.ledger.begin_payment(tx_id);
                match self.settle_payment(&record.payment) {
                    Ok(()) => {
                        let _ =
                            self.state.ledger.finalize(tx_id, TxStatus::Completed, outcome.output);
                        TxStatus::Completed
                    }
                    Err(err) => {
                        let _ = self.state.ledger.finalize(
                            tx_id,
                            TxStatus::Failed,
                            err.to_string().into_bytes(),
                        );
                        TxStatus::Failed
                    }
                }
            }
        } else {
            let _ = self.state.ledger.finalize(tx_id, TxStatus::Failed, outcome.output);
            TxStatus::Failed
        };

        info!(tx_id, status = ?final_status, "operation executed");
        if let Ok(record) = self.state.ledger.get(tx_id) {
            let event = Self::event_of(record);
            self.emit(&event);
        }
    }

    fn settle_payment(&mut self, payment: &PaymentDetails) -> EngineResult<()> {
        if payment.native_amount > 0
            && !self.payments.transfer(None, payment.recipient, payment.native_amount)
        {
            return Err(EngineError::PaymentFailed("native transfer returned false".into()));
        }
        if payment.token_amount > 0
            && !self.payments.transfer(Some(payment.token), payment.recipient, payment.token_amount)
        {
            return Err(EngineError::PaymentFailed("token transfer returned false".into()));
        }
        Ok(())
    }

    fn event_of(record: &TxRecord) -> OperationEvent {
        OperationEvent {
            tx_id: record.id,
            selector: record.params.execution_selector,
            status: record.status,
            requester: record.params.requester,
            target: record.params.target,
            category: record.params.category,
        }
    }

    /// Notification failures are logged, never surfaced.
    fn emit(&mut self, event: &OperationEvent) {
        if let Err(reason) = self.sink.notify(event) {
            warn!(tx_id = event.tx_id, reason, "event sink failed; ignoring");
        }
    }
}
