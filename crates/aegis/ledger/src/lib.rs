//! Aegis Ledger - the transaction store and its state machine.
//!
//! Records are immutable once created except for status, result bytes, and
//! their membership in the pending index. Identifiers increase monotonically
//! from 1 and records are never deleted; history is permanent.
//!
//! The status transitions here are the engine's only concurrency-control
//! primitive: callers flip the status before making any outward call, so a
//! re-entrant call finds the record already out of `Pending` and is rejected
//! by the same checks.

#![deny(unsafe_code)]

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use aegis_types::{
    EngineError, EngineResult, Hash32, OrderedSet, PaymentDetails, TxParams, TxRecord, TxStatus,
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionLedger {
    records: HashMap<u64, TxRecord>,
    /// Record ids in allocation order.
    id_order: Vec<u64>,
    pending: OrderedSet<u64>,
    counter: u64,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id the next recorded transaction will receive.
    pub fn next_id(&self) -> u64 {
        self.counter + 1
    }

    /// Store a new record as `Pending` and index it.
    pub fn record(
        &mut self,
        params: TxParams,
        release_time: DateTime<Utc>,
        message_hash: Hash32,
        payment: PaymentDetails,
    ) -> EngineResult<&TxRecord> {
        self.counter += 1;
        let id = self.counter;
        let record = TxRecord {
            id,
            release_time,
            status: TxStatus::Pending,
            params,
            message_hash,
            result: Vec::new(),
            payment,
        };
        self.records.insert(id, record);
        self.id_order.push(id);
        self.pending.insert(id);
        info!(tx_id = id, %release_time, "transaction recorded");
        Ok(&self.records[&id])
    }

    pub fn get(&self, id: u64) -> EngineResult<&TxRecord> {
        self.records
            .get(&id)
            .ok_or_else(|| EngineError::ResourceNotFound(format!("transaction {id}")))
    }

    /// Pending transaction ids in request order.
    pub fn pending_ids(&self) -> Vec<u64> {
        self.pending.to_vec()
    }

    pub fn is_pending(&self, id: u64) -> bool {
        self.pending.contains(&id)
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// All record ids in allocation order.
    pub fn ids(&self) -> &[u64] {
        &self.id_order
    }

    /// Flip `Pending -> Executing`.
    ///
    /// When `release_gate` carries the current time, the time-lock is
    /// enforced; meta-transaction approvals pass `None` because the
    /// signature is their second authorization channel.
    pub fn begin_execution(
        &mut self,
        id: u64,
        release_gate: Option<DateTime<Utc>>,
    ) -> EngineResult<()> {
        let record = self.get_mut(id)?;
        Self::expect_status(record, TxStatus::Pending)?;
        if let Some(now) = release_gate {
            if now < record.release_time {
                return Err(EngineError::BeforeReleaseTime { release_time: record.release_time });
            }
        }
        record.status = TxStatus::Executing;
        Ok(())
    }

    /// Flip `Executing -> ProcessingPayment` before settling the payment.
    pub fn begin_payment(&mut self, id: u64) -> EngineResult<()> {
        let record = self.get_mut(id)?;
        Self::expect_status(record, TxStatus::Executing)?;
        record.status = TxStatus::ProcessingPayment;
        Ok(())
    }

    /// Terminal transition to `Completed` or `Failed`; removes the pending
    /// index entry and stores the result or failure payload.
    pub fn finalize(&mut self, id: u64, status: TxStatus, result: Vec<u8>) -> EngineResult<()> {
        if !matches!(status, TxStatus::Completed | TxStatus::Failed) {
            return Err(EngineError::InvalidParameter(format!(
                "finalize requires a terminal status, got {status:?}"
            )));
        }
        let record = self.get_mut(id)?;
        if !record.status.can_transition_to(status) {
            return Err(EngineError::TransactionStatusMismatch {
                expected: TxStatus::Executing,
                actual: record.status,
            });
        }
        record.status = status;
        record.result = result;
        self.pending.remove(&id);
        info!(tx_id = id, ?status, "transaction finalized");
        Ok(())
    }

    /// Flip `Pending -> Cancelled` and drop the pending index entry.
    pub fn cancel(&mut self, id: u64) -> EngineResult<()> {
        let record = self.get_mut(id)?;
        Self::expect_status(record, TxStatus::Pending)?;
        record.status = TxStatus::Cancelled;
        self.pending.remove(&id);
        info!(tx_id = id, "transaction cancelled");
        Ok(())
    }

    /// Attach the authorization message hash once it is known.
    pub fn set_message_hash(&mut self, id: u64, hash: Hash32) -> EngineResult<()> {
        self.get_mut(id)?.message_hash = hash;
        Ok(())
    }

    fn get_mut(&mut self, id: u64) -> EngineResult<&mut TxRecord> {
        self.records
            .get_mut(&id)
            .ok_or_else(|| EngineError::ResourceNotFound(format!("transaction {id}")))
    }

    fn expect_status(record: &TxRecord, expected: TxStatus) -> EngineResult<()> {
        if record.status != expected {
            return Err(EngineError::TransactionStatusMismatch {
                expected,
                actual: record.status,
            });
        }
        Ok(())
    }
}
