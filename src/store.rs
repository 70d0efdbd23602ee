// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 The tutorpay-rs Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Typed document collections with conditional mutation and live change
//! notification.
//!
//! [`MemoryStore`] stands in for the hosted document database: point
//! lookup, filtered query, closure-based mutation, and per-tutor change
//! subscription. Mutations are atomic per document (the closure runs under
//! the map entry's lock and can veto the write by returning an error),
//! which is what the lifecycle engine builds its compare-and-swap
//! transitions on. The wallet ledger is append-only; nothing in the API
//! can rewrite or drop an entry once pushed.
//!
//! Change events are published after commit to one channel per tutor
//! aggregate. Dropping the receiver tears the subscription down; dead
//! senders are pruned at the next publish.

use crate::base::{RequestId, StudentId, TutorId};
use crate::error::PayoutError;
use crate::model::{
    PasswordResetRequest, PaymentRequest, Settings, ShiftRequest, Student, Tutor,
    TutorChangeRequest, WalletTransaction, WithdrawalRequest,
};
use crossbeam::channel::{Receiver, Sender, unbounded};
use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Change notification delivered to wallet subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    TutorUpdated(TutorId),
    StudentUpdated(StudentId),
    WithdrawalUpdated(RequestId),
    LedgerAppended(u64),
}

/// In-memory document store with the collections the platform uses.
pub struct MemoryStore {
    students: DashMap<StudentId, Student>,
    tutors: DashMap<TutorId, Tutor>,
    payment_requests: DashMap<RequestId, PaymentRequest>,
    shift_requests: DashMap<RequestId, ShiftRequest>,
    tutor_change_requests: DashMap<RequestId, TutorChangeRequest>,
    password_reset_requests: DashMap<RequestId, PasswordResetRequest>,
    withdrawal_requests: DashMap<RequestId, WithdrawalRequest>,
    /// Append-only wallet audit log, in commit order.
    ledger: RwLock<Vec<Arc<WalletTransaction>>>,
    ledger_seq: AtomicU64,
    request_seq: AtomicU64,
    settings: RwLock<Settings>,
    watchers: DashMap<TutorId, Vec<Sender<WalletEvent>>>,
}

/// Runs a vetoable mutation under the entry lock and returns the updated
/// document.
///
/// The closure edits a draft; the stored document is replaced only when the
/// closure returns `Ok`, so an erroring transition leaves no state change.
fn mutate_in<K, T>(
    map: &DashMap<K, T>,
    id: &K,
    missing: PayoutError,
    mutate: impl FnOnce(&mut T) -> Result<(), PayoutError>,
) -> Result<T, PayoutError>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    let mut entry = map.get_mut(id).ok_or(missing)?;
    let mut draft = entry.value().clone();
    mutate(&mut draft)?;
    *entry.value_mut() = draft.clone();
    Ok(draft)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            students: DashMap::new(),
            tutors: DashMap::new(),
            payment_requests: DashMap::new(),
            shift_requests: DashMap::new(),
            tutor_change_requests: DashMap::new(),
            password_reset_requests: DashMap::new(),
            withdrawal_requests: DashMap::new(),
            ledger: RwLock::new(Vec::new()),
            ledger_seq: AtomicU64::new(0),
            request_seq: AtomicU64::new(0),
            settings: RwLock::new(Settings::default()),
            watchers: DashMap::new(),
        }
    }

    /// Allocates a store-unique request id with a collection prefix.
    pub fn next_request_id(&self, prefix: &str) -> RequestId {
        let n = self.request_seq.fetch_add(1, Ordering::Relaxed);
        RequestId::new(format!("{prefix}-{n}"))
    }

    // === students ===

    pub fn insert_student(&self, student: Student) -> Result<(), PayoutError> {
        use dashmap::mapref::entry::Entry;
        match self.students.entry(student.id.clone()) {
            Entry::Occupied(_) => Err(PayoutError::AccountExists),
            Entry::Vacant(slot) => {
                let tutor = student.assigned_tutor_id.clone();
                let id = student.id.clone();
                slot.insert(student);
                if let Some(tid) = tutor {
                    self.publish(&tid, WalletEvent::StudentUpdated(id));
                }
                Ok(())
            }
        }
    }

    pub fn student(&self, id: &StudentId) -> Option<Student> {
        self.students.get(id).map(|s| s.value().clone())
    }

    /// Mutates a student document atomically. The closure may return an
    /// error to veto the write, leaving the document untouched.
    pub fn mutate_student(
        &self,
        id: &StudentId,
        mutate: impl FnOnce(&mut Student) -> Result<(), PayoutError>,
    ) -> Result<Student, PayoutError> {
        let updated = mutate_in(&self.students, id, PayoutError::StudentNotFound, mutate)?;
        if let Some(tid) = &updated.assigned_tutor_id {
            self.publish(tid, WalletEvent::StudentUpdated(id.clone()));
        }
        Ok(updated)
    }

    pub fn remove_student(&self, id: &StudentId) -> Option<Student> {
        self.students.remove(id).map(|(_, s)| s)
    }

    /// Students assigned to the given tutor, in id order.
    pub fn roster(&self, tutor_id: &TutorId) -> Vec<Student> {
        let mut roster: Vec<Student> = self
            .students
            .iter()
            .filter(|s| s.assigned_tutor_id.as_ref() == Some(tutor_id))
            .map(|s| s.value().clone())
            .collect();
        roster.sort_by(|a, b| a.id.cmp(&b.id));
        roster
    }

    pub fn students(&self) -> Vec<Student> {
        self.students.iter().map(|s| s.value().clone()).collect()
    }

    // === tutors ===

    pub fn insert_tutor(&self, tutor: Tutor) -> Result<(), PayoutError> {
        use dashmap::mapref::entry::Entry;
        match self.tutors.entry(tutor.id.clone()) {
            Entry::Occupied(_) => Err(PayoutError::AccountExists),
            Entry::Vacant(slot) => {
                slot.insert(tutor);
                Ok(())
            }
        }
    }

    pub fn tutor(&self, id: &TutorId) -> Option<Tutor> {
        self.tutors.get(id).map(|t| t.value().clone())
    }

    pub fn mutate_tutor(
        &self,
        id: &TutorId,
        mutate: impl FnOnce(&mut Tutor) -> Result<(), PayoutError>,
    ) -> Result<Tutor, PayoutError> {
        let updated = mutate_in(&self.tutors, id, PayoutError::TutorNotFound, mutate)?;
        self.publish(id, WalletEvent::TutorUpdated(id.clone()));
        Ok(updated)
    }

    pub fn remove_tutor(&self, id: &TutorId) -> Option<Tutor> {
        self.tutors.remove(id).map(|(_, t)| t)
    }

    pub fn tutors(&self) -> Vec<Tutor> {
        let mut all: Vec<Tutor> = self.tutors.iter().map(|t| t.value().clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    // === withdrawal requests ===

    pub fn insert_withdrawal_request(&self, request: WithdrawalRequest) {
        let tutor_id = request.tutor_id.clone();
        let id = request.id.clone();
        self.withdrawal_requests.insert(id.clone(), request);
        self.publish(&tutor_id, WalletEvent::WithdrawalUpdated(id));
    }

    pub fn withdrawal_request(&self, id: &RequestId) -> Option<WithdrawalRequest> {
        self.withdrawal_requests.get(id).map(|r| r.value().clone())
    }

    pub fn mutate_withdrawal_request(
        &self,
        id: &RequestId,
        mutate: impl FnOnce(&mut WithdrawalRequest) -> Result<(), PayoutError>,
    ) -> Result<WithdrawalRequest, PayoutError> {
        let updated = mutate_in(
            &self.withdrawal_requests,
            id,
            PayoutError::RequestNotFound,
            mutate,
        )?;
        self.publish(&updated.tutor_id, WalletEvent::WithdrawalUpdated(id.clone()));
        Ok(updated)
    }

    pub fn withdrawal_requests_for(&self, tutor_id: &TutorId) -> Vec<WithdrawalRequest> {
        let mut requests: Vec<WithdrawalRequest> = self
            .withdrawal_requests
            .iter()
            .filter(|r| &r.tutor_id == tutor_id)
            .map(|r| r.value().clone())
            .collect();
        requests.sort_by(|a, b| a.id.cmp(&b.id));
        requests
    }

    /// Sum of pending withdrawal amounts for a tutor, optionally excluding
    /// one request (the one currently being settled).
    pub fn pending_withdrawal_total(
        &self,
        tutor_id: &TutorId,
        exclude: Option<&RequestId>,
    ) -> Decimal {
        self.withdrawal_requests
            .iter()
            .filter(|r| {
                &r.tutor_id == tutor_id
                    && !r.status.is_terminal()
                    && Some(&r.id) != exclude
            })
            .map(|r| r.amount)
            .sum()
    }

    // === other request collections ===

    pub fn insert_payment_request(&self, request: PaymentRequest) {
        self.payment_requests.insert(request.id.clone(), request);
    }

    pub fn payment_request(&self, id: &RequestId) -> Option<PaymentRequest> {
        self.payment_requests.get(id).map(|r| r.value().clone())
    }

    pub fn mutate_payment_request(
        &self,
        id: &RequestId,
        mutate: impl FnOnce(&mut PaymentRequest) -> Result<(), PayoutError>,
    ) -> Result<PaymentRequest, PayoutError> {
        mutate_in(&self.payment_requests, id, PayoutError::RequestNotFound, mutate)
    }

    pub fn insert_shift_request(&self, request: ShiftRequest) {
        self.shift_requests.insert(request.id.clone(), request);
    }

    pub fn shift_request(&self, id: &RequestId) -> Option<ShiftRequest> {
        self.shift_requests.get(id).map(|r| r.value().clone())
    }

    pub fn mutate_shift_request(
        &self,
        id: &RequestId,
        mutate: impl FnOnce(&mut ShiftRequest) -> Result<(), PayoutError>,
    ) -> Result<ShiftRequest, PayoutError> {
        mutate_in(&self.shift_requests, id, PayoutError::RequestNotFound, mutate)
    }

    pub fn insert_tutor_change_request(&self, request: TutorChangeRequest) {
        self.tutor_change_requests.insert(request.id.clone(), request);
    }

    pub fn tutor_change_request(&self, id: &RequestId) -> Option<TutorChangeRequest> {
        self.tutor_change_requests.get(id).map(|r| r.value().clone())
    }

    pub fn mutate_tutor_change_request(
        &self,
        id: &RequestId,
        mutate: impl FnOnce(&mut TutorChangeRequest) -> Result<(), PayoutError>,
    ) -> Result<TutorChangeRequest, PayoutError> {
        mutate_in(
            &self.tutor_change_requests,
            id,
            PayoutError::RequestNotFound,
            mutate,
        )
    }

    pub fn insert_password_reset_request(&self, request: PasswordResetRequest) {
        self.password_reset_requests
            .insert(request.id.clone(), request);
    }

    pub fn password_reset_request(&self, id: &RequestId) -> Option<PasswordResetRequest> {
        self.password_reset_requests.get(id).map(|r| r.value().clone())
    }

    pub fn mutate_password_reset_request(
        &self,
        id: &RequestId,
        mutate: impl FnOnce(&mut PasswordResetRequest) -> Result<(), PayoutError>,
    ) -> Result<PasswordResetRequest, PayoutError> {
        mutate_in(
            &self.password_reset_requests,
            id,
            PayoutError::RequestNotFound,
            mutate,
        )
    }

    // === wallet ledger ===

    /// Appends an audit entry, assigning its sequence number.
    ///
    /// The entry's `seq` field is overwritten with the allocated value.
    pub fn append_ledger(&self, mut entry: WalletTransaction) -> Arc<WalletTransaction> {
        entry.seq = self.ledger_seq.fetch_add(1, Ordering::SeqCst);
        let entry = Arc::new(entry);
        self.ledger.write().push(Arc::clone(&entry));
        tracing::debug!(
            seq = entry.seq,
            tutor = %entry.tutor_id,
            amount = %entry.amount,
            "ledger entry appended"
        );
        self.publish(&entry.tutor_id, WalletEvent::LedgerAppended(entry.seq));
        entry
    }

    pub fn ledger_for(&self, tutor_id: &TutorId) -> Vec<Arc<WalletTransaction>> {
        self.ledger
            .read()
            .iter()
            .filter(|e| &e.tutor_id == tutor_id)
            .cloned()
            .collect()
    }

    pub fn ledger_len(&self) -> usize {
        self.ledger.read().len()
    }

    // === settings ===

    pub fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    pub fn update_settings(&self, update: impl FnOnce(&mut Settings)) -> Settings {
        let mut settings = self.settings.write();
        update(&mut settings);
        settings.clone()
    }

    // === subscriptions ===

    /// Opens a live change subscription for one tutor aggregate.
    ///
    /// Dropping the receiver ends the subscription; the store prunes the
    /// dead channel at the next publish for that tutor.
    pub fn subscribe(&self, tutor_id: &TutorId) -> Receiver<WalletEvent> {
        let (tx, rx) = unbounded();
        self.watchers.entry(tutor_id.clone()).or_default().push(tx);
        rx
    }

    /// Number of live subscriptions for a tutor.
    pub fn subscriber_count(&self, tutor_id: &TutorId) -> usize {
        self.watchers.get(tutor_id).map_or(0, |w| w.len())
    }

    fn publish(&self, tutor_id: &TutorId, event: WalletEvent) {
        if let Some(mut senders) = self.watchers.get_mut(tutor_id) {
            senders.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}
