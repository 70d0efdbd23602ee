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

//! Payout lifecycle engine.
//!
//! The [`PayoutEngine`] owns every state transition with financial meaning:
//! request resolution, the one-time 30-day completion payout, withdrawal
//! settlement, and manual admin credits. `admin_added_balance` is mutated
//! here and nowhere else, and every mutation appends exactly one wallet
//! ledger entry.
//!
//! # Settlement atomicity
//!
//! The store only guarantees single-document atomicity. The two operations
//! that touch more than one document while moving money (completion payout
//! approval and withdrawal approval) serialize on a settlement mutex, and
//! each re-validates its precondition inside the document mutation closure
//! so a lost race surfaces as an error instead of a double credit.
//!
//! # Invariants
//!
//! - `admin_added_balance` never goes negative.
//! - A student's completion payout is credited at most once.
//! - Projected accrual is never consulted by a settlement path.
//! - Ledger entries reconcile: `new == previous ± amount`.

use crate::accrual::{self, WalletSnapshot};
use crate::base::{RequestId, StudentId, TutorId};
use crate::directory::AccountDirectory;
use crate::error::PayoutError;
use crate::model::{
    LedgerEntryKind, PasswordResetRequest, PaymentRequest, RequestStatus, ShiftRequest, SlotHour,
    Student, Tutor, TutorChangeRequest, WalletTransaction, WithdrawalRequest,
};
use crate::store::MemoryStore;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{info, warn};

/// Subscription validity window granted on payment approval.
const PLAN_DAYS: i64 = 30;

/// Lifecycle engine over a shared document store.
pub struct PayoutEngine {
    store: Arc<MemoryStore>,
    /// Serializes the multi-document money-moving approvals.
    settlement: Mutex<()>,
}

fn require(field: &'static str, value: &str) -> Result<(), PayoutError> {
    if value.trim().is_empty() {
        Err(PayoutError::MissingField(field))
    } else {
        Ok(())
    }
}

fn approve_status(status: &mut RequestStatus) -> Result<(), PayoutError> {
    if status.is_terminal() {
        return Err(PayoutError::RequestAlreadyResolved);
    }
    *status = RequestStatus::Approved;
    Ok(())
}

fn reject_status(status: &mut RequestStatus) -> Result<(), PayoutError> {
    if status.is_terminal() {
        return Err(PayoutError::RequestAlreadyResolved);
    }
    *status = RequestStatus::Rejected;
    Ok(())
}

impl PayoutEngine {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            settlement: Mutex::new(()),
        }
    }

    /// The backing store, for queries and live subscriptions.
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    // === registration & assignment ===

    pub fn register_student(&self, student: Student) -> Result<(), PayoutError> {
        require("name", &student.name)?;
        require("email", &student.email)?;
        if let Some(tutor_id) = &student.assigned_tutor_id {
            if self.store.tutor(tutor_id).is_none() {
                return Err(PayoutError::TutorNotFound);
            }
        }
        self.store.insert_student(student)
    }

    pub fn register_tutor(&self, tutor: Tutor) -> Result<(), PayoutError> {
        require("name", &tutor.name)?;
        require("email", &tutor.email)?;
        self.store.insert_tutor(tutor)
    }

    /// Assigns a student to a tutor's roster.
    pub fn assign_tutor(
        &self,
        student_id: &StudentId,
        tutor_id: &TutorId,
    ) -> Result<Student, PayoutError> {
        if self.store.tutor(tutor_id).is_none() {
            return Err(PayoutError::TutorNotFound);
        }
        self.store.mutate_student(student_id, |s| {
            s.assigned_tutor_id = Some(tutor_id.clone());
            Ok(())
        })
    }

    // === payment requests ===

    /// Records a student's proof-of-payment submission, priced from the
    /// settings document.
    pub fn submit_payment_request(
        &self,
        student_id: &StudentId,
        txn_id: &str,
        pay_date: &str,
        pay_time: &str,
        now: DateTime<Utc>,
    ) -> Result<PaymentRequest, PayoutError> {
        require("txnId", txn_id)?;
        require("payDate", pay_date)?;
        require("payTime", pay_time)?;
        let student = self
            .store
            .student(student_id)
            .ok_or(PayoutError::StudentNotFound)?;
        let request = PaymentRequest {
            id: self.store.next_request_id("pay"),
            student_id: student.id.clone(),
            student_email: student.email.clone(),
            amount: self.store.settings().student_price,
            txn_id: txn_id.to_string(),
            pay_date: pay_date.to_string(),
            pay_time: pay_time.to_string(),
            status: RequestStatus::Pending,
            created_at: now,
            approved_at: None,
            rejected_at: None,
        };
        self.store.insert_payment_request(request.clone());
        Ok(request)
    }

    /// Approves a payment and activates the student.
    ///
    /// Sets `plan_start`/`plan_end` for subscription validity. The payout
    /// day-counter stays anchored on `created_at` and is not touched here.
    pub fn approve_payment_request(
        &self,
        request_id: &RequestId,
        now: DateTime<Utc>,
    ) -> Result<(), PayoutError> {
        let request = self
            .store
            .payment_request(request_id)
            .ok_or(PayoutError::RequestNotFound)?;
        if self.store.student(&request.student_id).is_none() {
            return Err(PayoutError::StudentNotFound);
        }
        self.store.mutate_payment_request(request_id, |r| {
            approve_status(&mut r.status)?;
            r.approved_at = Some(now);
            Ok(())
        })?;
        self.store.mutate_student(&request.student_id, |s| {
            s.is_active = true;
            s.plan_start = Some(now);
            s.plan_end = Some(now + Duration::days(PLAN_DAYS));
            Ok(())
        })?;
        info!(student = %request.student_id, "payment approved, student activated");
        Ok(())
    }

    pub fn reject_payment_request(
        &self,
        request_id: &RequestId,
        now: DateTime<Utc>,
    ) -> Result<(), PayoutError> {
        self.store.mutate_payment_request(request_id, |r| {
            reject_status(&mut r.status)?;
            r.rejected_at = Some(now);
            Ok(())
        })?;
        Ok(())
    }

    // === shift requests ===

    pub fn submit_shift_request(
        &self,
        student_id: &StudentId,
        hour: u8,
        now: DateTime<Utc>,
    ) -> Result<ShiftRequest, PayoutError> {
        let hour = SlotHour::new(hour).ok_or(PayoutError::InvalidSlot)?;
        let student = self
            .store
            .student(student_id)
            .ok_or(PayoutError::StudentNotFound)?;
        let request = ShiftRequest {
            id: self.store.next_request_id("shift"),
            student_id: student.id.clone(),
            student_name: student.name.clone(),
            hour,
            status: RequestStatus::Pending,
            created_at: now,
        };
        self.store.insert_shift_request(request.clone());
        Ok(request)
    }

    pub fn approve_shift_request(&self, request_id: &RequestId) -> Result<(), PayoutError> {
        self.store
            .mutate_shift_request(request_id, |r| approve_status(&mut r.status))?;
        Ok(())
    }

    pub fn reject_shift_request(&self, request_id: &RequestId) -> Result<(), PayoutError> {
        self.store
            .mutate_shift_request(request_id, |r| reject_status(&mut r.status))?;
        Ok(())
    }

    // === tutor change requests ===

    pub fn submit_tutor_change_request(
        &self,
        student_id: &StudentId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<TutorChangeRequest, PayoutError> {
        require("reason", reason)?;
        let student = self
            .store
            .student(student_id)
            .ok_or(PayoutError::StudentNotFound)?;
        let request = TutorChangeRequest {
            id: self.store.next_request_id("change"),
            student_id: student.id.clone(),
            student_email: student.email.clone(),
            current_tutor_id: student.assigned_tutor_id.clone(),
            reason: reason.to_string(),
            status: RequestStatus::Pending,
            created_at: now,
        };
        self.store.insert_tutor_change_request(request.clone());
        Ok(request)
    }

    /// Approval unblocks reassignment; it does not move the student itself.
    pub fn approve_tutor_change_request(&self, request_id: &RequestId) -> Result<(), PayoutError> {
        self.store
            .mutate_tutor_change_request(request_id, |r| approve_status(&mut r.status))?;
        Ok(())
    }

    pub fn reject_tutor_change_request(&self, request_id: &RequestId) -> Result<(), PayoutError> {
        self.store
            .mutate_tutor_change_request(request_id, |r| reject_status(&mut r.status))?;
        Ok(())
    }

    // === password reset requests ===

    /// Records a credential rotation request. No secret is stored with it.
    pub fn request_password_reset(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<PasswordResetRequest, PayoutError> {
        require("email", email)?;
        let request = PasswordResetRequest {
            id: self.store.next_request_id("pwreset"),
            email: email.to_string(),
            status: RequestStatus::Pending,
            created_at: now,
        };
        self.store.insert_password_reset_request(request.clone());
        Ok(request)
    }

    /// Rotates the directory credential, then marks the request approved.
    ///
    /// The replacement password is supplied by the approving admin and goes
    /// straight to the directory; it never lands in a store document.
    pub fn approve_password_reset(
        &self,
        request_id: &RequestId,
        new_password: &str,
        directory: &AccountDirectory,
    ) -> Result<(), PayoutError> {
        require("newPassword", new_password)?;
        let request = self
            .store
            .password_reset_request(request_id)
            .ok_or(PayoutError::RequestNotFound)?;
        if request.status.is_terminal() {
            return Err(PayoutError::RequestAlreadyResolved);
        }
        directory.rotate_password(&request.email, new_password)?;
        self.store
            .mutate_password_reset_request(request_id, |r| approve_status(&mut r.status))?;
        Ok(())
    }

    pub fn reject_password_reset(&self, request_id: &RequestId) -> Result<(), PayoutError> {
        self.store
            .mutate_password_reset_request(request_id, |r| reject_status(&mut r.status))?;
        Ok(())
    }

    // === wallet: manual credit ===

    /// Credits a tutor's withdrawable balance by an admin-entered amount.
    pub fn credit_tutor(
        &self,
        tutor_id: &TutorId,
        amount: Decimal,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Arc<WalletTransaction>, PayoutError> {
        if amount < dec!(1) {
            return Err(PayoutError::InvalidAmount);
        }
        require("reason", reason)?;
        let updated = self.store.mutate_tutor(tutor_id, |t| {
            t.admin_added_balance += amount;
            Ok(())
        })?;
        let entry = self.store.append_ledger(WalletTransaction {
            seq: 0,
            tutor_id: tutor_id.clone(),
            kind: LedgerEntryKind::AdminAdd,
            amount,
            reason: reason.to_string(),
            student_id: None,
            withdrawal_request_id: None,
            timestamp: now,
            previous_balance: updated.admin_added_balance - amount,
            new_balance: updated.admin_added_balance,
        });
        info!(tutor = %tutor_id, %amount, "admin credit applied");
        Ok(entry)
    }

    // === wallet: completion payout ===

    /// Approves the one-time 30-day payout for a student.
    ///
    /// Atomic as a unit: marks the student cleared, credits the assigned
    /// tutor by the configured payout, and appends one ledger entry. The
    /// cleared flag is re-checked inside the student mutation, so two admins
    /// racing on the same student produce exactly one credit; the loser
    /// gets [`PayoutError::AlreadyCleared`].
    pub fn approve_completion_payout(
        &self,
        student_id: &StudentId,
        now: DateTime<Utc>,
    ) -> Result<Arc<WalletTransaction>, PayoutError> {
        let _settlement = self.settlement.lock();

        let student = self
            .store
            .student(student_id)
            .ok_or(PayoutError::StudentNotFound)?;
        if student.payout_cleared {
            return Err(PayoutError::AlreadyCleared);
        }
        let tutor_id = student
            .assigned_tutor_id
            .clone()
            .ok_or(PayoutError::TutorNotAssigned)?;
        if self.store.tutor(&tutor_id).is_none() {
            return Err(PayoutError::TutorNotFound);
        }
        if !accrual::eligible_for_completion(&student, now) {
            warn!(student = %student_id, "completion payout refused: not eligible");
            return Err(PayoutError::NotEligible);
        }

        self.store.mutate_student(student_id, |s| {
            if s.payout_cleared {
                return Err(PayoutError::AlreadyCleared);
            }
            s.payout_cleared = true;
            s.payout_cleared_at = Some(now);
            Ok(())
        })?;

        let payout = self.store.settings().tutor_payout;
        let updated = self.store.mutate_tutor(&tutor_id, |t| {
            t.admin_added_balance += payout;
            Ok(())
        })?;
        let entry = self.store.append_ledger(WalletTransaction {
            seq: 0,
            tutor_id: tutor_id.clone(),
            kind: LedgerEntryKind::CompletionPayout,
            amount: payout,
            reason: "30-day student payout approved".to_string(),
            student_id: Some(student_id.clone()),
            withdrawal_request_id: None,
            timestamp: now,
            previous_balance: updated.admin_added_balance - payout,
            new_balance: updated.admin_added_balance,
        });
        info!(student = %student_id, tutor = %tutor_id, %payout, "completion payout credited");
        Ok(entry)
    }

    /// Students on a tutor's roster currently eligible for the payout.
    pub fn eligible_for_completion(
        &self,
        tutor_id: &TutorId,
        now: DateTime<Utc>,
    ) -> Vec<Student> {
        self.store
            .roster(tutor_id)
            .into_iter()
            .filter(|s| accrual::eligible_for_completion(s, now))
            .collect()
    }

    // === wallet: withdrawals ===

    /// Opens a withdrawal request against the tutor's available balance.
    ///
    /// The amount is validated against `admin_added_balance` minus already
    /// pending requests; projected accrual is not withdrawable and plays no
    /// part here.
    pub fn request_withdrawal(
        &self,
        tutor_id: &TutorId,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalRequest, PayoutError> {
        if amount < dec!(1) {
            return Err(PayoutError::InvalidAmount);
        }
        let tutor = self
            .store
            .tutor(tutor_id)
            .ok_or(PayoutError::TutorNotFound)?;
        let pending = self.store.pending_withdrawal_total(tutor_id, None);
        let available = accrual::available_balance(tutor.admin_added_balance, pending);
        if amount > available {
            warn!(tutor = %tutor_id, %amount, %available, "withdrawal request refused");
            return Err(PayoutError::InsufficientBalance { available });
        }
        let request = WithdrawalRequest {
            id: self.store.next_request_id("wd"),
            tutor_id: tutor_id.clone(),
            amount,
            status: RequestStatus::Pending,
            requested_at: now,
            destination: tutor.payout_destination(),
            approved_at: None,
            rejected_at: None,
            deducted_amount: None,
            tutor_available_balance: None,
        };
        self.store.insert_withdrawal_request(request.clone());
        Ok(request)
    }

    /// Settles a pending withdrawal.
    ///
    /// Available balance is recomputed against the other pending requests
    /// at approval time; a request that no longer fits is refused with the
    /// computed figure and no state change.
    pub fn approve_withdrawal(
        &self,
        request_id: &RequestId,
        now: DateTime<Utc>,
    ) -> Result<Arc<WalletTransaction>, PayoutError> {
        let _settlement = self.settlement.lock();

        let request = self
            .store
            .withdrawal_request(request_id)
            .ok_or(PayoutError::RequestNotFound)?;
        if request.status.is_terminal() {
            return Err(PayoutError::RequestAlreadyResolved);
        }
        let tutor = self
            .store
            .tutor(&request.tutor_id)
            .ok_or(PayoutError::TutorNotFound)?;
        let other_pending = self
            .store
            .pending_withdrawal_total(&request.tutor_id, Some(request_id));
        let available = accrual::available_balance(tutor.admin_added_balance, other_pending);
        if request.amount > available {
            warn!(
                request = %request_id,
                amount = %request.amount,
                %available,
                "withdrawal approval refused"
            );
            return Err(PayoutError::InsufficientBalance { available });
        }

        let updated = self.store.mutate_tutor(&request.tutor_id, |t| {
            t.admin_added_balance -= request.amount;
            Ok(())
        })?;
        self.store.mutate_withdrawal_request(request_id, |r| {
            approve_status(&mut r.status)?;
            r.approved_at = Some(now);
            r.deducted_amount = Some(request.amount);
            r.tutor_available_balance = Some(available);
            Ok(())
        })?;
        let entry = self.store.append_ledger(WalletTransaction {
            seq: 0,
            tutor_id: request.tutor_id.clone(),
            kind: LedgerEntryKind::WithdrawalDebit,
            amount: request.amount,
            reason: "withdrawal approved".to_string(),
            student_id: None,
            withdrawal_request_id: Some(request_id.clone()),
            timestamp: now,
            previous_balance: updated.admin_added_balance + request.amount,
            new_balance: updated.admin_added_balance,
        });
        info!(
            request = %request_id,
            tutor = %request.tutor_id,
            amount = %request.amount,
            "withdrawal settled"
        );
        Ok(entry)
    }

    /// Rejects a pending withdrawal. Status change only.
    pub fn reject_withdrawal(
        &self,
        request_id: &RequestId,
        now: DateTime<Utc>,
    ) -> Result<(), PayoutError> {
        self.store.mutate_withdrawal_request(request_id, |r| {
            reject_status(&mut r.status)?;
            r.rejected_at = Some(now);
            Ok(())
        })?;
        Ok(())
    }

    // === wallet view ===

    /// Computed wallet figures for one tutor aggregate.
    pub fn wallet_snapshot(
        &self,
        tutor_id: &TutorId,
        now: DateTime<Utc>,
    ) -> Result<WalletSnapshot, PayoutError> {
        let tutor = self
            .store
            .tutor(tutor_id)
            .ok_or(PayoutError::TutorNotFound)?;
        let roster = self.store.roster(tutor_id);
        let pending = self.store.pending_withdrawal_total(tutor_id, None);
        let payout = self.store.settings().tutor_payout;
        Ok(WalletSnapshot::compute(&tutor, &roster, pending, payout, now))
    }
}
