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

//! Document types held in the store collections.
//!
//! Field names serialize in camelCase to match the document format the
//! hosted store uses on the wire.

use crate::base::{RequestId, StudentId, TutorId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Resolution state shared by every admin-mediated request.
///
/// `Pending` is the only non-terminal state; `Approved` and `Rejected` are
/// final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

/// A subscribed learner.
///
/// `created_at` anchors the payout day-counter; `plan_start`/`plan_end`
/// track subscription validity and move independently of it. A student
/// accrues earnings for a tutor only while `is_active`, assigned to that
/// tutor, and not yet `payout_cleared`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub is_active: bool,
    pub assigned_tutor_id: Option<TutorId>,
    pub created_at: DateTime<Utc>,
    pub payout_cleared: bool,
    pub payout_cleared_at: Option<DateTime<Utc>>,
    pub plan_start: Option<DateTime<Utc>>,
    pub plan_end: Option<DateTime<Utc>>,
}

impl Student {
    /// Creates an inactive, unassigned student.
    pub fn new(
        id: StudentId,
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            is_active: false,
            assigned_tutor_id: None,
            created_at,
            payout_cleared: false,
            payout_cleared_at: None,
            plan_start: None,
            plan_end: None,
        }
    }
}

/// Bank transfer destination on file for a tutor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    pub holder_name: String,
    pub bank_name: String,
    pub account_number: String,
    pub ifsc: String,
}

impl BankAccount {
    /// Masked form for display and audit records, keeping the last four
    /// digits only.
    pub fn masked_number(&self) -> String {
        let tail = if self.account_number.len() >= 4 {
            &self.account_number[self.account_number.len() - 4..]
        } else {
            self.account_number.as_str()
        };
        format!("XXXX-XXXX-{tail}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethodKind {
    Upi,
    Phone,
    Paypal,
}

/// Alternative payout destination (UPI handle, phone wallet, or PayPal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    #[serde(rename = "type")]
    pub kind: PaymentMethodKind,
    pub value: String,
    pub name: String,
}

/// Where an approved withdrawal is settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PayoutDestination {
    Bank(BankAccount),
    Method(PaymentMethod),
}

/// A tutor and their wallet.
///
/// `admin_added_balance` is the only withdrawable balance. It changes
/// exclusively through the engine's transition operations (manual credit,
/// completion payout approval, withdrawal debit), each of which appends one
/// ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tutor {
    pub id: TutorId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub admin_added_balance: Decimal,
    pub bank_account: Option<BankAccount>,
    pub payment_methods: Vec<PaymentMethod>,
    pub created_at: DateTime<Utc>,
}

impl Tutor {
    /// Creates a tutor with a zero wallet and no payout destinations.
    pub fn new(
        id: TutorId,
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            admin_added_balance: Decimal::ZERO,
            bank_account: None,
            payment_methods: Vec::new(),
            created_at,
        }
    }

    /// Preferred settlement destination: the bank account when present,
    /// otherwise the first payment method.
    pub fn payout_destination(&self) -> Option<PayoutDestination> {
        if let Some(bank) = &self.bank_account {
            return Some(PayoutDestination::Bank(bank.clone()));
        }
        self.payment_methods
            .first()
            .map(|m| PayoutDestination::Method(m.clone()))
    }
}

/// A tutor's request to withdraw from `admin_added_balance`.
///
/// The settlement snapshot fields are populated on approval and never
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub id: RequestId,
    pub tutor_id: TutorId,
    pub amount: Decimal,
    pub status: RequestStatus,
    pub requested_at: DateTime<Utc>,
    pub destination: Option<PayoutDestination>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub deducted_amount: Option<Decimal>,
    pub tutor_available_balance: Option<Decimal>,
}

/// What moved a tutor's wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEntryKind {
    /// Manual admin credit ("add points")
    #[serde(rename = "admin_add")]
    AdminAdd,
    /// One-time 30-day completion payout
    #[serde(rename = "admin_30d_payout")]
    CompletionPayout,
    /// Approved withdrawal debit
    #[serde(rename = "withdrawal_debit")]
    WithdrawalDebit,
}

/// Append-only audit record for a wallet mutation.
///
/// Exactly one of these is produced per balance change, and
/// `new_balance == previous_balance + amount` for credits,
/// `new_balance == previous_balance - amount` for debits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    pub seq: u64,
    pub tutor_id: TutorId,
    #[serde(rename = "type")]
    pub kind: LedgerEntryKind,
    pub amount: Decimal,
    pub reason: String,
    pub student_id: Option<StudentId>,
    pub withdrawal_request_id: Option<RequestId>,
    pub timestamp: DateTime<Utc>,
    pub previous_balance: Decimal,
    pub new_balance: Decimal,
}

impl WalletTransaction {
    /// Whether the entry's balance fields reconcile with its amount.
    pub fn reconciles(&self) -> bool {
        match self.kind {
            LedgerEntryKind::AdminAdd | LedgerEntryKind::CompletionPayout => {
                self.new_balance == self.previous_balance + self.amount
            }
            LedgerEntryKind::WithdrawalDebit => {
                self.new_balance == self.previous_balance - self.amount
            }
        }
    }
}

/// A student's proof-of-payment submission awaiting admin review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub id: RequestId,
    pub student_id: StudentId,
    pub student_email: String,
    pub amount: Decimal,
    pub txn_id: String,
    pub pay_date: String,
    pub pay_time: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
}

/// One of the fixed 24 hourly teaching slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotHour(u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPeriod {
    Night,
    Morning,
    Afternoon,
    Evening,
}

impl SlotHour {
    pub fn new(hour: u8) -> Option<Self> {
        (hour < 24).then_some(Self(hour))
    }

    pub fn hour(self) -> u8 {
        self.0
    }

    /// Day-period bucket used when listing shift requests.
    pub fn period(self) -> SlotPeriod {
        match self.0 {
            0..=5 => SlotPeriod::Night,
            6..=11 => SlotPeriod::Morning,
            12..=17 => SlotPeriod::Afternoon,
            _ => SlotPeriod::Evening,
        }
    }
}

/// A student's request to move to a different hourly slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftRequest {
    pub id: RequestId,
    pub student_id: StudentId,
    pub student_name: String,
    pub hour: SlotHour,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

/// A student's request to be reassigned to another tutor.
///
/// Approval is a status change only; the actual reassignment is a separate
/// admin operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorChangeRequest {
    pub id: RequestId,
    pub student_id: StudentId,
    pub student_email: String,
    pub current_tutor_id: Option<TutorId>,
    pub reason: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

/// A credential rotation request awaiting admin review.
///
/// Carries no secret. The replacement password is supplied at approval time
/// and handed straight to the account directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetRequest {
    pub id: RequestId,
    pub email: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

/// Application settings document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// One-time completion payout credited per cleared student
    pub tutor_payout: Decimal,
    /// Subscription price quoted on payment requests
    pub student_price: Decimal,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tutor_payout: dec!(800),
            student_price: dec!(999),
        }
    }
}
