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

//! Accrual computation.
//!
//! Everything here is a pure function of document snapshots and a caller
//! supplied reference instant. The projected accrual figures are display
//! values only; the single withdrawable number is `admin_added_balance`
//! minus pending withdrawals, and nothing in this module ever feeds a
//! projection into it. Money only becomes withdrawable through an explicit
//! admin transition in the lifecycle engine, so a client cannot self-credit
//! by skewing its observed clock.
//!
//! # Example
//!
//! ```
//! use chrono::{Duration, Utc};
//! use rust_decimal_macros::dec;
//! use tutorpay_rs::{Student, StudentId, accrual};
//!
//! let now = Utc::now();
//! let mut student = Student::new(
//!     StudentId::new("s1"), "Ravi", "ravi@example.com", "98765",
//!     now - Duration::days(10),
//! );
//! student.is_active = true;
//!
//! let projected = accrual::accrual_projection([&student], dec!(800), now);
//! assert_eq!(projected, dec!(266.67));
//! ```

use crate::model::{Student, Tutor};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Number of days over which the completion payout is earned.
pub const ACCRUAL_PERIOD_DAYS: i64 = 30;

/// Rounds a money amount to two decimal places, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Whole days elapsed since the student's creation, clamped to zero.
///
/// Clock skew can put `created_at` in the future; a negative day count must
/// never reach the rate computation.
pub fn days_active(student: &Student, now: DateTime<Utc>) -> i64 {
    (now - student.created_at).num_days().max(0)
}

/// Per-day earning rate for a given completion payout amount.
pub fn daily_rate(payout: Decimal) -> Decimal {
    payout / Decimal::from(ACCRUAL_PERIOD_DAYS)
}

/// A single student's unrounded accrual contribution.
///
/// Zero unless the student is active, not yet cleared, and within days 1
/// through 29 of the accrual period. Students at or past day 30 stop
/// contributing here; their full payout shows up in
/// [`completion_pending_total`] instead. The result is intentionally left
/// unrounded so aggregation rounds once rather than compounding per-student
/// rounding error.
pub fn daily_accrual(student: &Student, payout: Decimal, now: DateTime<Utc>) -> Decimal {
    if !student.is_active || student.payout_cleared {
        return Decimal::ZERO;
    }
    let days = days_active(student, now);
    if days > 0 && days < ACCRUAL_PERIOD_DAYS {
        Decimal::from(days) * daily_rate(payout)
    } else {
        Decimal::ZERO
    }
}

/// Aggregate projected accrual across a roster, rounded once.
pub fn accrual_projection<'a, I>(students: I, payout: Decimal, now: DateTime<Utc>) -> Decimal
where
    I: IntoIterator<Item = &'a Student>,
{
    let total: Decimal = students
        .into_iter()
        .map(|s| daily_accrual(s, payout, now))
        .sum();
    round_money(total)
}

/// Whether a student qualifies for the one-time completion payout.
pub fn eligible_for_completion(student: &Student, now: DateTime<Utc>) -> bool {
    student.is_active && !student.payout_cleared && days_active(student, now) >= ACCRUAL_PERIOD_DAYS
}

/// Informational sum of completion payouts awaiting admin approval.
///
/// One `payout` per eligible student. Never part of the withdrawable
/// balance.
pub fn completion_pending_total<'a, I>(students: I, payout: Decimal, now: DateTime<Utc>) -> Decimal
where
    I: IntoIterator<Item = &'a Student>,
{
    students
        .into_iter()
        .filter(|s| eligible_for_completion(s, now))
        .map(|_| payout)
        .sum()
}

/// The only number a withdrawal may be validated against.
///
/// `max(0, admin_added - pending_withdrawals)`, rounded to two places.
pub fn available_balance(admin_added: Decimal, pending_withdrawals: Decimal) -> Decimal {
    round_money(admin_added - pending_withdrawals).max(Decimal::ZERO)
}

/// Computed wallet view for one tutor aggregate.
///
/// `available` is withdrawable; `projected_accrual` and
/// `completion_pending` are projections; `display_total` exists for the
/// wallet headline figure and is never consulted by settlement paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSnapshot {
    pub admin_added: Decimal,
    pub pending_withdrawals: Decimal,
    pub available: Decimal,
    pub projected_accrual: Decimal,
    pub completion_pending: Decimal,
    pub display_total: Decimal,
}

impl WalletSnapshot {
    /// Assembles the wallet view from a tutor, their roster, and the sum of
    /// their pending withdrawal requests.
    pub fn compute(
        tutor: &Tutor,
        roster: &[Student],
        pending_withdrawals: Decimal,
        payout: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        let admin_added = round_money(tutor.admin_added_balance);
        let available = available_balance(tutor.admin_added_balance, pending_withdrawals);
        let projected_accrual = accrual_projection(roster, payout, now);
        let completion_pending = completion_pending_total(roster, payout, now);
        Self {
            admin_added,
            pending_withdrawals,
            available,
            projected_accrual,
            completion_pending,
            display_total: round_money(available + projected_accrual),
        }
    }
}
