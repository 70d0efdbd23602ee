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

//! # tutorpay
//!
//! Payout accrual and withdrawal engine for a tutoring marketplace:
//! students subscribe and are assigned to tutors, tutors earn a
//! time-proportional projection toward a fixed completion payout, and every
//! actual movement of money is an admin-gated transition against an
//! append-only wallet ledger.
//!
//! ## Core Components
//!
//! - [`accrual`]: pure balance computation (projection, available balance,
//!   wallet snapshot)
//! - [`PayoutEngine`]: lifecycle state machine for payments, payouts, and
//!   withdrawals
//! - [`MemoryStore`]: typed document collections with conditional mutation
//!   and live change subscription
//! - [`AccountDirectory`]: principal authentication and credential rotation
//! - [`PayoutError`]: error taxonomy for every fallible operation
//!
//! ## Example
//!
//! ```
//! use chrono::{Duration, Utc};
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//! use tutorpay_rs::{MemoryStore, PayoutEngine, Student, StudentId, Tutor, TutorId};
//!
//! let engine = PayoutEngine::new(Arc::new(MemoryStore::new()));
//! let now = Utc::now();
//!
//! let tutor_id = TutorId::new("t1");
//! engine
//!     .register_tutor(Tutor::new(tutor_id.clone(), "Asha", "asha@example.com", "99999", now))
//!     .unwrap();
//!
//! let mut student = Student::new(
//!     StudentId::new("s1"), "Ravi", "ravi@example.com", "98765",
//!     now - Duration::days(10),
//! );
//! student.is_active = true;
//! student.assigned_tutor_id = Some(tutor_id.clone());
//! engine.register_student(student).unwrap();
//!
//! // Ten active days project 266.67, but nothing is withdrawable until an
//! // admin moves money into the wallet.
//! let wallet = engine.wallet_snapshot(&tutor_id, now).unwrap();
//! assert_eq!(wallet.projected_accrual, dec!(266.67));
//! assert_eq!(wallet.available, dec!(0));
//! ```
//!
//! ## Thread Safety
//!
//! All components are safe to share across threads. Per-document mutations
//! are atomic, and the two multi-document money-moving approvals serialize
//! on an internal settlement lock, so concurrent admin sessions cannot
//! double-credit a payout or overdraw a wallet.

pub mod accrual;
mod base;
mod directory;
mod engine;
pub mod error;
pub mod model;
mod store;

pub use accrual::WalletSnapshot;
pub use base::{RequestId, StudentId, TutorId};
pub use directory::{AccountDirectory, Principal, Role};
pub use engine::PayoutEngine;
pub use error::PayoutError;
pub use model::{
    BankAccount, LedgerEntryKind, PasswordResetRequest, PaymentMethod, PaymentMethodKind,
    PaymentRequest, PayoutDestination, RequestStatus, Settings, ShiftRequest, SlotHour,
    SlotPeriod, Student, Tutor, TutorChangeRequest, WalletTransaction, WithdrawalRequest,
};
pub use store::{MemoryStore, WalletEvent};
