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

//! Error types for payout and lifecycle operations.

use rust_decimal::Decimal;
use thiserror::Error;

/// Payout engine errors.
///
/// Every error is terminal to the single attempted operation; the engine
/// never leaves a partially applied money movement behind one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayoutError {
    /// Amount is missing, zero, negative, or below the minimum of 1
    #[error("invalid amount (must be at least 1)")]
    InvalidAmount,

    /// Requested amount exceeds the computed available balance
    #[error("insufficient available balance (available: {available})")]
    InsufficientBalance { available: Decimal },

    /// Referenced student document does not exist
    #[error("student not found")]
    StudentNotFound,

    /// Referenced tutor document does not exist
    #[error("tutor not found")]
    TutorNotFound,

    /// Referenced request document does not exist
    #[error("request not found")]
    RequestNotFound,

    /// Directory has no account for the given email
    #[error("account not found")]
    AccountNotFound,

    /// Student has no assigned tutor to credit
    #[error("student has no assigned tutor")]
    TutorNotAssigned,

    /// The one-time completion payout was already approved for this student
    #[error("payout already cleared for this student")]
    AlreadyCleared,

    /// Student has not yet completed the accrual period, or is inactive
    #[error("student is not eligible for the completion payout")]
    NotEligible,

    /// Request has already been approved or rejected
    #[error("request already resolved")]
    RequestAlreadyResolved,

    /// Shift hour outside the fixed 24 hourly slots
    #[error("invalid slot hour (must be 0-23)")]
    InvalidSlot,

    /// A required form field was empty
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Credentials did not match a directory account
    #[error("invalid credentials")]
    AuthFailed,

    /// An account already exists for the given id or email
    #[error("account already exists")]
    AccountExists,

    /// Underlying document store or directory failure
    #[error("store failure: {0}")]
    Store(String),
}

#[cfg(test)]
mod tests {
    use super::PayoutError;
    use rust_decimal_macros::dec;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            PayoutError::InvalidAmount.to_string(),
            "invalid amount (must be at least 1)"
        );
        assert_eq!(
            PayoutError::InsufficientBalance {
                available: dec!(600)
            }
            .to_string(),
            "insufficient available balance (available: 600)"
        );
        assert_eq!(PayoutError::StudentNotFound.to_string(), "student not found");
        assert_eq!(PayoutError::TutorNotFound.to_string(), "tutor not found");
        assert_eq!(PayoutError::RequestNotFound.to_string(), "request not found");
        assert_eq!(
            PayoutError::AlreadyCleared.to_string(),
            "payout already cleared for this student"
        );
        assert_eq!(
            PayoutError::NotEligible.to_string(),
            "student is not eligible for the completion payout"
        );
        assert_eq!(
            PayoutError::RequestAlreadyResolved.to_string(),
            "request already resolved"
        );
        assert_eq!(
            PayoutError::MissingField("reason").to_string(),
            "missing required field: reason"
        );
        assert_eq!(
            PayoutError::Store("timeout".into()).to_string(),
            "store failure: timeout"
        );
    }

    #[test]
    fn insufficient_balance_carries_computed_figure() {
        let err = PayoutError::InsufficientBalance {
            available: dec!(266.67),
        };
        assert!(err.to_string().contains("266.67"));
    }

    #[test]
    fn errors_are_cloneable() {
        let error = PayoutError::AlreadyCleared;
        let cloned = error.clone();
        assert_eq!(error, cloned);
    }
}
