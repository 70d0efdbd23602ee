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

//! Account directory: principals, credentials, and the current session.
//!
//! Stands in for the hosted identity provider. Credentials are held as
//! salted SHA-256 digests; plaintext passwords exist only transiently in
//! call arguments, including across the password-reset flow.

use crate::error::PayoutError;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Role attached to an authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Tutor,
    Admin,
}

/// An authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
struct DirectoryAccount {
    id: String,
    digest: String,
    role: Role,
}

/// In-memory directory of principals, keyed by email.
pub struct AccountDirectory {
    accounts: DashMap<String, DirectoryAccount>,
    current: RwLock<Option<Principal>>,
}

fn digest(email: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .fold(String::with_capacity(64), |mut out, byte| {
            use std::fmt::Write;
            let _ = write!(out, "{byte:02x}");
            out
        })
}

impl AccountDirectory {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            current: RwLock::new(None),
        }
    }

    /// Creates a principal. Fails if the email is already registered.
    pub fn register(
        &self,
        id: impl Into<String>,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<(), PayoutError> {
        use dashmap::mapref::entry::Entry;
        match self.accounts.entry(email.to_string()) {
            Entry::Occupied(_) => Err(PayoutError::AccountExists),
            Entry::Vacant(slot) => {
                slot.insert(DirectoryAccount {
                    id: id.into(),
                    digest: digest(email, password),
                    role,
                });
                Ok(())
            }
        }
    }

    /// Verifies credentials and establishes the session principal.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<Principal, PayoutError> {
        let account = self.accounts.get(email).ok_or(PayoutError::AuthFailed)?;
        if account.digest != digest(email, password) {
            return Err(PayoutError::AuthFailed);
        }
        let principal = Principal {
            id: account.id.clone(),
            email: email.to_string(),
            role: account.role,
        };
        *self.current.write() = Some(principal.clone());
        Ok(principal)
    }

    /// The currently signed-in principal, if any.
    pub fn current_principal(&self) -> Option<Principal> {
        self.current.read().clone()
    }

    pub fn sign_out(&self) {
        *self.current.write() = None;
    }

    /// Replaces an account's credential. Used by password-reset approval.
    pub fn rotate_password(&self, email: &str, new_password: &str) -> Result<(), PayoutError> {
        let mut account = self
            .accounts
            .get_mut(email)
            .ok_or(PayoutError::AccountNotFound)?;
        account.digest = digest(email, new_password);
        Ok(())
    }
}

impl Default for AccountDirectory {
    fn default() -> Self {
        Self::new()
    }
}
