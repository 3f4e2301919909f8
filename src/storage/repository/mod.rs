// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed repositories over the encrypted storage layer.

pub mod notes;
pub mod stealth;

pub use notes::NoteRepository;
pub use stealth::StealthKeyRepository;
