// Copyright 2025-Present Lumbertrace contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared mocks and helpers for the integration tests

pub mod helpers;
pub mod mocks;
