// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! Control-block store tests
//!
//! - `layout`: window addressing and DCB field decoding
//! - `store`: range checks, reset, snapshot load
