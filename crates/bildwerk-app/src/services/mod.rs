// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: wires the document pipeline and temp storage into the
// request-level operations the front end calls.

pub mod conversion;
pub mod data_dir;
