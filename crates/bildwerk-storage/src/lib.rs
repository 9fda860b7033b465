// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// bildwerk-storage: Lifecycle of every temporary artifact Bildwerk creates.
//
// `TempResourceManager` owns the uploads, output and extraction areas under one
// root; `Janitor` sweeps them on a timer so nothing outlives the age limit even
// after a crash.

pub mod janitor;
pub mod temp;

pub use janitor::Janitor;
pub use temp::{SweepReport, TempArea, TempResourceManager};
