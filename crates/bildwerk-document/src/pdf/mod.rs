// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: page layout, composition, and read-back inspection.

pub mod composer;
pub mod inspect;
pub mod layout;

pub use composer::DocumentComposer;
pub use inspect::PdfInspector;
