// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Archive module: pull image entries out of ZIP uploads.

pub mod extractor;

pub use extractor::ArchiveExtractor;
