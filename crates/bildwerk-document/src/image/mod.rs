// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module: decode, measure and re-encode uploaded images.

pub mod normalizer;

pub use normalizer::ImageNormalizer;
