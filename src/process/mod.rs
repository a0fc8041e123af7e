// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod runner;

#[cfg(test)]
pub use runner::MockProcessRunner;
pub use runner::{CommandSpec, ProcessError, ProcessOutput, ProcessRunner, TokioProcessRunner};
