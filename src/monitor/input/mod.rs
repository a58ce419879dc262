// SPDX-License-Identifier: Apache-2.0

mod finder;
mod reader;

pub use finder::LogFileFinder;
pub use reader::{LineScanner, ScanSummary};
