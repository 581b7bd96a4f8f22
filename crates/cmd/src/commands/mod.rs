// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

pub mod describe;
pub mod load;

pub use describe::describe_command;
pub use load::{LoadArgs, load_command};
