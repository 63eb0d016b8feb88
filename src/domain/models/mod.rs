// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod price;
pub mod rank_record;

pub use price::{global_rank, price_for_rank, CheckRow, PriceRow, PAGE_SIZE};
pub use rank_record::{ErrorRecord, RankRecord, UnsafeItemRecord};
