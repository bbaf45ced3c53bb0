// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Recording retrieval and export client for network video recorders.

pub mod assembler;
pub mod availability;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod export;
pub mod manifest;
pub mod pipeline;
pub mod retriever;
pub mod time;
pub mod transport;
pub mod validator;
