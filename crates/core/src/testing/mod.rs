//! Testing utilities and mock implementations for pipeline tests.
//!
//! This module provides mock implementations of the external-facing
//! traits, allowing end-to-end pipeline testing without a browser,
//! network, or media tooling.
//!
//! # Example
//!
//! ```rust,ignore
//! use hlsworth_core::testing::{MockPageDriver, MockQualityGate, MockTransferrer};
//!
//! let mut driver = MockPageDriver::new();
//! driver.set_items(3, "Show");
//! driver.add_candidate("海外推薦FLV", &["https://a.example/index.m3u8"]);
//!
//! let gate = MockQualityGate::new();
//! gate.script_cheap_width("https://a.example/index.m3u8", 1920);
//! ```

mod mock_assembler;
mod mock_driver;
mod mock_gate;
mod mock_transferrer;

pub use mock_assembler::MockAssembler;
pub use mock_driver::MockPageDriver;
pub use mock_gate::MockQualityGate;
pub use mock_transferrer::MockTransferrer;
