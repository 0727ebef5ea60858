//! # HP3458A RS
//!
//! A Rust library for high-rate sampling with the HP3458A digital multimeter over GPIB.
//!
//! This library configures the instrument's digitizing modes, pulls readings out of its
//! reading memory, and attaches an error bound derived from the instrument's current
//! operating mode.
//!
//! ## Features
//!
//! - **Acquisition modes**: sub-sampling, direct digitizing and timed DCV digitizing
//! - **Memory decoding**: SINT (2-byte) and DINT (4-byte) big-endian dumps, scaled by
//!   `ISCALE?` and returned in chronological order
//! - **Uncertainty**: datasheet-derived gain/offset/quantisation bounds per mode
//! - **GPIB over USB**: Prologix-style controllers via `serialport`, or any type
//!   implementing [`InstrumentSession`]
//! - **DataFrame output**: readings with error bars as a `polars` frame or CSV
//!
//! ## Examples
//!
//! ### DCV digitizing
//!
//! ```rust,no_run
//! use hp3458a::{DcvDigitizing, Hp3458a, SessionConfig};
//!
//! let mut dmm = Hp3458a::connect(None, SessionConfig::default())?;
//!
//! // 1000 readings at 10 kHz, 2 us aperture, 10 V range
//! dmm.configure_dcv_digitizing(&DcvDigitizing::new(1000, 10e3, 2e-6).with_max_input(10.0))?;
//!
//! // ... external trigger ...
//!
//! let readings = dmm.acquire(1000)?.with_sample_period(1e-4);
//! println!("{}", readings.to_dataframe()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Checking an aperture before use
//!
//! ```rust
//! use hp3458a::aperture_time_is_valid;
//!
//! assert!(aperture_time_is_valid(500e-9));
//! assert!(!aperture_time_is_valid(2.0));
//! ```
//!
//! ### Custom transport
//!
//! ```rust
//! use hp3458a::{read_samples, InstrumentSession, SessionError};
//!
//! struct Canned;
//!
//! impl InstrumentSession for Canned {
//!     fn write(&mut self, _command: &str) -> Result<(), SessionError> {
//!         Ok(())
//!     }
//!
//!     fn query(&mut self, command: &str) -> Result<String, SessionError> {
//!         Ok(if command == "MFORMAT?" { "2" } else { "0.5" }.to_string())
//!     }
//!
//!     fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, SessionError> {
//!         Ok([0u8, 4, 0, 2].into_iter().cycle().take(n).collect())
//!     }
//! }
//!
//! let samples = read_samples(&mut Canned, 2)?;
//! assert_eq!(samples, vec![1.0, 2.0]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod connector;
pub mod hp3458a;
pub mod memory;
pub mod modes;
pub mod readings;
pub mod session;
pub mod uncertainty;

// Re-export the main types for convenience
pub use session::{InstrumentSession, PrologixSession, SessionConfig, SessionError};

pub use connector::{ConnectorError, GpibAdapter, Hp3458aConnector};

pub use modes::{
    aperture_time_is_valid, configure_dcv_digitizing, configure_direct_digitizing,
    configure_sub_sampling, Command, ConfigError, DcvDigitizing, DirectDigitizing, SubSampling,
};

pub use memory::{read_samples, MemoryError, MemoryFormat};

pub use uncertainty::{
    uncertainty_for_current_mode, OperatingMode, Resolution, UncertaintyBound, UncertaintyError,
};

pub use readings::Readings;

pub use hp3458a::{Hp3458a, Hp3458aError};
