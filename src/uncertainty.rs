use crate::session::{parse_integer, InstrumentSession, SessionError};

#[derive(Debug, thiserror::Error)]
pub enum UncertaintyError {
    #[error("Cannot estimate uncertainty for function mode {0}")]
    UnsupportedMode(i64),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Function mode reported by `FUNC?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    /// DC voltage, sampled through the integrating converter.
    DcvSampling,
    /// Direct-sampled DC (`DSDC`).
    DirectSampling,
    /// Sub-sampled DC (`SSDC`).
    SubSamplingDc,
    Other(i64),
}

impl OperatingMode {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => OperatingMode::DcvSampling,
            12 => OperatingMode::DirectSampling,
            14 => OperatingMode::SubSamplingDc,
            other => OperatingMode::Other(other),
        }
    }
}

/// Query the current function mode.
///
/// `FUNC?` answers `<function>,<range>`; only the leading token is used. A
/// response without a comma is taken whole.
pub fn current_mode<S: InstrumentSession + ?Sized>(
    session: &mut S,
) -> Result<OperatingMode, SessionError> {
    let response = session.query("FUNC?")?;
    let token = response.split(',').next().unwrap_or_default();
    match parse_integer(token) {
        Some(code) => Ok(OperatingMode::from_code(code)),
        None => Err(SessionError::MalformedResponse {
            command: "FUNC?".to_string(),
            response,
        }),
    }
}

/// Effective resolution and bandwidth of the DCV converter for an aperture time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub bits: u32,
    /// -3 dB bandwidth in hertz. Not folded into [`UncertaintyBound`] yet.
    pub cutoff_3db: f64,
}

/// Upper aperture bound (exclusive) and the resolution it selects, ascending.
const RESOLUTION_TABLE: [(f64, Resolution); 4] = [
    (1e-6, Resolution { bits: 15, cutoff_3db: 400e3 }),
    (3e-6, Resolution { bits: 16, cutoff_3db: 206e3 }),
    (6e-6, Resolution { bits: 17, cutoff_3db: 69e3 }),
    (100e-6, Resolution { bits: 18, cutoff_3db: 35e3 }),
];

const SLOWEST_RESOLUTION: Resolution = Resolution {
    bits: 21,
    cutoff_3db: 2e3,
};

impl Resolution {
    pub fn for_aperture(t_aper: f64) -> Self {
        RESOLUTION_TABLE
            .iter()
            .find(|(upper, _)| t_aper < *upper)
            .map(|(_, resolution)| *resolution)
            .unwrap_or(SLOWEST_RESOLUTION)
    }

    /// One least significant bit on a range of `range` volts.
    pub fn lsb(&self, range: f64) -> f64 {
        range / 2f64.powi(self.bits as i32)
    }
}

/// Error model for a reading: `V0 * relative + absolute`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UncertaintyBound {
    /// Fraction of reading.
    pub relative: f64,
    /// Constant term in volts.
    pub absolute: f64,
}

impl UncertaintyBound {
    /// Gain error of the DCV path, fraction of reading.
    pub const DCV_RELATIVE: f64 = 14e-6;
    /// Offset error of the DCV path, volts.
    pub const DCV_OFFSET: f64 = 3e-6;
    /// Gain error of direct sampling (0.02 %).
    pub const DIRECT_SAMPLING_RELATIVE: f64 = 0.0002;

    pub fn new(relative: f64, absolute: f64) -> Self {
        Self { relative, absolute }
    }

    /// DCV sampling: fixed gain error plus offset and one LSB at the resolution
    /// the aperture allows.
    pub fn dcv_sampling(resolution: Resolution, range: f64) -> Self {
        Self::new(
            Self::DCV_RELATIVE,
            Self::DCV_OFFSET + resolution.lsb(range),
        )
    }

    /// Direct sampling: 0.02 % of reading plus 16-bit quantisation of the range.
    pub fn direct_sampling(range: f64) -> Self {
        Self::new(Self::DIRECT_SAMPLING_RELATIVE, range / 65_536.0)
    }

    /// Placeholder for sub-sampled DC. Not derived from the datasheet, treat it as
    /// a wide bound rather than a calibrated one.
    pub fn sub_sampling_placeholder() -> Self {
        Self::new(1.0, 1.0)
    }

    /// Error bar for one reading. Uses the reading's magnitude so negative
    /// readings get the same bar as their positive counterparts.
    pub fn error_for(&self, reading: f64) -> f64 {
        reading.abs() * self.relative + self.absolute
    }
}

/// Estimate the error bound valid for readings taken in the current mode.
///
/// The bound comes from live device state (`FUNC?`, `APER?`, `RANGE?`), never
/// from the readings themselves.
///
/// Issues `FUNC?` first and stops there if the mode is not one of DCV (1),
/// direct sampling (12) or sub-sampled DC (14).
pub fn uncertainty_for_current_mode<S: InstrumentSession + ?Sized>(
    session: &mut S,
) -> Result<UncertaintyBound, UncertaintyError> {
    let _span = tracing::debug_span!("uncertainty_for_current_mode").entered();

    let mode = current_mode(session)?;
    log::debug!("Estimating uncertainty for {:?}", mode);

    match mode {
        OperatingMode::DcvSampling => {
            let t_aper = session.query_f64("APER?")?;
            let resolution = Resolution::for_aperture(t_aper);
            log::debug!(
                "Aperture {} s gives {} bits, {} Hz bandwidth",
                t_aper,
                resolution.bits,
                resolution.cutoff_3db
            );
            let range = session.query_f64("RANGE?")?;
            Ok(UncertaintyBound::dcv_sampling(resolution, range))
        }
        OperatingMode::DirectSampling => {
            let range = session.query_f64("RANGE?")?;
            Ok(UncertaintyBound::direct_sampling(range))
        }
        OperatingMode::SubSamplingDc => {
            log::warn!("Sub-sampling uncertainty is a placeholder, not a calibrated bound");
            Ok(UncertaintyBound::sub_sampling_placeholder())
        }
        OperatingMode::Other(code) => Err(UncertaintyError::UnsupportedMode(code)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::mock::MockSession;

    #[test]
    fn test_resolution_boundaries() {
        assert_eq!(Resolution::for_aperture(999e-9).bits, 15);
        assert_eq!(Resolution::for_aperture(1000e-9).bits, 16);
        assert_eq!(Resolution::for_aperture(2999e-9).bits, 16);
        assert_eq!(Resolution::for_aperture(3000e-9).bits, 17);
        assert_eq!(Resolution::for_aperture(5.999e-6).bits, 17);
        assert_eq!(Resolution::for_aperture(6e-6).bits, 18);
        assert_eq!(Resolution::for_aperture(99.99e-6).bits, 18);
        assert_eq!(Resolution::for_aperture(100e-6).bits, 21);
        assert_eq!(Resolution::for_aperture(1.0).bits, 21);
    }

    #[test]
    fn test_resolution_bandwidth() {
        assert_eq!(Resolution::for_aperture(500e-9).cutoff_3db, 400e3);
        assert_eq!(Resolution::for_aperture(2e-6).cutoff_3db, 206e3);
        assert_eq!(Resolution::for_aperture(4e-6).cutoff_3db, 69e3);
        assert_eq!(Resolution::for_aperture(50e-6).cutoff_3db, 35e3);
        assert_eq!(Resolution::for_aperture(1e-3).cutoff_3db, 2e3);
    }

    #[test]
    fn test_dcv_sampling_bound() {
        let mut session = MockSession::new()
            .respond("FUNC?", "1,10")
            .respond("APER?", "2e-6")
            .respond("RANGE?", "10");

        let bound = uncertainty_for_current_mode(&mut session).unwrap();

        assert_eq!(bound.relative, 14e-6);
        assert_eq!(bound.absolute, 3e-6 + 10.0 / 65536.0);
        assert_eq!(session.sent, vec!["FUNC?", "APER?", "RANGE?"]);
    }

    #[test]
    fn test_direct_sampling_bound() {
        let mut session = MockSession::new()
            .respond("FUNC?", "12,1")
            .respond("RANGE?", "1");

        let bound = uncertainty_for_current_mode(&mut session).unwrap();

        assert_eq!(bound, UncertaintyBound::new(0.0002, 1.0 / 65536.0));
        assert!(!session.queried("APER?"));
    }

    #[test]
    fn test_sub_sampling_placeholder() {
        let mut session = MockSession::new().respond("FUNC?", "14,10");

        let bound = uncertainty_for_current_mode(&mut session).unwrap();

        assert_eq!(bound, UncertaintyBound::new(1.0, 1.0));
        assert_eq!(session.sent, vec!["FUNC?"]);
    }

    #[test]
    fn test_unsupported_mode_stops_after_func() {
        let mut session = MockSession::new()
            .respond("FUNC?", "99,10")
            .respond("RANGE?", "10");

        match uncertainty_for_current_mode(&mut session) {
            Err(UncertaintyError::UnsupportedMode(99)) => {}
            other => panic!("Unexpected result: {:?}", other),
        }
        assert_eq!(session.sent, vec!["FUNC?"]);
    }

    #[test]
    fn test_func_response_without_comma() {
        let mut session = MockSession::new().respond("FUNC?", "14");
        assert_eq!(current_mode(&mut session).unwrap(), OperatingMode::SubSamplingDc);
    }

    #[test]
    fn test_func_response_malformed() {
        let mut session = MockSession::new().respond("FUNC?", "DCV,10");
        assert!(matches!(
            current_mode(&mut session),
            Err(SessionError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_error_for_reading() {
        let bound = UncertaintyBound::new(0.001, 0.01);
        assert!((bound.error_for(10.0) - 0.02).abs() < 1e-12);
        assert!((bound.error_for(-10.0) - 0.02).abs() < 1e-12);
    }
}
