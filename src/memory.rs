use crate::modes::Command;
use crate::session::{InstrumentSession, SessionError};

/// Size of the standard reading memory in bytes, as reported by `MSIZE?`.
pub const READING_MEMORY_BYTES: usize = 20_480;

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("Unsupported memory format code {0} (expected 2 for SINT or 3 for DINT)")]
    UnsupportedFormat(i64),

    #[error("{n_samples} readings of {bytes_per_sample} bytes exceed the addressable transfer size")]
    TransferTooLarge {
        n_samples: usize,
        bytes_per_sample: usize,
    },

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Storage format of readings in memory and on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryFormat {
    /// Short signed integer, 2 bytes per reading.
    Sint,
    /// Double (long) signed integer, 4 bytes per reading.
    Dint,
}

impl MemoryFormat {
    pub fn from_code(code: i64) -> Result<Self, MemoryError> {
        match code {
            2 => Ok(MemoryFormat::Sint),
            3 => Ok(MemoryFormat::Dint),
            other => Err(MemoryError::UnsupportedFormat(other)),
        }
    }

    /// Keyword used by `MFORMAT` and `OFORMAT`.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryFormat::Sint => "SINT",
            MemoryFormat::Dint => "DINT",
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        match self {
            MemoryFormat::Sint => 2,
            MemoryFormat::Dint => 4,
        }
    }

    /// Number of readings the reading memory holds in this format.
    pub fn capacity(&self) -> usize {
        READING_MEMORY_BYTES / self.bytes_per_sample()
    }

    /// Decode a big-endian payload into raw integer codes, in wire order.
    ///
    /// A trailing partial sample is ignored; [`read_samples`] always asks the
    /// session for an exact multiple of the width.
    pub fn decode_be(&self, bytes: &[u8]) -> Vec<i32> {
        match self {
            MemoryFormat::Sint => bytes
                .chunks_exact(2)
                .map(|b| i16::from_be_bytes([b[0], b[1]]) as i32)
                .collect(),
            MemoryFormat::Dint => bytes
                .chunks_exact(4)
                .map(|b| i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        }
    }
}

impl std::fmt::Display for MemoryFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query the memory format currently selected on the instrument.
pub fn current_format<S: InstrumentSession + ?Sized>(
    session: &mut S,
) -> Result<MemoryFormat, MemoryError> {
    let code = session.query_i64("MFORMAT?")?;
    MemoryFormat::from_code(code)
}

/// Scale raw codes by `iscale` and restore chronological order.
pub fn calibrate(raw: &[i32], iscale: f64) -> Vec<f64> {
    raw.iter().rev().map(|&code| code as f64 * iscale).collect()
}

/// Pull `n_samples` readings out of the instrument's reading memory.
///
/// The HP3458A dumps its memory as fixed-width big-endian signed integers, most
/// recent reading first. The transfer is sized from the live `MFORMAT?` state and
/// scaled by `ISCALE?`.
///
/// Returns the readings in volts, oldest first. Nothing is retried: an unsupported
/// format fails before any memory transfer is requested, and transport failures
/// surface as [`MemoryError::Session`].
pub fn read_samples<S: InstrumentSession + ?Sized>(
    session: &mut S,
    n_samples: usize,
) -> Result<Vec<f64>, MemoryError> {
    let _span = tracing::debug_span!("read_samples", n_samples).entered();
    #[cfg(feature = "cpu-profiling")]
    let _zone = tracy_client::Client::running()
        .map(|client| client.span(tracy_client::span_location!("read_samples"), 0));

    let format = current_format(session)?;
    let expected = format
        .bytes_per_sample()
        .checked_mul(n_samples)
        .ok_or(MemoryError::TransferTooLarge {
            n_samples,
            bytes_per_sample: format.bytes_per_sample(),
        })?;
    if n_samples > format.capacity() {
        log::warn!(
            "Requested {} readings but reading memory holds {} in {} format",
            n_samples,
            format.capacity(),
            format
        );
    }

    let recall = Command::RecallMemory {
        first: 1,
        count: n_samples,
    };
    session.write(&recall.to_string())?;

    let payload = session.read_bytes(expected)?;
    if payload.len() != expected {
        return Err(SessionError::ShortRead {
            expected,
            actual: payload.len(),
        }
        .into());
    }
    let raw = format.decode_be(&payload);

    let iscale = session.query_f64("ISCALE?")?;
    log::debug!(
        "Decoded {} {} readings with ISCALE {}",
        raw.len(),
        format,
        iscale
    );

    Ok(calibrate(&raw, iscale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::mock::MockSession;

    fn sint_payload(codes: &[i16]) -> Vec<u8> {
        codes.iter().flat_map(|c| c.to_be_bytes()).collect()
    }

    fn dint_payload(codes: &[i32]) -> Vec<u8> {
        codes.iter().flat_map(|c| c.to_be_bytes()).collect()
    }

    #[test]
    fn test_format_code_mapping() {
        assert_eq!(MemoryFormat::from_code(2).unwrap().bytes_per_sample(), 2);
        assert_eq!(MemoryFormat::from_code(3).unwrap().bytes_per_sample(), 4);
        assert!(matches!(
            MemoryFormat::from_code(1),
            Err(MemoryError::UnsupportedFormat(1))
        ));
        assert!(matches!(
            MemoryFormat::from_code(4),
            Err(MemoryError::UnsupportedFormat(4))
        ));
    }

    #[test]
    fn test_capacity() {
        assert_eq!(MemoryFormat::Sint.capacity(), 10_240);
        assert_eq!(MemoryFormat::Dint.capacity(), 5_120);
    }

    #[test]
    fn test_decode_sign_extension() {
        let decoded = MemoryFormat::Sint.decode_be(&[0xff, 0xfe, 0x7f, 0xff, 0x80, 0x00]);
        assert_eq!(decoded, vec![-2, 32767, -32768]);

        let decoded = MemoryFormat::Dint.decode_be(&[0xff, 0xff, 0xff, 0xff, 0x00, 0x01, 0x00, 0x00]);
        assert_eq!(decoded, vec![-1, 65536]);
    }

    #[test]
    fn test_read_samples_sint_reverses_and_scales() {
        let raw: [i16; 4] = [400, -3, 0, 12000];
        let mut session = MockSession::new()
            .respond("MFORMAT?", "2")
            .respond("ISCALE?", "0.5")
            .with_payload(sint_payload(&raw));

        let samples = read_samples(&mut session, raw.len()).unwrap();

        assert_eq!(samples.len(), raw.len());
        let expected: Vec<f64> = raw.iter().rev().map(|&c| c as f64 * 0.5).collect();
        assert_eq!(samples, expected);
        assert_eq!(session.bytes_requested, vec![8]);
        assert_eq!(session.sent, vec!["MFORMAT?", "RMEM 1,4", "ISCALE?"]);
    }

    #[test]
    fn test_read_samples_dint_width() {
        let raw: [i32; 3] = [1_000_000, -7, 2_000_000_000];
        let mut session = MockSession::new()
            .respond("MFORMAT?", "3")
            .respond("ISCALE?", "1E-8")
            .with_payload(dint_payload(&raw));

        let samples = read_samples(&mut session, raw.len()).unwrap();

        assert_eq!(session.bytes_requested, vec![12]);
        assert_eq!(samples.len(), 3);
        for (sample, code) in samples.iter().zip(raw.iter().rev()) {
            assert!((sample - *code as f64 * 1e-8).abs() < 1e-12);
        }
    }

    #[test]
    fn test_read_samples_unsupported_format_performs_no_read() {
        let mut session = MockSession::new()
            .respond("MFORMAT?", "4")
            .with_payload(vec![0; 16]);

        match read_samples(&mut session, 4) {
            Err(MemoryError::UnsupportedFormat(4)) => {}
            other => panic!("Unexpected result: {:?}", other),
        }
        assert!(session.bytes_requested.is_empty());
        assert_eq!(session.sent, vec!["MFORMAT?"]);
    }

    #[test]
    fn test_read_samples_short_payload_is_transport_error() {
        let mut session = MockSession::new()
            .respond("MFORMAT?", "2")
            .respond("ISCALE?", "1")
            .with_payload(vec![0; 3]);

        match read_samples(&mut session, 2) {
            Err(MemoryError::Session(SessionError::ShortRead { expected: 4, actual: 3 })) => {}
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_read_samples_rejects_oversized_transfer() {
        let mut session = MockSession::new()
            .respond("MFORMAT?", "3")
            .respond("ISCALE?", "1");

        match read_samples(&mut session, usize::MAX / 4 + 1) {
            Err(MemoryError::TransferTooLarge {
                bytes_per_sample: 4,
                ..
            }) => {}
            other => panic!("Unexpected result: {:?}", other),
        }
        assert_eq!(session.sent, vec!["MFORMAT?"]);
        assert!(session.bytes_requested.is_empty());
    }

    #[cfg(feature = "cpu-profiling")]
    #[test]
    fn test_read_samples_without_profiler_client() {
        let mut session = MockSession::new()
            .respond("MFORMAT?", "2")
            .respond("ISCALE?", "1")
            .with_payload(sint_payload(&[1]));

        assert!(tracy_client::Client::running().is_none());
        assert_eq!(read_samples(&mut session, 1).unwrap(), vec![1.0]);
    }

    #[test]
    fn test_read_zero_samples() {
        let mut session = MockSession::new()
            .respond("MFORMAT?", "2")
            .respond("ISCALE?", "1");
        let samples = read_samples(&mut session, 0).unwrap();
        assert!(samples.is_empty());
        assert_eq!(session.bytes_requested, vec![0]);
    }
}
