use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

/// Bidirectional command/response channel to an instrument.
///
/// Implementors own the framing of the underlying link (GPIB controller, VISA, ...).
/// Callers must serialize access: a memory read is sized against the format query
/// issued just before it, so commands from different flows must never interleave.
pub trait InstrumentSession {
    /// Send a command, no response expected.
    fn write(&mut self, command: &str) -> Result<(), SessionError>;

    /// Send a command and return its single-line text response, trimmed.
    fn query(&mut self, command: &str) -> Result<String, SessionError>;

    /// Blocking binary read of exactly `n` bytes.
    fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, SessionError>;

    /// Query and parse the response as a real number.
    fn query_f64(&mut self, command: &str) -> Result<f64, SessionError> {
        let response = self.query(command)?;
        response
            .trim()
            .parse()
            .map_err(|_| SessionError::MalformedResponse {
                command: command.to_string(),
                response,
            })
    }

    /// Query and parse the response as an integer.
    ///
    /// The instrument reports integers in real notation on some firmware revisions
    /// (`"3.0"`, `"+2"`), so anything that parses as a whole real number is accepted.
    fn query_i64(&mut self, command: &str) -> Result<i64, SessionError> {
        let response = self.query(command)?;
        parse_integer(&response).ok_or_else(|| SessionError::MalformedResponse {
            command: command.to_string(),
            response,
        })
    }
}

impl<S: InstrumentSession + ?Sized> InstrumentSession for &mut S {
    fn write(&mut self, command: &str) -> Result<(), SessionError> {
        (**self).write(command)
    }

    fn query(&mut self, command: &str) -> Result<String, SessionError> {
        (**self).query(command)
    }

    fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, SessionError> {
        (**self).read_bytes(n)
    }
}

pub(crate) fn parse_integer(token: &str) -> Option<i64> {
    let token = token.trim();
    if let Ok(value) = token.parse::<i64>() {
        return Some(value);
    }
    let value: f64 = token.parse().ok()?;
    if value.fract() == 0.0 && value.is_finite() {
        Some(value as i64)
    } else {
        None
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "Timeout error: Expected terminator {expected:?} but got {actual:?}. Likely due to a timeout."
    )]
    Timeout { expected: String, actual: String },

    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Malformed response to '{command}': {response:?}")]
    MalformedResponse { command: String, response: String },

    #[error("Short read: expected {expected} bytes but got {actual}")]
    ShortRead { expected: usize, actual: usize },
}

/// Link settings for a [`PrologixSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub gpib_address: u8,
    pub baud_rate: u32,
    pub timeout: Duration,
    /// Byte sequence terminating every text response.
    pub read_termination: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            gpib_address: 22,
            baud_rate: 115_200,
            timeout: Duration::from_secs(3),
            read_termination: "\r\n".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn with_gpib_address(mut self, address: u8) -> Self {
        self.gpib_address = address;
        self
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_read_termination(mut self, termination: &str) -> Self {
        self.read_termination = termination.to_string();
        self
    }
}

/// Instrument session through a Prologix-style GPIB-USB controller.
///
/// The controller shows up as a serial port. Lines starting with `++` configure the
/// controller itself, everything else is forwarded to the addressed GPIB device.
#[derive(Debug)]
pub struct PrologixSession {
    serial: Box<dyn SerialPort>,
    config: SessionConfig,
}

impl PrologixSession {
    /// Open the serial port. The controller is not touched until [`initialize`](Self::initialize).
    pub fn new(port: &str, config: SessionConfig) -> Result<Self, SessionError> {
        let serial = serialport::new(port, config.baud_rate).open()?;
        Self::from_port(serial, config)
    }

    /// Wrap a port that is already open.
    pub fn from_port(
        mut serial: Box<dyn SerialPort>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        serial.set_timeout(Duration::from_millis(10))?;

        let mut session = Self { serial, config };
        session.flush()?;
        Ok(session)
    }

    /// Put the controller in controller mode, addressing the configured device.
    pub fn initialize(&mut self) -> Result<(), SessionError> {
        log::debug!(
            "Configuring GPIB controller for device at address {}",
            self.config.gpib_address
        );
        self.send_line("++mode 1")?;
        self.send_line(&format!("++addr {}", self.config.gpib_address))?;
        // Reads are requested explicitly with `++read eoi`.
        self.send_line("++auto 0")?;
        self.send_line("++eoi 1")?;
        // Append LF to every command forwarded to the device.
        self.send_line("++eos 2")?;
        self.send_line(&format!(
            "++read_tmo_ms {}",
            self.config.timeout.as_millis().clamp(1, 3000)
        ))?;
        self.flush()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn flush(&mut self) -> Result<(), SessionError> {
        self.serial.clear(serialport::ClearBuffer::All)?;
        Ok(())
    }

    fn send_line(&mut self, line: &str) -> Result<(), SessionError> {
        let line_with_newline = format!("{}\n", line);
        self.serial.write_all(line_with_newline.as_bytes())?;
        Ok(())
    }

    fn read_until_termination(&mut self) -> Result<Vec<u8>, SessionError> {
        let termination = self.config.read_termination.as_bytes().to_vec();
        let mut response = Vec::new();
        let now = Instant::now();

        loop {
            let mut byte = [0u8; 1];
            match self.serial.read(&mut byte) {
                Ok(1) => {
                    response.push(byte[0]);
                    if !termination.is_empty() && response.ends_with(&termination) {
                        response.truncate(response.len() - termination.len());
                        return Ok(response);
                    }
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }

            if now.elapsed() >= self.config.timeout {
                let actual_ending = if response.len() >= 2 {
                    String::from_utf8_lossy(&response[response.len() - 2..]).to_string()
                } else {
                    String::from_utf8_lossy(&response).to_string()
                };
                return Err(SessionError::Timeout {
                    expected: self.config.read_termination.clone(),
                    actual: actual_ending,
                });
            }
        }
    }
}

impl InstrumentSession for PrologixSession {
    fn write(&mut self, command: &str) -> Result<(), SessionError> {
        log::debug!("-> {}", command);
        self.send_line(command)
    }

    fn query(&mut self, command: &str) -> Result<String, SessionError> {
        self.write(command)?;
        self.send_line("++read eoi")?;
        let raw = self.read_until_termination()?;
        let response = String::from_utf8(raw)?.trim().to_string();
        log::debug!("<- {}", response);
        Ok(response)
    }

    fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, SessionError> {
        self.send_line("++read eoi")?;

        let mut buffer = vec![0u8; n];
        let mut filled = 0;
        let now = Instant::now();

        while filled < n {
            match self.serial.read(&mut buffer[filled..]) {
                Ok(0) => {}
                Ok(count) => filled += count,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }
            if filled < n && now.elapsed() >= self.config.timeout {
                return Err(SessionError::ShortRead {
                    expected: n,
                    actual: filled,
                });
            }
        }

        log::debug!("<- {} bytes of binary data", filled);
        Ok(buffer)
    }
}

/// Scripted session for unit tests.
#[cfg(test)]
pub(crate) mod mock {
    use super::{InstrumentSession, SessionError};
    use std::collections::HashMap;

    /// Serves canned query responses and one binary payload, recording every
    /// command in the order it was sent (queries included).
    #[derive(Debug, Default)]
    pub struct MockSession {
        pub sent: Vec<String>,
        pub responses: HashMap<String, String>,
        pub payload: Vec<u8>,
        pub bytes_requested: Vec<usize>,
    }

    impl MockSession {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(mut self, query: &str, response: &str) -> Self {
            self.responses
                .insert(query.to_string(), response.to_string());
            self
        }

        pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
            self.payload = payload;
            self
        }

        pub fn queried(&self, query: &str) -> bool {
            self.sent.iter().any(|c| c == query)
        }
    }

    impl InstrumentSession for MockSession {
        fn write(&mut self, command: &str) -> Result<(), SessionError> {
            self.sent.push(command.to_string());
            Ok(())
        }

        fn query(&mut self, command: &str) -> Result<String, SessionError> {
            self.sent.push(command.to_string());
            self.responses
                .get(command)
                .cloned()
                .ok_or_else(|| SessionError::Timeout {
                    expected: "\r\n".to_string(),
                    actual: String::new(),
                })
        }

        fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, SessionError> {
            self.bytes_requested.push(n);
            if self.payload.len() < n {
                return Err(SessionError::ShortRead {
                    expected: n,
                    actual: self.payload.len(),
                });
            }
            Ok(self.payload.drain(..n).collect())
        }
    }
}
