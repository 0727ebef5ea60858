use crate::memory::MemoryFormat;
use crate::session::{InstrumentSession, SessionError};
use std::fmt;

/// Shortest aperture the converter supports, in seconds.
pub const MIN_APERTURE: f64 = 500e-9;
/// Longest aperture the converter supports, in seconds.
pub const MAX_APERTURE: f64 = 1.0;
/// Apertures above this need the 4-byte format to keep their resolution.
pub const DINT_APERTURE_THRESHOLD: f64 = 1.4e-6;

/// Default full-scale input in volts.
pub const DEFAULT_MAX_INPUT: f64 = 1000.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Aperture time {0} s outside the supported window (500 ns to 1 s)")]
    InvalidAperture(f64),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// True iff `t_aper` lies in the converter's aperture window, bounds included.
pub fn aperture_time_is_valid(t_aper: f64) -> bool {
    (MIN_APERTURE..=MAX_APERTURE).contains(&t_aper)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Fast,
    Dig,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Fast => "FAST",
            Preset::Dig => "DIG",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryMode {
    Fifo,
    Lifo,
}

impl MemoryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryMode::Fifo => "FIFO",
            MemoryMode::Lifo => "LIFO",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerArm {
    /// Hold until released.
    Hold,
    /// Re-arm automatically after each measurement cycle.
    Auto,
    /// Arm a single measurement cycle, then hold.
    Single,
}

impl TriggerArm {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerArm::Hold => "HOLD",
            TriggerArm::Auto => "AUTO",
            TriggerArm::Single => "SGL",
        }
    }
}

/// One configuration command, rendered verbatim by its `Display` impl.
///
/// Each acquisition mode is a fixed, ordered list of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Preset(Preset),
    Mem(MemoryMode),
    MFormat(MemoryFormat),
    OFormat(MemoryFormat),
    /// Sub-sampled DC on the 10 V range.
    Ssdc,
    Sweep { period: f64, count: u32 },
    SampleSourceExternal,
    TriggerArm(TriggerArm),
    Dsdc(f64),
    Dcv(f64),
    Timer(f64),
    NReadingsTimer(u32),
    TriggerExternal,
    Aperture(f64),
    RecallMemory { first: u32, count: usize },
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Preset(preset) => write!(f, "PRESET {}", preset.as_str()),
            Command::Mem(mode) => write!(f, "MEM {}", mode.as_str()),
            Command::MFormat(format) => write!(f, "MFORMAT {}", format),
            Command::OFormat(format) => write!(f, "OFORMAT {}", format),
            Command::Ssdc => f.write_str("SSDC 1"),
            Command::Sweep { period, count } => write!(f, "SWEEP {},{}", period, count),
            Command::SampleSourceExternal => f.write_str("SSRC EXT"),
            Command::TriggerArm(arm) => write!(f, "TARM {}", arm.as_str()),
            Command::Dsdc(range) => write!(f, "DSDC {}", range),
            Command::Dcv(range) => write!(f, "DCV {}", range),
            Command::Timer(period) => write!(f, "TIMER {}", period),
            Command::NReadingsTimer(count) => write!(f, "NRDGS {},TIMER", count),
            Command::TriggerExternal => f.write_str("TRIG EXT"),
            Command::Aperture(seconds) => write!(f, "APER {}", seconds),
            Command::RecallMemory { first, count } => write!(f, "RMEM {},{}", first, count),
        }
    }
}

/// Send `commands` in order, stopping at the first failure.
///
/// Commands already sent stay in effect; nothing is rolled back.
pub fn send_all<S: InstrumentSession + ?Sized>(
    session: &mut S,
    commands: &[Command],
) -> Result<(), SessionError> {
    for command in commands {
        session.write(&command.to_string())?;
    }
    Ok(())
}

/// Sub-sampling: a sweep of `samples_per_burst` readings at an effective spacing of
/// `1 / effective_sampling_frequency`, armed externally and held until released.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubSampling {
    pub samples_per_burst: u32,
    pub effective_sampling_frequency: f64,
    /// Not applied: `SSDC 1` fixes the 10 V range.
    pub max_input: f64,
}

impl SubSampling {
    pub fn new(samples_per_burst: u32, effective_sampling_frequency: f64) -> Self {
        Self {
            samples_per_burst,
            effective_sampling_frequency,
            max_input: DEFAULT_MAX_INPUT,
        }
    }

    pub fn with_max_input(mut self, max_input: f64) -> Self {
        self.max_input = max_input;
        self
    }

    pub fn commands(&self) -> Vec<Command> {
        vec![
            Command::Preset(Preset::Fast),
            Command::Mem(MemoryMode::Fifo),
            Command::MFormat(MemoryFormat::Sint),
            Command::OFormat(MemoryFormat::Sint),
            Command::Ssdc,
            Command::Sweep {
                period: 1.0 / self.effective_sampling_frequency,
                count: self.samples_per_burst,
            },
            Command::SampleSourceExternal,
            Command::TriggerArm(TriggerArm::Hold),
        ]
    }
}

/// Direct digitizing through the track-and-hold path, timer paced, re-armed
/// automatically on every external trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectDigitizing {
    pub samples_per_burst: u32,
    pub effective_sampling_frequency: f64,
    /// Not sent: `PRESET DIG` fixes the direct-sampling aperture.
    pub t_aper: f64,
    pub max_input: f64,
}

impl DirectDigitizing {
    pub fn new(samples_per_burst: u32, effective_sampling_frequency: f64, t_aper: f64) -> Self {
        Self {
            samples_per_burst,
            effective_sampling_frequency,
            t_aper,
            max_input: DEFAULT_MAX_INPUT,
        }
    }

    pub fn with_max_input(mut self, max_input: f64) -> Self {
        self.max_input = max_input;
        self
    }

    pub fn commands(&self) -> Vec<Command> {
        vec![
            Command::Preset(Preset::Dig),
            Command::Dsdc(self.max_input.abs()),
            Command::Mem(MemoryMode::Lifo),
            Command::MFormat(MemoryFormat::Sint),
            Command::OFormat(MemoryFormat::Sint),
            Command::Timer(1.0 / self.effective_sampling_frequency),
            Command::NReadingsTimer(self.samples_per_burst),
            Command::TriggerExternal,
            Command::TriggerArm(TriggerArm::Auto),
        ]
    }
}

/// Timed DCV digitizing with an explicit aperture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DcvDigitizing {
    pub samples_per_burst: u32,
    pub sampling_frequency: f64,
    pub aper_time: f64,
    pub max_input: f64,
}

impl DcvDigitizing {
    pub fn new(samples_per_burst: u32, sampling_frequency: f64, aper_time: f64) -> Self {
        Self {
            samples_per_burst,
            sampling_frequency,
            aper_time,
            max_input: DEFAULT_MAX_INPUT,
        }
    }

    pub fn with_max_input(mut self, max_input: f64) -> Self {
        self.max_input = max_input;
        self
    }

    /// Memory and output format needed to keep the resolution of `aper_time`.
    pub fn memory_format(&self) -> MemoryFormat {
        if self.aper_time > DINT_APERTURE_THRESHOLD {
            MemoryFormat::Dint
        } else {
            MemoryFormat::Sint
        }
    }

    pub fn commands(&self) -> Result<Vec<Command>, ConfigError> {
        if !aperture_time_is_valid(self.aper_time) {
            return Err(ConfigError::InvalidAperture(self.aper_time));
        }

        let format = self.memory_format();
        Ok(vec![
            Command::Preset(Preset::Dig),
            Command::Mem(MemoryMode::Lifo),
            Command::MFormat(format),
            Command::OFormat(format),
            Command::Timer(1.0 / self.sampling_frequency),
            Command::Aperture(self.aper_time),
            Command::NReadingsTimer(self.samples_per_burst),
            Command::TriggerExternal,
            Command::Dcv(self.max_input.abs()),
            Command::TriggerArm(TriggerArm::Auto),
        ])
    }
}

pub fn configure_sub_sampling<S: InstrumentSession + ?Sized>(
    session: &mut S,
    config: &SubSampling,
) -> Result<(), ConfigError> {
    log::debug!("Configuring sub-sampling: {:?}", config);
    send_all(session, &config.commands())?;
    Ok(())
}

pub fn configure_direct_digitizing<S: InstrumentSession + ?Sized>(
    session: &mut S,
    config: &DirectDigitizing,
) -> Result<(), ConfigError> {
    log::debug!("Configuring direct digitizing: {:?}", config);
    send_all(session, &config.commands())?;
    Ok(())
}

/// Configure DCV digitizing.
///
/// Unlike the other two modes, this one checks a parameter before talking to the
/// device. An aperture outside [`MIN_APERTURE`]..=[`MAX_APERTURE`] (the same window
/// as [`aperture_time_is_valid`]) fails with [`ConfigError::InvalidAperture`] and
/// nothing is sent.
pub fn configure_dcv_digitizing<S: InstrumentSession + ?Sized>(
    session: &mut S,
    config: &DcvDigitizing,
) -> Result<(), ConfigError> {
    log::debug!("Configuring DCV digitizing: {:?}", config);
    let commands = config.commands()?;
    send_all(session, &commands)?;
    Ok(())
}
