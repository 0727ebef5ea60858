use crate::connector::{ConnectorError, Hp3458aConnector};
use crate::memory::{self, MemoryError};
use crate::modes::{
    self, Command, ConfigError, DcvDigitizing, DirectDigitizing, SubSampling, TriggerArm,
};
use crate::readings::Readings;
use crate::session::{InstrumentSession, PrologixSession, SessionConfig, SessionError};
use crate::uncertainty::{self, UncertaintyBound, UncertaintyError};

#[derive(Debug, thiserror::Error)]
pub enum Hp3458aError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Uncertainty error: {0}")]
    Uncertainty(#[from] UncertaintyError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// An HP3458A on an exclusively owned session.
///
/// Nothing about the instrument is cached: every call re-reads the state it
/// needs, so changes made from the front panel are picked up.
#[derive(Debug)]
pub struct Hp3458a<S: InstrumentSession = PrologixSession> {
    session: S,
}

impl Hp3458a<PrologixSession> {
    /// Connect through a GPIB-USB controller.
    pub fn connect(port: Option<&str>, config: SessionConfig) -> Result<Self, ConnectorError> {
        let session = Hp3458aConnector::connect(port, config)?;
        Ok(Self::new(session))
    }
}

impl<S: InstrumentSession> Hp3458a<S> {
    pub fn new(session: S) -> Self {
        Self { session }
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    /// Identification string (`ID?`).
    pub fn identify(&mut self) -> Result<String, SessionError> {
        self.session.query("ID?")
    }

    pub fn configure_sub_sampling(&mut self, config: &SubSampling) -> Result<(), Hp3458aError> {
        modes::configure_sub_sampling(&mut self.session, config)?;
        Ok(())
    }

    pub fn configure_direct_digitizing(
        &mut self,
        config: &DirectDigitizing,
    ) -> Result<(), Hp3458aError> {
        modes::configure_direct_digitizing(&mut self.session, config)?;
        Ok(())
    }

    pub fn configure_dcv_digitizing(&mut self, config: &DcvDigitizing) -> Result<(), Hp3458aError> {
        modes::configure_dcv_digitizing(&mut self.session, config)?;
        Ok(())
    }

    /// Arm one sweep after [`configure_sub_sampling`](Self::configure_sub_sampling)
    /// left the trigger arm on hold.
    pub fn release_trigger_hold(&mut self) -> Result<(), Hp3458aError> {
        let arm = Command::TriggerArm(TriggerArm::Single);
        self.session.write(&arm.to_string())?;
        Ok(())
    }

    pub fn read_samples(&mut self, n_samples: usize) -> Result<Vec<f64>, Hp3458aError> {
        Ok(memory::read_samples(&mut self.session, n_samples)?)
    }

    pub fn uncertainty(&mut self) -> Result<UncertaintyBound, Hp3458aError> {
        Ok(uncertainty::uncertainty_for_current_mode(&mut self.session)?)
    }

    /// Read `n_samples` readings together with the bound valid for them.
    pub fn acquire(&mut self, n_samples: usize) -> Result<Readings, Hp3458aError> {
        let voltages = self.read_samples(n_samples)?;
        let bound = self.uncertainty()?;
        Ok(Readings::new(voltages, bound))
    }
}
