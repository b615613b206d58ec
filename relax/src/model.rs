use serde::{Deserialize, Serialize};

/// inversion efficiency of an ideal 180 degree pulse
pub const IDEAL_INVERSION:f64 = 2.0;

#[derive(Clone,Copy,Debug,PartialEq,Eq,Hash,Serialize,Deserialize)]
pub enum ModelKind {
    /// S(TI) = |M0 (1 - a exp(-TI/T1)) + C|
    T1InversionRecovery,
    /// S(TE) = M0 exp(-TE/T2) + C
    T2Decay,
}

impl ModelKind {
    pub fn timing_label(&self) -> &'static str {
        match self {
            ModelKind::T1InversionRecovery => "TI",
            ModelKind::T2Decay => "TE",
        }
    }

    pub fn map_label(&self) -> &'static str {
        match self {
            ModelKind::T1InversionRecovery => "t1",
            ModelKind::T2Decay => "t2",
        }
    }

    /// search range for the relaxation time (ms)
    pub fn default_bounds_ms(&self) -> [f64;2] {
        match self {
            ModelKind::T1InversionRecovery => [0.001,7000.0],
            ModelKind::T2Decay => [0.001,4000.0],
        }
    }

    /// signal before taking the modulus
    pub fn signed_signal(&self,timing_ms:f64,p:&ModelParams) -> f64 {
        if !(p.relaxation_time > 0.0) {
            return 0.0;
        }
        let e = (-timing_ms/p.relaxation_time).exp();
        match self {
            ModelKind::T1InversionRecovery => p.m0*(1.0 - p.inversion_efficiency*e) + p.offset,
            ModelKind::T2Decay => p.m0*e + p.offset,
        }
    }

    /// signal as seen in a magnitude image
    pub fn signal(&self,timing_ms:f64,p:&ModelParams) -> f64 {
        match self {
            ModelKind::T1InversionRecovery => self.signed_signal(timing_ms,p).abs(),
            ModelKind::T2Decay => self.signed_signal(timing_ms,p),
        }
    }
}

#[derive(Clone,Copy,Debug,Default,PartialEq,Serialize,Deserialize)]
pub struct ModelParams {
    /// T1 or T2 (ms)
    pub relaxation_time:f64,
    pub m0:f64,
    /// `a` of the inversion-recovery model. Unused for T2.
    pub inversion_efficiency:f64,
    pub offset:f64,
}

impl ModelParams {
    pub const SENTINEL:ModelParams = ModelParams {
        relaxation_time:0.0,
        m0:0.0,
        inversion_efficiency:0.0,
        offset:0.0,
    };

    pub fn t1(t1:f64,m0:f64) -> Self {
        Self { relaxation_time:t1, m0, inversion_efficiency:IDEAL_INVERSION, offset:0.0 }
    }

    pub fn t2(t2:f64,m0:f64) -> Self {
        Self { relaxation_time:t2, m0, inversion_efficiency:0.0, offset:0.0 }
    }

    pub fn is_finite(&self) -> bool {
        self.relaxation_time.is_finite() && self.m0.is_finite()
            && self.inversion_efficiency.is_finite() && self.offset.is_finite()
    }
}
