//! Single-pixel relaxation fits.
//!
//! T2 decay is fit either by least squares on the log of the signal or by a
//! separable nonlinear fit. T1 inversion recovery arrives as a magnitude, which
//! folds the negative part of the recovery curve onto the positive axis. Its fit
//! restores polarity by trying every split point: the first k samples (in TI
//! order) are negated, the signed model is fit, and the split with the smallest
//! residual wins.
//!
//! The nonlinear fits are separable. For a fixed relaxation time each model is
//! linear in its remaining unknowns, which are solved in closed form, so only the
//! relaxation time is searched: a log-spaced grid followed by golden-section
//! refinement. Nothing is randomized; equal samples always give equal fits.

use serde::{Deserialize, Serialize};
use crate::error::FitError;
use crate::linalg::{least_squares, MAX_COLS};
use crate::model::{ModelKind, ModelParams, IDEAL_INVERSION};

const INV_PHI:f64 = 0.618_033_988_749_894_9;
const MAX_GOLDEN_ITER:usize = 200;

#[derive(Clone,Copy,Debug,PartialEq,Eq,Serialize,Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum T2Method {
    /// ordinary least squares of ln(S) against TE
    LogLinear,
    /// separable fit of M0 exp(-TE/T2) (+ C)
    NonLinear,
}

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
#[serde(default)]
pub struct FitSettings {
    pub t2_method:T2Method,
    /// fit a constant baseline C. Ignored by the log-linear T2 fit and when the
    /// inversion efficiency is free (the two are not separately identifiable)
    pub fit_offset:bool,
    /// fit the inversion efficiency instead of fixing it at 2
    pub fit_inversion_efficiency:bool,
    pub t1_bounds_ms:[f64;2],
    pub t2_bounds_ms:[f64;2],
    /// accepted M0 as multiples of the pixel peak: [low*peak, high*peak + 1]
    pub m0_peak_range:[f64;2],
    /// accepted |C| as a fraction of the pixel peak, plus 1
    pub max_offset_of_peak:f64,
    /// accepted range of a fitted inversion efficiency
    pub inversion_efficiency_range:[f64;2],
    /// pixels whose peak intensity does not exceed this are not fit
    pub noise_floor:f64,
    /// rms residual over peak intensity above which a fit is rejected
    pub max_relative_residual:f64,
    /// coarse search points over the bounds (log spaced)
    pub grid_points:usize,
    /// final search bracket width, relative to the relaxation time
    pub tolerance:f64,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            t2_method:T2Method::LogLinear,
            fit_offset:false,
            fit_inversion_efficiency:false,
            t1_bounds_ms:ModelKind::T1InversionRecovery.default_bounds_ms(),
            t2_bounds_ms:ModelKind::T2Decay.default_bounds_ms(),
            m0_peak_range:[0.9,2.0],
            max_offset_of_peak:0.01,
            inversion_efficiency_range:[1.85,2.05],
            noise_floor:0.0,
            max_relative_residual:0.3,
            grid_points:64,
            tolerance:1e-9,
        }
    }
}

impl FitSettings {
    pub fn bounds_ms(&self,kind:ModelKind) -> [f64;2] {
        match kind {
            ModelKind::T1InversionRecovery => self.t1_bounds_ms,
            ModelKind::T2Decay => self.t2_bounds_ms,
        }
    }

    pub fn validate(&self) -> Result<(),FitError> {
        for (name,[lo,hi]) in [("t1_bounds_ms",self.t1_bounds_ms),("t2_bounds_ms",self.t2_bounds_ms)] {
            if !(lo > 0.0 && hi > lo && hi.is_finite()) {
                return Err(FitError::Settings(format!("{} must satisfy 0 < low < high, got [{}, {}]",name,lo,hi)));
            }
        }
        let [m0_lo,m0_hi] = self.m0_peak_range;
        if !(m0_lo >= 0.0 && m0_hi > m0_lo && m0_hi.is_finite()) {
            return Err(FitError::Settings(format!("m0_peak_range must satisfy 0 <= low < high, got [{}, {}]",m0_lo,m0_hi)));
        }
        if !(self.max_offset_of_peak >= 0.0 && self.max_offset_of_peak.is_finite()) {
            return Err(FitError::Settings(format!("max_offset_of_peak must be finite and non-negative, got {}",self.max_offset_of_peak)));
        }
        let [a_lo,a_hi] = self.inversion_efficiency_range;
        if !(a_lo > 0.0 && a_hi > a_lo && a_hi.is_finite()) {
            return Err(FitError::Settings(format!("inversion_efficiency_range must satisfy 0 < low < high, got [{}, {}]",a_lo,a_hi)));
        }
        if self.grid_points < 3 {
            return Err(FitError::Settings(format!("grid_points must be at least 3, got {}",self.grid_points)));
        }
        if !(self.tolerance >= 1e-12 && self.tolerance < 0.1) {
            return Err(FitError::Settings(format!("tolerance must lie in [1e-12, 0.1), got {}",self.tolerance)));
        }
        if !(self.noise_floor >= 0.0 && self.noise_floor.is_finite()) {
            return Err(FitError::Settings(format!("noise_floor must be finite and non-negative, got {}",self.noise_floor)));
        }
        if !(self.max_relative_residual > 0.0) {
            return Err(FitError::Settings(format!("max_relative_residual must be positive, got {}",self.max_relative_residual)));
        }
        Ok(())
    }
}

#[derive(Clone,Copy,Debug,PartialEq,Eq,Serialize,Deserialize)]
pub enum FitStatus {
    Valid,
    BelowNoiseFloor,
    /// non-physical result: non-positive or non-finite parameters, a
    /// relaxation time pinned to a search bound, or M0, offset or inversion
    /// efficiency outside the accepted range
    Degenerate,
    PoorFit,
}

impl FitStatus {
    pub fn is_valid(&self) -> bool {
        *self == FitStatus::Valid
    }

    pub fn code(&self) -> u8 {
        match self {
            FitStatus::Valid => 0,
            FitStatus::BelowNoiseFloor => 1,
            FitStatus::Degenerate => 2,
            FitStatus::PoorFit => 3,
        }
    }

    pub fn from_code(code:u8) -> Option<Self> {
        match code {
            0 => Some(FitStatus::Valid),
            1 => Some(FitStatus::BelowNoiseFloor),
            2 => Some(FitStatus::Degenerate),
            3 => Some(FitStatus::PoorFit),
            _ => None
        }
    }
}

#[derive(Clone,Copy,Debug,PartialEq)]
pub struct RelaxationFit {
    pub params:ModelParams,
    /// rms residual relative to the peak intensity
    pub residual:f64,
    /// leading samples negated by polarity restoration (T1 only)
    pub n_negated:usize,
    pub status:FitStatus,
}

impl RelaxationFit {
    pub fn rejected(status:FitStatus,residual:f64) -> Self {
        Self {
            params:ModelParams::SENTINEL,
            residual,
            n_negated:0,
            status,
        }
    }
}

/// measured intensities of one pixel against strictly increasing timing values
#[derive(Clone,Copy,Debug)]
pub struct PixelSample<'a> {
    timing_ms:&'a [f64],
    intensity:&'a [f64],
}

impl<'a> PixelSample<'a> {
    pub fn new(timing_ms:&'a [f64],intensity:&'a [f64]) -> Result<Self,FitError> {
        if timing_ms.len() != intensity.len() || timing_ms.is_empty() {
            return Err(FitError::DataShape(
                format!("{} timing values for {} intensities",timing_ms.len(),intensity.len())
            ));
        }
        if let Some(t) = timing_ms.iter().find(|t| !t.is_finite() || **t < 0.0) {
            return Err(FitError::InvalidTiming(*t));
        }
        if timing_ms.windows(2).any(|w| w[1] <= w[0]) {
            return Err(FitError::DataShape(String::from("timing values must be strictly increasing")));
        }
        Ok(Self::unchecked(timing_ms,intensity))
    }

    /// for callers that already hold a validated timing list
    pub(crate) fn unchecked(timing_ms:&'a [f64],intensity:&'a [f64]) -> Self {
        Self { timing_ms, intensity }
    }

    pub fn timing_ms(&self) -> &[f64] {
        self.timing_ms
    }

    pub fn intensity(&self) -> &[f64] {
        self.intensity
    }

    pub fn len(&self) -> usize {
        self.intensity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intensity.is_empty()
    }

    pub fn peak(&self) -> f64 {
        self.intensity.iter().copied().fold(0.0,f64::max)
    }
}

struct Candidate {
    params:ModelParams,
    n_negated:usize,
}

/// Model whose unknowns other than the relaxation time enter linearly. The
/// column buffers are reused across trial relaxation times.
struct SeparableModel<'a> {
    kind:ModelKind,
    free_efficiency:bool,
    offset:bool,
    timing:&'a [f64],
    cols:[Vec<f64>;MAX_COLS],
}

impl<'a> SeparableModel<'a> {
    fn new(kind:ModelKind,settings:&FitSettings,timing:&'a [f64]) -> Self {
        let free_efficiency = kind == ModelKind::T1InversionRecovery && settings.fit_inversion_efficiency;
        let n = timing.len();
        Self {
            kind,
            free_efficiency,
            offset:settings.fit_offset && !free_efficiency,
            timing,
            cols:[vec![0.0;n],vec![0.0;n],vec![0.0;n]],
        }
    }

    fn n_cols(&self) -> usize {
        match self.free_efficiency || self.offset {
            true => 2,
            false => 1
        }
    }

    fn solve(&mut self,tau:f64,y:&[f64]) -> Option<([f64;MAX_COLS],f64)> {
        for (i,t) in self.timing.iter().enumerate() {
            let e = (-t/tau).exp();
            match (self.kind,self.free_efficiency) {
                (ModelKind::T2Decay,_) => self.cols[0][i] = e,
                (ModelKind::T1InversionRecovery,false) => self.cols[0][i] = 1.0 - IDEAL_INVERSION*e,
                (ModelKind::T1InversionRecovery,true) => {
                    self.cols[0][i] = 1.0;
                    self.cols[1][i] = -e;
                }
            }
            if self.offset {
                self.cols[1][i] = 1.0;
            }
        }
        let refs = [self.cols[0].as_slice(),self.cols[1].as_slice(),self.cols[2].as_slice()];
        least_squares(&refs[..self.n_cols()],y)
    }

    fn params(&self,tau:f64,c:&[f64;MAX_COLS]) -> ModelParams {
        let offset = match self.offset {
            true => c[1],
            false => 0.0
        };
        match (self.kind,self.free_efficiency) {
            (ModelKind::T2Decay,_) => ModelParams { relaxation_time:tau, m0:c[0], inversion_efficiency:0.0, offset },
            (ModelKind::T1InversionRecovery,false) => ModelParams { relaxation_time:tau, m0:c[0], inversion_efficiency:IDEAL_INVERSION, offset },
            (ModelKind::T1InversionRecovery,true) => ModelParams { relaxation_time:tau, m0:c[0], inversion_efficiency:c[1]/c[0], offset:0.0 },
        }
    }

    /// best parameters for the signed signal y, with their residual sum of squares
    fn fit(&mut self,y:&[f64],settings:&FitSettings) -> Option<(ModelParams,f64)> {
        let bounds = settings.bounds_ms(self.kind);
        let (tau,_) = minimize_log_scale(
            |tau| self.solve(tau,y).map(|(_,rss)| rss),
            bounds,
            settings.grid_points,
            settings.tolerance
        )?;
        let (c,rss) = self.solve(tau,y)?;
        Some((self.params(tau,&c),rss))
    }
}

/// minimise f over [bounds] on a log scale. Returns the argument and the value.
fn minimize_log_scale<F>(mut f:F,bounds:[f64;2],grid_points:usize,tolerance:f64) -> Option<(f64,f64)>
where F:FnMut(f64) -> Option<f64>
{
    let (lo,hi) = (bounds[0].ln(),bounds[1].ln());
    let step = (hi - lo)/(grid_points - 1) as f64;
    let mut cost = |u:f64| f(u.exp()).filter(|c| c.is_finite()).unwrap_or(f64::INFINITY);

    let mut best_i = 0;
    let mut best = f64::INFINITY;
    for i in 0..grid_points {
        let c = cost(lo + step*i as f64);
        if c < best {
            best = c;
            best_i = i;
        }
    }
    if !best.is_finite() {
        return None;
    }

    // golden section inside the neighbours of the best grid point
    let mut a = lo + step*best_i.saturating_sub(1) as f64;
    let mut b = (lo + step*(best_i + 1) as f64).min(hi);
    let mut x1 = b - INV_PHI*(b - a);
    let mut x2 = a + INV_PHI*(b - a);
    let mut f1 = cost(x1);
    let mut f2 = cost(x2);
    let mut iter = 0;
    while b - a > tolerance && iter < MAX_GOLDEN_ITER {
        if f1 <= f2 {
            b = x2;
            x2 = x1;
            f2 = f1;
            x1 = b - INV_PHI*(b - a);
            f1 = cost(x1);
        } else {
            a = x1;
            x1 = x2;
            f1 = f2;
            x2 = a + INV_PHI*(b - a);
            f2 = cost(x2);
        }
        iter += 1;
    }

    let grid_best = (lo + step*best_i as f64,best);
    let (u,c) = [(x1,f1),(x2,f2)].into_iter()
        .fold(grid_best,|acc,cur| if cur.1 < acc.1 {cur} else {acc});
    Some((u.exp(),c))
}

#[derive(Clone,Debug)]
pub struct PixelFitter {
    kind:ModelKind,
    settings:FitSettings,
}

impl PixelFitter {
    pub fn new(kind:ModelKind,settings:FitSettings) -> Result<Self,FitError> {
        settings.validate()?;
        Ok(Self { kind, settings })
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn settings(&self) -> &FitSettings {
        &self.settings
    }

    /// Fit one pixel. Never fails: pixels that cannot be fit come back with
    /// sentinel parameters and a non-valid status.
    pub fn fit(&self,sample:&PixelSample) -> RelaxationFit {
        if sample.intensity.iter().any(|s| !s.is_finite()) {
            return RelaxationFit::rejected(FitStatus::Degenerate,0.0);
        }
        let peak = sample.peak();
        if peak <= self.settings.noise_floor {
            return RelaxationFit::rejected(FitStatus::BelowNoiseFloor,0.0);
        }
        let candidate = match self.kind {
            ModelKind::T2Decay => match self.settings.t2_method {
                T2Method::LogLinear => self.t2_log_linear(sample),
                T2Method::NonLinear => self.t2_separable(sample),
            },
            ModelKind::T1InversionRecovery => self.t1_polarity_restored(sample),
        };
        match candidate {
            Some(c) => self.judge(c,sample,peak),
            None => RelaxationFit::rejected(FitStatus::Degenerate,0.0)
        }
    }

    fn judge(&self,c:Candidate,sample:&PixelSample,peak:f64) -> RelaxationFit {
        let p = c.params;
        let [lo,hi] = self.settings.bounds_ms(self.kind);
        let margin = 10.0*self.settings.tolerance;
        let [m0_lo,m0_hi] = self.settings.m0_peak_range;
        let [a_lo,a_hi] = self.settings.inversion_efficiency_range;
        let free_efficiency = self.kind == ModelKind::T1InversionRecovery && self.settings.fit_inversion_efficiency;
        let physical = p.is_finite()
            && p.m0 > 0.0
            && p.m0 >= m0_lo*peak
            && p.m0 <= m0_hi*peak + 1.0
            && p.offset.abs() <= self.settings.max_offset_of_peak*peak + 1.0
            && p.relaxation_time > lo*(1.0 + margin)
            && p.relaxation_time < hi*(1.0 - margin)
            && (self.kind == ModelKind::T2Decay || p.inversion_efficiency > 0.0)
            && (!free_efficiency || (p.inversion_efficiency >= a_lo && p.inversion_efficiency <= a_hi));
        if !physical {
            return RelaxationFit::rejected(FitStatus::Degenerate,0.0);
        }
        let rss:f64 = sample.timing_ms.iter().zip(sample.intensity.iter())
            .map(|(t,s)| (s - self.kind.signal(*t,&p)).powi(2))
            .sum();
        let residual = (rss/sample.len() as f64).sqrt()/peak;
        if residual > self.settings.max_relative_residual {
            return RelaxationFit::rejected(FitStatus::PoorFit,residual);
        }
        RelaxationFit {
            params:p,
            residual,
            n_negated:c.n_negated,
            status:FitStatus::Valid,
        }
    }

    fn t2_log_linear(&self,sample:&PixelSample) -> Option<Candidate> {
        let (te,log_s):(Vec<f64>,Vec<f64>) = sample.timing_ms.iter().zip(sample.intensity.iter())
            .filter(|(_,s)| **s > 0.0)
            .map(|(t,s)| (*t,s.ln()))
            .unzip();
        if te.len() < 2 {
            return None;
        }
        let ones = vec![1.0;te.len()];
        let (c,_) = least_squares(&[ones.as_slice(),te.as_slice()],&log_s)?;
        let slope = c[1];
        if !(slope < 0.0) {
            return None;
        }
        Some(Candidate {
            params:ModelParams::t2(-1.0/slope,c[0].exp()),
            n_negated:0,
        })
    }

    fn t2_separable(&self,sample:&PixelSample) -> Option<Candidate> {
        let mut model = SeparableModel::new(self.kind,&self.settings,sample.timing_ms);
        let (params,_) = model.fit(sample.intensity,&self.settings)?;
        Some(Candidate { params, n_negated:0 })
    }

    fn t1_polarity_restored(&self,sample:&PixelSample) -> Option<Candidate> {
        let mut model = SeparableModel::new(self.kind,&self.settings,sample.timing_ms);
        let mut signed = sample.intensity.to_vec();
        let mut best:Option<(Candidate,f64)> = None;
        for k in 0..=signed.len() {
            if k > 0 {
                signed[k-1] = -sample.intensity[k-1];
            }
            let Some((params,rss)) = model.fit(&signed,&self.settings) else {
                continue
            };
            // a flipped M0 mirrors a fit with fewer negated samples
            if !(params.m0 > 0.0) {
                continue
            }
            if best.as_ref().map_or(true,|(_,best_rss)| rss < *best_rss) {
                best = Some((Candidate { params, n_negated:k },rss));
            }
        }
        best.map(|(c,_)| c)
    }
}
