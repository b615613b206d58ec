use log::{info, warn};
use ndarray::{Array3, Axis, Zip};
use serde::{Deserialize, Serialize};
use crate::fit::{FitStatus, PixelFitter, PixelSample, RelaxationFit};
use crate::model::{ModelKind, ModelParams};
use crate::series::ImageSeries;

/// pixel counts per fit status
#[derive(Clone,Copy,Debug,Default,PartialEq,Eq,Serialize,Deserialize)]
pub struct FitSummary {
    pub valid:usize,
    pub below_noise_floor:usize,
    pub degenerate:usize,
    pub poor_fit:usize,
}

impl FitSummary {
    fn count(&mut self,status:FitStatus) {
        match status {
            FitStatus::Valid => self.valid += 1,
            FitStatus::BelowNoiseFloor => self.below_noise_floor += 1,
            FitStatus::Degenerate => self.degenerate += 1,
            FitStatus::PoorFit => self.poor_fit += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.valid + self.rejected()
    }

    pub fn rejected(&self) -> usize {
        self.below_noise_floor + self.degenerate + self.poor_fit
    }
}

/// Fitted parameters of every pixel, each field shaped (slice, phase, read).
#[derive(Clone,Debug)]
pub struct ParameterMap {
    kind:ModelKind,
    relaxation_time:Array3<f64>,
    m0:Array3<f64>,
    inversion_efficiency:Array3<f64>,
    offset:Array3<f64>,
    residual:Array3<f64>,
    status:Array3<u8>,
    sign_map:Option<Array3<u8>>,
    summary:FitSummary,
}

impl ParameterMap {
    /// fit every pixel of the series in parallel
    pub fn fit(series:&ImageSeries,fitter:&PixelFitter) -> Self {
        let timing = series.timing_ms();
        let mut fits = Array3::from_elem(series.shape(),RelaxationFit::rejected(FitStatus::BelowNoiseFloor,0.0));
        Zip::from(&mut fits).and(series.images().lanes(Axis(0))).par_for_each(|fit,lane|{
            let intensity:Vec<f64> = lane.iter().map(|v| *v as f64).collect();
            *fit = fitter.fit(&PixelSample::unchecked(timing,&intensity));
        });
        let map = Self::from_fits(fitter.kind(),&fits);
        let s = map.summary;
        info!("fit {} {} pixels over {} timing values, {} valid",s.total(),fitter.kind().map_label(),timing.len(),s.valid);
        if s.rejected() > 0 {
            warn!("{} of {} pixels rejected: {} below noise floor, {} degenerate, {} poor fit",
                s.rejected(),s.total(),s.below_noise_floor,s.degenerate,s.poor_fit);
        }
        map
    }

    pub fn from_fits(kind:ModelKind,fits:&Array3<RelaxationFit>) -> Self {
        let mut summary = FitSummary::default();
        fits.iter().for_each(|f| summary.count(f.status));
        let sign_map = match kind {
            ModelKind::T1InversionRecovery => Some(fits.map(|f| u8::try_from(f.n_negated).unwrap_or(u8::MAX))),
            ModelKind::T2Decay => None,
        };
        Self {
            kind,
            relaxation_time:fits.map(|f| f.params.relaxation_time),
            m0:fits.map(|f| f.params.m0),
            inversion_efficiency:fits.map(|f| f.params.inversion_efficiency),
            offset:fits.map(|f| f.params.offset),
            residual:fits.map(|f| f.residual),
            status:fits.map(|f| f.status.code()),
            sign_map,
            summary,
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    /// (slice, phase, read)
    pub fn shape(&self) -> (usize,usize,usize) {
        self.status.dim()
    }

    pub fn relaxation_time(&self) -> &Array3<f64> {
        &self.relaxation_time
    }

    pub fn m0(&self) -> &Array3<f64> {
        &self.m0
    }

    pub fn inversion_efficiency(&self) -> &Array3<f64> {
        &self.inversion_efficiency
    }

    pub fn offset(&self) -> &Array3<f64> {
        &self.offset
    }

    /// relative rms residual. Kept for poor fits, 0 for other rejected pixels.
    pub fn residual(&self) -> &Array3<f64> {
        &self.residual
    }

    /// `FitStatus::code` per pixel
    pub fn status(&self) -> &Array3<u8> {
        &self.status
    }

    /// leading samples negated to restore polarity (T1 only)
    pub fn sign_map(&self) -> Option<&Array3<u8>> {
        self.sign_map.as_ref()
    }

    /// 1 where the fit is valid
    pub fn validity(&self) -> Array3<u8> {
        self.status.mapv(|c| (c == FitStatus::Valid.code()) as u8)
    }

    pub fn summary(&self) -> &FitSummary {
        &self.summary
    }

    pub fn status_at(&self,idx:(usize,usize,usize)) -> Option<FitStatus> {
        self.status.get(idx).and_then(|c| FitStatus::from_code(*c))
    }

    /// parameters of a validly fit pixel
    pub fn params_at(&self,idx:(usize,usize,usize)) -> Option<ModelParams> {
        match self.status_at(idx)? {
            FitStatus::Valid => Some(ModelParams {
                relaxation_time:self.relaxation_time[idx],
                m0:self.m0[idx],
                inversion_efficiency:self.inversion_efficiency[idx],
                offset:self.offset[idx],
            }),
            _ => None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;
    use crate::fit::FitSettings;

    fn t2_series(t2:&[f64],m0:f64,te:&[f64]) -> ImageSeries {
        let mut images = Array4::<f32>::zeros((te.len(),1,1,t2.len()));
        for (p,t) in te.iter().enumerate() {
            for (x,t2) in t2.iter().enumerate() {
                images[[p,0,0,x]] = ModelKind::T2Decay.signal(*t,&ModelParams::t2(*t2,m0)) as f32;
            }
        }
        ImageSeries::new(te.to_vec(),images).unwrap()
    }

    #[test]
    fn maps_follow_pixel_fits() {
        let series = t2_series(&[30.0,90.0,0.0],500.0,&[10.0,30.0,60.0]);
        let fitter = PixelFitter::new(ModelKind::T2Decay,FitSettings::default()).unwrap();
        let map = ParameterMap::fit(&series,&fitter);
        assert_eq!(map.shape(),(1,1,3));
        assert!((map.relaxation_time()[[0,0,0]] - 30.0).abs() < 1e-3);
        assert!((map.relaxation_time()[[0,0,1]] - 90.0).abs() < 1e-3);
        // a zero T2 gives an all-zero pixel
        assert_eq!(map.relaxation_time()[[0,0,2]],0.0);
        assert_eq!(map.status_at((0,0,2)),Some(FitStatus::BelowNoiseFloor));
        assert_eq!(map.validity().as_slice().unwrap(),&[1,1,0]);
        assert!(map.params_at((0,0,2)).is_none());
        assert!(map.params_at((0,0,0)).is_some());
        assert_eq!(*map.summary(),FitSummary { valid:2, below_noise_floor:1, degenerate:0, poor_fit:0 });
        assert!(map.sign_map().is_none());
        assert!(map.relaxation_time().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn t1_maps_carry_sign_map() {
        let ti = [50.0,200.0,800.0,3200.0];
        let mut images = Array4::<f32>::zeros((ti.len(),1,1,1));
        for (p,t) in ti.iter().enumerate() {
            images[[p,0,0,0]] = ModelKind::T1InversionRecovery.signal(*t,&ModelParams::t1(400.0,900.0)) as f32;
        }
        let series = ImageSeries::new(ti.to_vec(),images).unwrap();
        let fitter = PixelFitter::new(ModelKind::T1InversionRecovery,FitSettings::default()).unwrap();
        let map = ParameterMap::fit(&series,&fitter);
        // null at 400 ln2 = 277 ms
        assert_eq!(map.sign_map().unwrap()[[0,0,0]],2);
        assert!((map.relaxation_time()[[0,0,0]] - 400.0).abs() < 1e-2);
    }
}
