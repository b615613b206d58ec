use log::info;
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use crate::error::FitError;
use crate::model::ModelKind;
use crate::param_map::ParameterMap;

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SynthesisMode {
    /// one synthetic image per requested TI/TE
    Synthesize { timings_ms:Vec<f64> },
    MapsOnly,
}

impl Default for SynthesisMode {
    fn default() -> Self {
        SynthesisMode::MapsOnly
    }
}

#[derive(Clone,Debug)]
pub struct SyntheticImage {
    pub kind:ModelKind,
    pub timing_ms:f64,
    /// (slice, phase, read)
    pub image:Array3<f32>,
}

pub enum SynthesisOutput<'a> {
    Images(Vec<SyntheticImage>),
    Maps(&'a ParameterMap),
}

/// Evaluate the fitted model of every pixel at `timing_ms`. Pixels without a
/// valid fit, or whose value is not finite in f32, are 0.
pub fn synthesize(map:&ParameterMap,timing_ms:f64) -> Result<SyntheticImage,FitError> {
    if !(timing_ms.is_finite() && timing_ms >= 0.0) {
        return Err(FitError::InvalidTiming(timing_ms));
    }
    let kind = map.kind();
    let image = Array3::from_shape_fn(map.shape(),|idx|{
        map.params_at(idx)
            .map(|p| kind.signal(timing_ms,&p) as f32)
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    });
    Ok(SyntheticImage { kind, timing_ms, image })
}

pub fn generate<'a>(map:&'a ParameterMap,mode:&SynthesisMode) -> Result<SynthesisOutput<'a>,FitError> {
    match mode {
        SynthesisMode::MapsOnly => Ok(SynthesisOutput::Maps(map)),
        SynthesisMode::Synthesize { timings_ms } => {
            if timings_ms.is_empty() {
                return Err(FitError::Settings(String::from("no timing values requested for synthesis")));
            }
            let images = timings_ms.iter().map(|t|{
                info!("synthesizing {} = {} ms",map.kind().timing_label(),t);
                synthesize(map,*t)
            }).collect::<Result<Vec<_>,_>>()?;
            Ok(SynthesisOutput::Images(images))
        }
    }
}
