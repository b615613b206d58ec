//! Magnitude image reconstruction from centered k-space.
//!
//! All transforms are centered (zero frequency in the middle of each axis) and
//! unitary, so `image_to_kspace` followed by `kspace_to_image` returns the
//! input magnitudes.

use log::{debug, info};
use ndarray::{stack, Array, Array3, Array4, ArrayView3, Axis, Dimension};
use num_complex::Complex32;
use rustfft::{FftDirection, FftPlanner};
use serde::{Deserialize, Serialize};
use crate::acquisition::ReconMode;
use crate::error::MrDataError;

/// In-plane geometry fix-ups applied after reconstruction. Arrays are indexed
/// (slice, phase, read).
#[derive(Clone,Copy,Debug,Default,PartialEq,Eq,Serialize,Deserialize)]
#[serde(default)]
pub struct Orientation {
    pub flip_read:bool,
    pub flip_phase:bool,
    /// swap the phase and read axes
    pub transpose:bool,
}

impl Orientation {
    pub fn apply(&self,mut img:Array3<f32>) -> Array3<f32> {
        if self.flip_phase {
            img.invert_axis(Axis(1));
        }
        if self.flip_read {
            img.invert_axis(Axis(2));
        }
        if self.transpose {
            img = img.permuted_axes([0,2,1]);
        }
        img.as_standard_layout().into_owned()
    }
}

/// centered, unitary transform of every lane along `axis`
pub fn fft_axis<D:Dimension>(arr:&mut Array<Complex32,D>,axis:usize,direction:FftDirection,planner:&mut FftPlanner<f32>) {
    let n = arr.shape()[axis];
    let fft = planner.plan_fft(n,direction);
    let norm = 1.0/(n as f32).sqrt();
    let mut scratch = vec![Complex32::new(0.0,0.0);fft.get_inplace_scratch_len()];
    let mut temp = vec![Complex32::new(0.0,0.0);n];
    arr.lanes_mut(Axis(axis)).into_iter().for_each(|mut line|{
        temp.iter_mut().zip(line.iter()).for_each(|(t,l)| *t = *l);
        utils::ifftshift(&mut temp);
        fft.process_with_scratch(&mut temp,&mut scratch);
        utils::fftshift(&mut temp);
        line.iter_mut().zip(temp.iter()).for_each(|(l,t)| *l = *t*norm);
    });
}

fn transform_axes(mode:ReconMode) -> &'static [usize] {
    match mode {
        ReconMode::MultiSlice2d => &[1,2],
        ReconMode::Volume3d => &[0,1,2],
    }
}

/// forward transform of a (slice, phase, read) image volume
pub fn image_to_kspace(image:&Array3<Complex32>,mode:ReconMode) -> Array3<Complex32> {
    let mut k = image.clone();
    let mut planner = FftPlanner::<f32>::new();
    for &axis in transform_axes(mode) {
        fft_axis(&mut k,axis,FftDirection::Forward,&mut planner);
    }
    k
}

/// inverse transform of a (slice, phase, read) k-space volume followed by the modulus
pub fn kspace_to_image(kspace:ArrayView3<Complex32>,mode:ReconMode,planner:&mut FftPlanner<f32>) -> Array3<f32> {
    let mut img = kspace.to_owned();
    for &axis in transform_axes(mode) {
        fft_axis(&mut img,axis,FftDirection::Inverse,planner);
    }
    img.mapv(|c| c.norm())
}

/// reconstruct one magnitude volume per acquisition parameter, stacked as
/// (parameter, slice, phase, read). Every k-space volume must share one shape.
pub fn reconstruct_series(kspace:&[Array3<Complex32>],mode:ReconMode,orientation:&Orientation) -> Result<Array4<f32>,MrDataError> {
    let first = kspace.first().ok_or_else(|| MrDataError::DataShape(String::from("no k-space volumes to reconstruct")))?;
    let expected = first.shape();
    for (i,k) in kspace.iter().enumerate() {
        if k.shape() != expected {
            return Err(MrDataError::DataShape(
                format!("k-space volume {} has shape {:?}, expected {:?}",i,k.shape(),expected)
            ));
        }
    }
    info!("reconstructing {} volumes of shape {:?} ({:?})",kspace.len(),expected,mode);
    let mut planner = FftPlanner::<f32>::new();
    let images:Vec<Array3<f32>> = kspace.iter().enumerate().map(|(i,k)|{
        debug!("reconstructing volume {}",i);
        orientation.apply(kspace_to_image(k.view(),mode,&mut planner))
    }).collect();
    let views:Vec<_> = images.iter().map(|img| img.view()).collect();
    stack(Axis(0),&views).map_err(|e| MrDataError::DataShape(e.to_string()))
}
