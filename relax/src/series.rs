use ndarray::{s, stack, Array3, Array4, ArrayView3, Axis};
use crate::error::FitError;

/// Magnitude images ordered by increasing timing value, stored as
/// (param, slice, phase, read).
#[derive(Clone,Debug)]
pub struct ImageSeries {
    timing_ms:Vec<f64>,
    images:Array4<f32>,
}

impl ImageSeries {
    pub fn new(timing_ms:Vec<f64>,images:Array4<f32>) -> Result<Self,FitError> {
        let n_images = images.len_of(Axis(0));
        if n_images != timing_ms.len() {
            return Err(FitError::DataShape(
                format!("{} images for {} timing values",n_images,timing_ms.len())
            ));
        }
        if timing_ms.len() < 2 {
            return Err(FitError::DataShape(
                format!("at least 2 timing values are needed for a fit, got {}",timing_ms.len())
            ));
        }
        if let Some(t) = timing_ms.iter().find(|t| !t.is_finite() || **t < 0.0) {
            return Err(FitError::InvalidTiming(*t));
        }

        let mut order:Vec<usize> = (0..timing_ms.len()).collect();
        order.sort_by(|a,b| timing_ms[*a].total_cmp(&timing_ms[*b]));
        let sorted:Vec<f64> = order.iter().map(|i| timing_ms[*i]).collect();
        if let Some(w) = sorted.windows(2).find(|w| w[0] == w[1]) {
            return Err(FitError::DataShape(format!("timing value {} ms appears more than once",w[0])));
        }

        let images = match order.iter().enumerate().all(|(i,o)| i == *o) {
            true => images,
            false => images.select(Axis(0),&order)
        };
        Ok(Self { timing_ms:sorted, images })
    }

    /// build from separately reconstructed images, one per timing value
    pub fn from_images(timing_ms:Vec<f64>,images:&[Array3<f32>]) -> Result<Self,FitError> {
        let first = images.first().ok_or_else(|| FitError::DataShape(String::from("no images")))?;
        if let Some(other) = images.iter().find(|im| im.shape() != first.shape()) {
            return Err(FitError::DataShape(
                format!("image shape {:?} differs from {:?}",other.shape(),first.shape())
            ));
        }
        let views:Vec<ArrayView3<f32>> = images.iter().map(|im| im.view()).collect();
        let stacked = stack(Axis(0),&views).map_err(|e| FitError::DataShape(e.to_string()))?;
        Self::new(timing_ms,stacked)
    }

    pub fn select_slices(&self,slices:&[usize]) -> Result<Self,FitError> {
        let n_slices = self.images.len_of(Axis(1));
        if let Some(bad) = slices.iter().find(|s| **s >= n_slices) {
            return Err(FitError::DataShape(format!("slice {} out of range for {} slices",bad,n_slices)));
        }
        Ok(Self {
            timing_ms:self.timing_ms.clone(),
            images:self.images.select(Axis(1),slices),
        })
    }

    pub fn timing_ms(&self) -> &[f64] {
        &self.timing_ms
    }

    pub fn images(&self) -> &Array4<f32> {
        &self.images
    }

    pub fn n_params(&self) -> usize {
        self.timing_ms.len()
    }

    /// (slice, phase, read)
    pub fn shape(&self) -> (usize,usize,usize) {
        let d = self.images.dim();
        (d.1,d.2,d.3)
    }

    pub fn pixel(&self,slice:usize,phase:usize,read:usize) -> Vec<f64> {
        self.images.slice(s![..,slice,phase,read]).iter().map(|v| *v as f64).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_images(values:&[f32]) -> Vec<Array3<f32>> {
        values.iter().map(|v| Array3::from_elem((2,3,4),*v)).collect()
    }

    #[test]
    fn entries_are_sorted_by_timing() {
        let series = ImageSeries::from_images(vec![30.0,10.0,20.0],&constant_images(&[3.0,1.0,2.0])).unwrap();
        assert_eq!(series.timing_ms(),&[10.0,20.0,30.0]);
        assert_eq!(series.pixel(1,2,3),vec![1.0,2.0,3.0]);
        assert_eq!(series.shape(),(2,3,4));
    }

    #[test]
    fn rejects_bad_series() {
        let images = constant_images(&[1.0,2.0]);
        assert!(matches!(ImageSeries::from_images(vec![10.0],&images),Err(FitError::DataShape(_))));
        assert!(matches!(ImageSeries::from_images(vec![10.0,10.0],&images),Err(FitError::DataShape(_))));
        assert!(matches!(ImageSeries::from_images(vec![10.0,f64::NAN],&images),Err(FitError::InvalidTiming(_))));
        assert!(matches!(ImageSeries::from_images(vec![10.0],&images[..1]),Err(FitError::DataShape(_))));
        let mismatched = vec![Array3::zeros((2,3,4)),Array3::zeros((2,4,3))];
        assert!(matches!(ImageSeries::from_images(vec![10.0,20.0],&mismatched),Err(FitError::DataShape(_))));
    }

    #[test]
    fn slice_selection() {
        let mut images = Array4::<f32>::zeros((2,3,1,1));
        for slice in 0..3 {
            images[[0,slice,0,0]] = slice as f32;
            images[[1,slice,0,0]] = 10.0 + slice as f32;
        }
        let series = ImageSeries::new(vec![5.0,15.0],images).unwrap();
        let picked = series.select_slices(&[2,0]).unwrap();
        assert_eq!(picked.shape(),(2,1,1));
        assert_eq!(picked.pixel(0,0,0),vec![2.0,12.0]);
        assert_eq!(picked.pixel(1,0,0),vec![0.0,10.0]);
        assert!(series.select_slices(&[3]).is_err());
    }
}
