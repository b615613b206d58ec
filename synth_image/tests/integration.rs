use std::path::PathBuf;
use ndarray::Array3;
use num_complex::Complex32;
use mr_data::{AcqHeader, AcquisitionDir, KSpaceSeries, MrDataError, ReconMode, Relaxometry};
use mr_data::recon::image_to_kspace;
use relax::{FitStatus, ModelKind, ModelParams, SynthesisMode};
use synth_image::{Pipeline, PipelineError, Stage, SynthConfig};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn scratch(name:&str) -> PathBuf {
    let dir = std::env::temp_dir().join("synth_image_it").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

/// k-space of noiseless images, one parameter set per slice
fn kspace_series(relaxometry:Relaxometry,mode:ReconMode,timing:&[f64],per_slice:&[ModelParams],(ny,nx):(usize,usize)) -> KSpaceSeries {
    let kind = match relaxometry {
        Relaxometry::T1InversionRecovery => ModelKind::T1InversionRecovery,
        Relaxometry::T2MultiEcho => ModelKind::T2Decay,
    };
    let kspace = timing.iter().map(|t|{
        let img = Array3::from_shape_fn((per_slice.len(),ny,nx),|(s,_,_)| {
            Complex32::new(kind.signal(*t,&per_slice[s]) as f32,0.0)
        });
        image_to_kspace(&img,mode)
    }).collect();
    let mut header = AcqHeader::new(relaxometry,timing);
    header.recon_mode = mode;
    KSpaceSeries::new(header,kspace).unwrap()
}

#[test]
fn t2_two_slices_synthesized_at_te_60() {
    init_logging();
    let base = scratch("t2");
    let te = [20.0,40.0,80.0,120.0];
    let series = kspace_series(
        Relaxometry::T2MultiEcho,ReconMode::MultiSlice2d,&te,
        &[ModelParams::t2(40.0,1000.0),ModelParams::t2(80.0,1000.0)],(4,4)
    );
    AcquisitionDir::create(&base.join("acq"),&series).unwrap();

    let config = SynthConfig::new(&base.join("acq"),&base.join("out"),SynthesisMode::Synthesize { timings_ms:vec![60.0] });
    let out = Pipeline::new(config).unwrap().run().unwrap();

    assert_eq!(out.slices,vec![0,1]);
    assert_eq!(out.maps.summary().valid,32);
    let im = &out.images[0].image;
    assert_eq!(im.dim(),(2,4,4));
    for v in im.index_axis(ndarray::Axis(0),0).iter() {
        assert!((v - 223.13).abs() < 0.5,"{}",v);
    }
    for v in im.index_axis(ndarray::Axis(0),1).iter() {
        assert!((v - 472.37).abs() < 0.5,"{}",v);
    }

    let out_dir = base.join("out");
    for f in ["maps/t2_map.nii","maps/m0_map.nii","maps/validity.nii","maps/residual.nii","synthetic/TE_60ms.nii","synthetic/TE_60ms/TE_60ms.001.raw","synthetic/TE_60ms/TE_60ms.002.raw","synth_image.headfile"] {
        assert!(out_dir.join(f).exists(),"missing {}",f);
    }
    assert!(!out_dir.join("maps/sign_map.nii").exists());
    assert!(!out_dir.join("synthetic/TE_60ms/TE_60ms.000.raw").exists());
    assert!(out.written.iter().all(|p| p.exists()));
}

#[test]
fn t1_volume_maps_only_on_selected_slice() {
    init_logging();
    let base = scratch("t1");
    let ti = [50.0,150.0,400.0,1000.0,2500.0,5000.0];
    let per_slice = [ModelParams::t1(300.0,500.0),ModelParams::t1(1200.0,800.0),ModelParams::t1(2000.0,600.0)];
    let series = kspace_series(Relaxometry::T1InversionRecovery,ReconMode::Volume3d,&ti,&per_slice,(2,4));
    AcquisitionDir::create(&base.join("acq"),&series).unwrap();

    let mut config = SynthConfig::new(&base.join("acq"),&base.join("out"),SynthesisMode::MapsOnly);
    config.slices = Some(vec![1]);
    config.n_threads = Some(2);
    let out = Pipeline::new(config).unwrap().run().unwrap();

    assert!(out.images.is_empty());
    assert_eq!(out.slices,vec![1]);
    assert_eq!(out.maps.shape(),(1,2,4));
    for (t1,status) in out.maps.relaxation_time().iter().zip(out.maps.status().iter()) {
        assert_eq!(FitStatus::from_code(*status),Some(FitStatus::Valid));
        assert!((t1 - 1200.0).abs() < 1.2,"{}",t1);
    }
    assert!(base.join("out/maps/sign_map.nii").exists());
    assert!(base.join("out/maps/t1_map/t1_map.002.raw").exists());
    assert!(!base.join("out/synthetic").exists());
}

#[test]
fn missing_input_is_a_load_error() {
    let base = scratch("missing");
    let config = SynthConfig::new(&base.join("nowhere"),&base.join("out"),SynthesisMode::MapsOnly);
    let err = Pipeline::new(config).unwrap().run().err().unwrap();
    assert_eq!(err.stage(),Some(Stage::Load));
    assert!(matches!(err,PipelineError::Data { source:MrDataError::InputMissing(_), .. }));
}

#[test]
fn bad_slice_selection_is_a_shape_error() {
    let base = scratch("bad_slice");
    let series = kspace_series(
        Relaxometry::T2MultiEcho,ReconMode::MultiSlice2d,&[10.0,20.0],
        &[ModelParams::t2(50.0,100.0)],(2,2)
    );
    let mut config = SynthConfig::new(&base,&base.join("out"),SynthesisMode::MapsOnly);
    config.slices = Some(vec![4]);
    let err = Pipeline::new(config).unwrap().run_with_source(&series).err().unwrap();
    assert_eq!(err.stage(),Some(Stage::Reconstruct));
    assert!(matches!(err,PipelineError::Data { source:MrDataError::DataShape(_), .. }));
}

#[test]
fn mismatched_kspace_is_a_shape_error() {
    let base = scratch("mismatch");
    let kspace = vec![Array3::<Complex32>::zeros((1,4,4)),Array3::<Complex32>::zeros((1,4,2))];
    let series = KSpaceSeries::new(AcqHeader::new(Relaxometry::T2MultiEcho,&[10.0,20.0]),kspace).unwrap();
    let config = SynthConfig::new(&base,&base.join("out"),SynthesisMode::MapsOnly);
    let err = Pipeline::new(config).unwrap().run_with_source(&series).err().unwrap();
    assert_eq!(err.stage(),Some(Stage::Reconstruct));
    assert!(matches!(err,PipelineError::Data { source:MrDataError::DataShape(_), .. }));
}
