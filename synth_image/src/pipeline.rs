//! Load → reconstruct → fit → synthesize → write, driven by a [SynthConfig].

use std::path::{Path, PathBuf};
use log::info;
use mr_data::{AcquisitionDir, KSpaceSource, ReconMode, Relaxometry};
use mr_data::headfile::Headfile;
use mr_data::recon::reconstruct_series;
use relax::{generate, ImageSeries, ModelKind, ParameterMap, PixelFitter, SynthesisOutput, SyntheticImage};
use crate::config::{ConfigFile, SynthConfig};
use crate::error::{ConfigError, PipelineError, Stage};
use crate::output::OutputWriter;

pub fn model_kind(relaxometry:Relaxometry) -> ModelKind {
    match relaxometry {
        Relaxometry::T1InversionRecovery => ModelKind::T1InversionRecovery,
        Relaxometry::T2MultiEcho => ModelKind::T2Decay,
    }
}

pub struct PipelineOutput {
    pub maps:ParameterMap,
    /// empty in maps-only mode
    pub images:Vec<SyntheticImage>,
    pub written:Vec<PathBuf>,
    /// acquisition slice numbers, one per output slice
    pub slices:Vec<usize>,
}

pub struct Pipeline {
    config:SynthConfig,
    pool:Option<rayon::ThreadPool>,
}

impl Pipeline {
    pub fn new(config:SynthConfig) -> Result<Self,PipelineError> {
        config.validate()?;
        let pool = match config.n_threads {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new().num_threads(n).build()
                    .map_err(|e| ConfigError::Invalid(format!("cannot start {} fit threads: {}",n,e)))?
            ),
            None => None
        };
        Ok(Self { config, pool })
    }

    pub fn from_file(config_file:&Path) -> Result<Self,PipelineError> {
        Self::new(SynthConfig::from_file(config_file)?)
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    /// run on the acquisition directory named in the config
    pub fn run(&self) -> Result<PipelineOutput,PipelineError> {
        let input = format!("{:?}",self.config.input_dir);
        let source = AcquisitionDir::open(&self.config.input_dir)
            .map_err(PipelineError::data(Stage::Load,&input))?;
        self.run_with_source(&source)
    }

    pub fn run_with_source(&self,source:&dyn KSpaceSource) -> Result<PipelineOutput,PipelineError> {
        let input = source.describe();

        info!("loading k-space from {}",input);
        let kspace = source.load().map_err(PipelineError::data(Stage::Load,&input))?;
        let header = kspace.header().clone();
        let kind = model_kind(header.relaxometry);
        let slices = match &self.config.slices {
            Some(s) => s.clone(),
            None => (0..kspace.n_slices()).collect()
        };

        // 2d slices are independent, so unwanted ones are dropped before the transform
        let kspace = match header.recon_mode {
            ReconMode::MultiSlice2d if self.config.slices.is_some() => kspace.select_slices(&slices)
                .map_err(PipelineError::data(Stage::Reconstruct,&input))?,
            _ => kspace
        };
        let images = reconstruct_series(kspace.kspace(),header.recon_mode,&self.config.recon)
            .map_err(PipelineError::data(Stage::Reconstruct,&input))?;
        let mut series = ImageSeries::new(header.timing_ms.clone(),images)
            .map_err(PipelineError::fit(Stage::Reconstruct,&input))?;
        if header.recon_mode == ReconMode::Volume3d && self.config.slices.is_some() {
            series = series.select_slices(&slices).map_err(PipelineError::fit(Stage::Reconstruct,&input))?;
        }

        let fitter = PixelFitter::new(kind,self.config.fit.clone())
            .map_err(PipelineError::fit(Stage::Fit,&input))?;
        info!("fitting {} over {} = {:?} ms",kind.map_label(),kind.timing_label(),series.timing_ms());
        let maps = match &self.pool {
            Some(pool) => pool.install(|| ParameterMap::fit(&series,&fitter)),
            None => ParameterMap::fit(&series,&fitter)
        };

        let images = match generate(&maps,&self.config.mode).map_err(PipelineError::fit(Stage::Synthesize,&input))? {
            SynthesisOutput::Images(images) => images,
            SynthesisOutput::Maps(_) => Vec::new(),
        };

        let out_dir = &self.config.output_dir;
        let write_err = PipelineError::data(Stage::Write,&format!("{:?}",out_dir));
        let written = self.write(&header.to_headfile(),&input,&slices,&maps,&images).map_err(write_err)?;
        info!("{} files written to {:?}",written.len(),out_dir);

        Ok(PipelineOutput { maps, images, written, slices })
    }

    fn write(&self,acq:&Headfile,input:&str,slices:&[usize],maps:&ParameterMap,images:&[SyntheticImage]) -> Result<Vec<PathBuf>,mr_data::MrDataError> {
        let mut summary = Headfile::new();
        summary.append(acq);
        summary.append_field("input",input);
        summary.append_field("map_kind",maps.kind().map_label());
        summary.append_field("slices",utils::vec_to_string(slices));
        let mut writer = OutputWriter::new(&self.config.output_dir,&self.config.output,slices);
        writer.write_maps(maps,&mut summary)?;
        writer.write_synthetic(images,&mut summary)?;
        writer.write_summary(&summary)?;
        Ok(writer.into_written())
    }
}
