//! BART-style complex float containers. A container is a pair of files sharing a
//! base name: `<base>.hdr` holds the dimensions (fastest varying first) and
//! `<base>.cfl` holds interleaved little-endian f32 real/imaginary samples.

use std::collections::HashMap;
use std::path::{Path,PathBuf};
use std::fs::File;
use std::io::{Read,Write};
use byteorder::{ByteOrder,LittleEndian};
use ndarray::Array4;
use num_complex::Complex32;
use crate::error::MrDataError;

const DIMS_KEY:&str = "# Dimensions";

pub fn cfl_base_decode(cfl_base:&Path) -> (PathBuf,PathBuf) {
    (cfl_base.with_extension("hdr"),cfl_base.with_extension("cfl"))
}

pub fn load_cfl_header(cfl_base:&Path) -> Result<HashMap<String,String>,MrDataError> {
    let (hdr,_) = cfl_base_decode(cfl_base);
    if !hdr.exists() {
        return Err(MrDataError::InputMissing(hdr));
    }
    let mut f = File::open(&hdr).map_err(MrDataError::io(&hdr))?;
    let mut s = String::new();
    f.read_to_string(&mut s).map_err(MrDataError::io(&hdr))?;
    let mut h = HashMap::<String,String>::new();
    let lines:Vec<&str> = s.lines().collect();
    lines.iter().enumerate().for_each( |(i,line)|
    {
        if line.starts_with('#') {
            if let Some(value) = lines.get(i+1) {
                h.insert(line.trim().to_string(),value.to_string());
            }
        }
    });
    Ok(h)
}

/// dimensions in file order (fastest varying first), singletons included
pub fn get_dims(cfl_base:&Path) -> Result<Vec<usize>,MrDataError> {
    let (hdr,_) = cfl_base_decode(cfl_base);
    let h = load_cfl_header(cfl_base)?;
    let d = h.get(DIMS_KEY).ok_or_else(|| MrDataError::malformed(&hdr,"no dimensions entry"))?;
    let dims:Vec<usize> = utils::string_to_vec(d)
        .map_err(|_| MrDataError::malformed(&hdr,format!("cannot parse dimensions '{}'",d)))?;
    if dims.is_empty() || dims.contains(&0) {
        return Err(MrDataError::malformed(&hdr,format!("invalid dimensions {:?}",dims)));
    }
    Ok(dims)
}

pub fn write_cfl_header(dims:&[usize],cfl_base:&Path) -> Result<(),MrDataError> {
    let (hdr,_) = cfl_base_decode(cfl_base);
    let hdr_str = format!("{}\n{}\n",DIMS_KEY,utils::vec_to_string(dims));
    let mut f = File::create(&hdr).map_err(MrDataError::io(&hdr))?;
    f.write_all(hdr_str.as_bytes()).map_err(MrDataError::io(&hdr))
}

pub fn load(cfl:&Path) -> Result<Vec<f32>,MrDataError> {
    if !cfl.exists() {
        return Err(MrDataError::InputMissing(cfl.to_owned()));
    }
    let mut f = File::open(cfl).map_err(MrDataError::io(cfl))?;
    let mut buf = Vec::<u8>::new();
    f.read_to_end(&mut buf).map_err(MrDataError::io(cfl))?;
    if buf.len() % 8 != 0 {
        return Err(MrDataError::malformed(cfl,format!("{} bytes is not a whole number of complex floats",buf.len())));
    }
    let mut fbuf:Vec<f32> = vec![0.0;buf.len()/4];
    LittleEndian::read_f32_into(&buf,&mut fbuf);
    Ok(fbuf)
}

pub fn write_data(flat:&[f32], cfl_base:&Path) -> Result<(),MrDataError> {
    let (_,cfl) = cfl_base_decode(cfl_base);
    let mut byte_buff:Vec<u8> = vec![0;flat.len()*4];
    LittleEndian::write_f32_into(flat,&mut byte_buff);
    let mut f = File::create(&cfl).map_err(MrDataError::io(&cfl))?;
    f.write_all(&byte_buff).map_err(MrDataError::io(&cfl))
}

/// read a container with up to 4 non-trivial dimensions. The returned array is
/// row-major, so its shape is the header dimensions reversed.
pub fn read_cfl4(cfl_base:&Path) -> Result<Array4<Complex32>,MrDataError> {
    let (hdr,cfl) = cfl_base_decode(cfl_base);
    let dims = get_dims(cfl_base)?;
    if dims.len() > 4 && dims[4..].iter().any(|&d| d != 1) {
        return Err(MrDataError::malformed(&hdr,format!("expected at most 4 dimensions, found {:?}",dims)));
    }
    let mut d4 = [1usize;4];
    dims.iter().take(4).enumerate().for_each(|(i,d)| d4[i] = *d);
    let floats = load(&cfl)?;
    let numel:usize = d4.iter().product();
    if floats.len() != 2*numel {
        return Err(MrDataError::DataShape(
            format!("{:?} holds {} complex samples but {:?} declares {:?}",cfl,floats.len()/2,hdr,dims)
        ));
    }
    let complex:Vec<Complex32> = floats.chunks_exact(2).map(|c| Complex32::new(c[0],c[1])).collect();
    Array4::from_shape_vec((d4[3],d4[2],d4[1],d4[0]),complex)
        .map_err(|e| MrDataError::DataShape(e.to_string()))
}

pub fn write_cfl4(arr:&Array4<Complex32>,cfl_base:&Path) -> Result<(),MrDataError> {
    let shape = arr.shape();
    let dims = [shape[3],shape[2],shape[1],shape[0]];
    let flat:Vec<f32> = arr.iter().flat_map(|c| [c.re,c.im]).collect();
    write_data(&flat,cfl_base)?;
    write_cfl_header(&dims,cfl_base)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name:&str) -> PathBuf {
        let dir = std::env::temp_dir().join("mr_data_cfl_tests");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn cfl4_survives_disk() {
        let base = scratch("series");
        let arr = Array4::from_shape_fn((3,2,4,5),|(p,s,y,x)| Complex32::new((p*100+s*10+y) as f32,x as f32));
        write_cfl4(&arr,&base).unwrap();
        assert_eq!(get_dims(&base).unwrap(),vec![5,4,2,3]);
        let back = read_cfl4(&base).unwrap();
        assert_eq!(back,arr);
    }

    #[test]
    fn trailing_singletons_are_accepted() {
        let base = scratch("singletons");
        write_data(&vec![1.0;2*4*3],&base).unwrap();
        write_cfl_header(&[4,3,1,1,1],&base).unwrap();
        let arr = read_cfl4(&base).unwrap();
        assert_eq!(arr.shape(),&[1,1,3,4]);
    }

    #[test]
    fn truncated_data_is_a_shape_error() {
        let base = scratch("truncated");
        write_data(&vec![0.0;2*10],&base).unwrap();
        write_cfl_header(&[4,3],&base).unwrap();
        match read_cfl4(&base) {
            Err(MrDataError::DataShape(_)) => {}
            other => panic!("expected shape error, got {:?}",other)
        }
    }

    #[test]
    fn missing_header_is_reported() {
        let base = scratch("does_not_exist");
        match get_dims(&base) {
            Err(MrDataError::InputMissing(p)) => assert_eq!(p,base.with_extension("hdr")),
            other => panic!("expected missing input, got {:?}",other)
        }
    }
}
