use std::path::{Path, PathBuf};
use std::fs::File;
use std::io::{self, Write, Read};
use std::str::FromStr;
use glob::glob;

/// timing value formatted for file names. Whole numbers lose their decimal point.
pub fn ms_label(value:f64) -> String {
    match value.fract() == 0.0 {
        true => format!("{}",value as i64),
        false => format!("{}",value).replace('.',"p")
    }
}

pub fn read_to_string(filepath:&Path,extension:&str) -> io::Result<String> {
    let p = filepath.with_extension(extension);
    let mut f = File::open(&p)?;
    let mut s = String::new();
    f.read_to_string(&mut s)?;
    Ok(s)
}

pub fn write_to_file(filepath:&Path,extension:&str,string:&str) -> io::Result<()> {
    let p = filepath.with_extension(extension);
    let mut f = File::create(p)?;
    f.write_all(string.as_bytes())
}

pub fn vec_to_string<T>(vec:&[T]) -> String
    where T:std::string::ToString {
    let vstr:Vec<String> = vec.iter().map(|num| num.to_string()).collect();
    vstr.join(" ")
}

/// inverse of vec_to_string. Commas are treated as whitespace.
pub fn string_to_vec<T>(s:&str) -> Result<Vec<T>,T::Err>
    where T:FromStr {
    s.replace(','," ").split_whitespace().map(|token| token.parse::<T>()).collect()
}

pub fn get_first_match(dir:&Path,pattern:&str) -> Option<PathBuf>  {
    get_all_matches(dir,pattern).map(|matches| matches[0].clone())
}

// single depth search, sorted
pub fn get_all_matches(dir:&Path,pattern:&str) -> Option<Vec<PathBuf>> {
    let pat = dir.join(pattern);
    let pat = pat.to_str()?;
    let mut matches:Vec<PathBuf> = glob(pat).ok()?.flat_map(|m| m).collect();
    matches.sort();
    match matches.is_empty() {
        true => None,
        false => Some(matches)
    }
}

/// shift the zero-frequency sample to the center of the line
pub fn fftshift<T>(line:&mut [T]) {
    let n = line.len();
    line.rotate_right(n/2);
}

/// undo fftshift. Identical to fftshift for even lengths
pub fn ifftshift<T>(line:&mut [T]) {
    let n = line.len();
    line.rotate_left(n/2);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ms_labels() {
        assert_eq!(ms_label(60.0),"60");
        assert_eq!(ms_label(12.5),"12p5");
    }

    #[test]
    fn numeric_lists() {
        let v = vec![10.0,20.5,40.0];
        let s = vec_to_string(&v);
        assert_eq!(s,"10 20.5 40");
        let parsed:Vec<f64> = string_to_vec("10, 20.5 40").unwrap();
        assert_eq!(parsed,v);
        assert!(string_to_vec::<f64>("10 abc").is_err());
    }

    #[test]
    fn shifts_are_inverse() {
        let mut odd = vec![0,1,2,3,4];
        fftshift(&mut odd);
        assert_eq!(odd,vec![3,4,0,1,2]);
        ifftshift(&mut odd);
        assert_eq!(odd,vec![0,1,2,3,4]);
    }

    #[test]
    fn first_match_in_dir() {
        let dir = std::env::temp_dir().join("utils_first_match_test");
        std::fs::create_dir_all(&dir).unwrap();
        write_to_file(&dir.join("b"),"headfile","x=1").unwrap();
        write_to_file(&dir.join("a"),"headfile","x=2").unwrap();
        let m = get_first_match(&dir,"*.headfile").unwrap();
        assert_eq!(m.file_name().unwrap(),"a.headfile");
        assert_eq!(read_to_string(&m,"headfile").unwrap(),"x=2");
        assert!(get_first_match(&dir,"*.cfl").is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
