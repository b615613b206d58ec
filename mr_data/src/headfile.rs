//! `key=value` text headers. Used both for the acquisition description that
//! accompanies raw k-space and for the run summary written next to the outputs.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;
use log::debug;
use crate::error::MrDataError;

#[derive(Clone,Debug,Default,PartialEq)]
pub struct Headfile {
    items:BTreeMap<String,String>
}

impl Headfile {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(file_path:&Path) -> Result<Self,MrDataError> {
        if !file_path.exists() {
            return Err(MrDataError::InputMissing(file_path.to_owned()));
        }
        let mut f = File::open(file_path).map_err(MrDataError::io(file_path))?;
        let mut s = String::new();
        f.read_to_string(&mut s).map_err(MrDataError::io(file_path))?;
        Ok(Self {
            items:Self::txt_to_hash(&s)
        })
    }

    pub fn write(&self,file_path:&Path) -> Result<(),MrDataError> {
        let txt = Self::hash_to_txt(&self.items);
        let mut f = File::create(file_path).map_err(MrDataError::io(file_path))?;
        f.write_all(txt.as_bytes()).map_err(MrDataError::io(file_path))
    }

    pub fn append_field<T,U>(&mut self,key:T,value:U)
    where T:std::string::ToString, U:std::string::ToString
    {
        let key = key.to_string();
        if let Some(old_val) = self.items.insert(key.clone(),value.to_string()) {
            debug!("headfile field {} updated from {}",key,old_val);
        }
    }

    pub fn append(&mut self,other:&Headfile) {
        other.items.iter().for_each(|(k,v)| self.append_field(k,v));
    }

    pub fn get(&self,key:&str) -> Option<&str> {
        self.items.get(key).map(|s| s.as_str())
    }

    /// parse a single value. Ok(None) if the key is absent.
    pub fn get_parsed<T:FromStr>(&self,key:&str) -> Result<Option<T>,String> {
        match self.get(key) {
            Some(s) => s.trim().parse::<T>()
                .map(Some)
                .map_err(|_| format!("cannot parse {}={}",key,s)),
            None => Ok(None)
        }
    }

    /// parse a whitespace separated list. Ok(None) if the key is absent.
    pub fn get_list<T:FromStr>(&self,key:&str) -> Result<Option<Vec<T>>,String> {
        match self.get(key) {
            Some(s) => utils::string_to_vec(s)
                .map(Some)
                .map_err(|_| format!("cannot parse list {}={}",key,s)),
            None => Ok(None)
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn hash_to_txt(hash:&BTreeMap<String,String>) -> String {
        let mut strbuf = String::new();
        for (key, val) in hash.iter() {
            strbuf.push_str(key);
            strbuf.push('=');
            strbuf.push_str(val);
            strbuf.push('\n');
        }
        strbuf
    }

    fn txt_to_hash(headfile_str:&str) -> BTreeMap<String,String>{
        let mut hf = BTreeMap::<String,String>::new();
        headfile_str.lines().for_each(|line|{
            // split on the first = we find
            if let Some((key,val)) = line.split_once('=') {
                hf.insert(key.trim().to_string(),val.to_string());
            }
        });
        hf
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_values_and_lists() {
        let hf = Headfile { items:Headfile::txt_to_hash("relaxometry=t2_me\ntiming_ms=10 20 30.5\n# comment line\nfov=a=b\n") };
        assert_eq!(hf.get("relaxometry"),Some("t2_me"));
        assert_eq!(hf.get("fov"),Some("a=b"));
        assert_eq!(hf.len(),3);
        assert_eq!(hf.get_list::<f64>("timing_ms").unwrap(),Some(vec![10.0,20.0,30.5]));
        assert_eq!(hf.get_parsed::<usize>("dim_read").unwrap(),None);
        assert!(hf.get_parsed::<usize>("relaxometry").is_err());
    }

    #[test]
    fn write_then_open() {
        let p = std::env::temp_dir().join("mr_data_headfile_test.headfile");
        let mut hf = Headfile::new();
        hf.append_field("dim_read",128);
        hf.append_field("timing_ms",utils::vec_to_string(&[1.0,2.5]));
        hf.append_field("dim_read",64);
        hf.write(&p).unwrap();
        let back = Headfile::open(&p).unwrap();
        assert_eq!(back,hf);
        assert_eq!(back.get_parsed::<usize>("dim_read").unwrap(),Some(64));
        std::fs::remove_file(&p).unwrap();
    }
}
