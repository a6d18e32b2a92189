use crate::error::{Error, Result};
use std::{
    fs::{self, File},
    io::{Read as _, Seek as _, SeekFrom},
    path::{Path, PathBuf},
};

pub const THINKPAD_HWMON: &str = "sys/devices/platform/thinkpad_hwmon/hwmon";
pub const CORETEMP_HWMON: &str = "sys/devices/platform/coretemp.0/hwmon";
pub const NVME_HWMON: &str = "sys/class/nvme/nvme0";

/// A sysfs attribute kept open and re-read from the start on every read
#[derive(Debug)]
pub struct SysfsValue {
    path: PathBuf,
    file: File,
}

impl SysfsValue {
    pub fn open(path: PathBuf) -> Result<Self> {
        match File::open(&path) {
            Ok(file) => Ok(Self { path, file }),
            Err(source) => Err(Error::Read { path, source }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&mut self) -> Result<i64> {
        let mut contents = String::new();
        if let Err(source) = self
            .file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_to_string(&mut contents))
        {
            return Err(Error::Read {
                path: self.path.clone(),
                source,
            });
        }

        let contents = contents.trim();
        contents.parse().map_err(|_| Error::Parse {
            path: self.path.clone(),
            value: contents.to_owned(),
        })
    }
}

/// First `base/hwmon{0..9}` that has a `temp1_label`
pub fn find_hwmon_dir(base: &Path) -> Option<PathBuf> {
    (0..10)
        .map(|n| base.join(format!("hwmon{}", n)))
        .find(|dir| dir.join("temp1_label").exists())
}

pub fn read_label(dir: &Path, idx: u32) -> Option<String> {
    fs::read_to_string(dir.join(format!("temp{}_label", idx)))
        .ok()
        .map(|s| s.trim().to_owned())
}

/// Opens `temp{idx}_input` in `dir`, logging when that fails
pub fn open_temp_input(dir: &Path, idx: u32) -> Option<SysfsValue> {
    open_input(dir, &format!("temp{}_input", idx))
}

pub fn open_input(dir: &Path, name: &str) -> Option<SysfsValue> {
    match SysfsValue::open(dir.join(name)) {
        Ok(value) => Some(value),
        Err(err) => {
            log::debug!("{}", err);
            None
        }
    }
}

fn saturate(v: i64) -> i32 {
    v.clamp(i32::MIN.into(), i32::MAX.into()) as i32
}

pub fn millidegrees_to_c(raw: i64) -> i32 {
    saturate(raw / 1000)
}

/// Fan speed in hundreds of RPM, rounded
pub fn fan_units(raw: i64) -> i32 {
    saturate(raw.saturating_add(50) / 100)
}
