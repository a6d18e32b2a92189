use crate::keyvalue::{self, Entry, Kind};
use std::{
    ffi::OsString,
    fmt::Write as _,
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    time::{Duration, Instant, SystemTime},
};

/// Name of the setup file in the home directory, with a leading dot
pub const BASE_NAME: &str = "temperature";

/// Minimum wall clock time between two stat calls on the setup file
pub const SETUP_RECHECK_S: u64 = 5;

/// The `sensors` command gets killed after this long
pub const SENSORS_TIMEOUT_S: u64 = 5;

/// Program used to play the warning sound
pub const SOUND_PLAYER: &str = "play";

/// A warning sound still playing after this long gets killed
pub const SOUND_TIMEOUT_S: u64 = 30;

/// Idle means fan stopped and CPU at or below this temperature
pub const IDLE_TEMP_C: i32 = 46;

/// Sub sensor check intervals get multiplied by this while idle
pub const IDLE_INTERVAL_FACTOR: u32 = 3;

/// Temperature changes up to this many degrees wait for the repaint interval
pub const MIN_DELTA_TEMP_C: i32 = 2;

pub const DEFAULT_INTERVAL_S: u32 = 5;
pub const DEFAULT_REPAINT_INTERVAL_S: u32 = 30;
pub const DEFAULT_FAN_INTERVAL_S: u32 = 10;
pub const DEFAULT_GPU_INTERVAL_S: u32 = 10;
pub const DEFAULT_SSD_INTERVAL_S: u32 = 30;
pub const DEFAULT_WARNING_TEMP_C: i32 = 90;
pub const DEFAULT_WARNING_INTERVAL_S: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Seconds between polls
    pub poll_interval: u32,
    /// Seconds after which even a small temperature change is shown
    pub repaint_interval: u32,
    /// Seconds between fan checks, 0 disables the fan
    pub fan_interval: u32,
    /// Seconds between GPU checks, 0 disables the GPU
    pub gpu_interval: u32,
    /// Seconds between SSD checks, 0 disables the SSD
    pub ssd_interval: u32,
    /// SSD temperatures at or below this are not shown
    pub ssd_hide_below: i32,
    /// Warn at or above this CPU temperature, 0 disables warnings
    pub warn_at: i32,
    /// Seconds before a warning repeats
    pub warn_interval: u32,
    pub sound: Option<PathBuf>,
    pub beep: bool,
    pub unicode: bool,
    pub debug: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_INTERVAL_S,
            repaint_interval: DEFAULT_REPAINT_INTERVAL_S,
            fan_interval: DEFAULT_FAN_INTERVAL_S,
            gpu_interval: DEFAULT_GPU_INTERVAL_S,
            ssd_interval: DEFAULT_SSD_INTERVAL_S,
            ssd_hide_below: 0,
            warn_at: DEFAULT_WARNING_TEMP_C,
            warn_interval: DEFAULT_WARNING_INTERVAL_S,
            sound: None,
            beep: false,
            unicode: false,
            debug: 0,
        }
    }
}

fn interval(key: &'static str, min: i32, set: fn(&mut Settings, i32)) -> Entry<Settings> {
    Entry {
        key,
        kind: Kind::Int {
            min,
            max: 1000,
            set,
        },
    }
}

/// Every key the setup file understands
fn setup_table() -> [Entry<Settings>; 12] {
    [
        interval("interval", 1, |s, v| s.poll_interval = v as u32),
        interval("tempinterval", 1, |s, v| s.repaint_interval = v as u32),
        interval("faninterval", 0, |s, v| s.fan_interval = v as u32),
        interval("gpuinterval", 0, |s, v| s.gpu_interval = v as u32),
        interval("ssdinterval", 0, |s, v| s.ssd_interval = v as u32),
        interval("ssdhidetemp", 0, |s, v| s.ssd_hide_below = v),
        interval("warn", 0, |s, v| s.warn_at = v),
        interval("warninterval", 0, |s, v| s.warn_interval = v as u32),
        Entry {
            key: "sound",
            kind: Kind::Text(set_sound),
        },
        Entry {
            key: "beep",
            kind: Kind::Flag(|s, v| s.beep = v),
        },
        Entry {
            key: "unicode",
            kind: Kind::Flag(|s, v| s.unicode = v),
        },
        Entry {
            key: "debug",
            kind: Kind::Int {
                min: 0,
                max: i32::MAX,
                set: |s, v| s.debug = v,
            },
        },
    ]
}

fn set_sound(settings: &mut Settings, value: &str) -> Result<String, String> {
    settings.sound = None;
    if value.is_empty() {
        return Ok("Clear 'sound' file.".to_owned());
    }
    if value.contains(['\\', '\'']) {
        return Err(format!("'sound' file '{}' has special characters", value));
    }
    if let Err(err) = File::open(value) {
        return Err(format!("'sound' file '{}' is not readable: {}", value, err));
    }
    settings.sound = Some(PathBuf::from(value));
    Ok(format!("Set 'sound' to '{}'.", value))
}

impl Settings {
    /// Applies the `key value` lines of `text`; `name` only shows up in log lines
    pub fn apply(&mut self, name: &str, text: &str) {
        keyvalue::parse(name, text, &setup_table(), self);
    }

    /// Renders the settings in setup file format
    pub fn to_setup_text(&self) -> String {
        let flag = |b: bool| if b { "yes" } else { "no" };
        let mut out = String::new();
        let _ = writeln!(out, "interval {}", self.poll_interval);
        let _ = writeln!(out, "tempinterval {}", self.repaint_interval);
        let _ = writeln!(out, "faninterval {}", self.fan_interval);
        let _ = writeln!(out, "gpuinterval {}", self.gpu_interval);
        let _ = writeln!(out, "ssdinterval {}", self.ssd_interval);
        let _ = writeln!(out, "ssdhidetemp {}", self.ssd_hide_below);
        let _ = writeln!(out, "warn {}", self.warn_at);
        let _ = writeln!(out, "warninterval {}", self.warn_interval);
        let _ = writeln!(
            out,
            "sound {}",
            self.sound.as_deref().map_or_else(String::new, |p| p.display().to_string())
        );
        let _ = writeln!(out, "beep {}", flag(self.beep));
        let _ = writeln!(out, "unicode {}", flag(self.unicode));
        let _ = writeln!(out, "debug {}", self.debug);
        out
    }

    fn log_summary(&self, name: &str) {
        log::info!("Read setup file '{}'.", name);
        log::info!(" interval {} seconds", self.poll_interval);
        log::info!(" repaint small changes after {} seconds", self.repaint_interval);
        log::info!(
            " check fan/gpu/ssd every {}/{}/{} seconds",
            self.fan_interval,
            self.gpu_interval,
            self.ssd_interval
        );
        log::info!(" hide ssd at or below {} degrees", self.ssd_hide_below);
        log::info!(" warn at {} degrees", self.warn_at);
        log::info!(" warn again after {} seconds", self.warn_interval);
        log::info!(
            " play sound '{}'",
            self.sound
                .as_deref()
                .map_or_else(|| "<none>".to_owned(), |p| p.display().to_string())
        );
        log::info!(" beep {}, unicode {}", self.beep, self.unicode);
        log::info!(" debug level {}", self.debug);
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_secs(self.poll_interval.into())
    }
}

/// `$HOME/.temperaturerc`, or the given override
pub fn setup_path(arg: Option<OsString>) -> PathBuf {
    if let Some(arg) = arg {
        return PathBuf::from(arg);
    }
    let home = std::env::var_os("HOME").unwrap_or_else(|| "/tmp".into());
    Path::new(&home).join(format!(".{}rc", BASE_NAME))
}

/// The setup file plus what we last saw of it
pub struct SetupFile {
    path: PathBuf,
    mtime: Option<SystemTime>,
    checked: Option<Instant>,
}

impl SetupFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            mtime: None,
            checked: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file into `settings`; a missing file leaves them alone
    pub fn load(&mut self, settings: &mut Settings) {
        let name = self.path.display().to_string();
        log::debug!("Reading setup file {}.", name);

        self.mtime = fs::metadata(&self.path).and_then(|m| m.modified()).ok();
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::info!("Could not open setup file {}.", name);
                return;
            }
            Err(err) => {
                log::warn!("Could not read setup file {}: {}", name, err);
                return;
            }
        };

        settings.apply(&name, &text);
        settings.log_summary(&name);
    }

    /// Reloads when the modification time moved, checking at most every [`SETUP_RECHECK_S`]
    pub fn reload_if_changed(&mut self, settings: &mut Settings, now: Instant) -> bool {
        if let Some(checked) = self.checked {
            if now.saturating_duration_since(checked) < Duration::from_secs(SETUP_RECHECK_S) {
                return false;
            }
        }
        self.checked = Some(now);

        let Ok(mtime) = fs::metadata(&self.path).and_then(|m| m.modified()) else {
            return false;
        };
        if self.mtime.map_or(false, |seen| mtime <= seen) {
            return false;
        }

        log::debug!("setup file {} changed", self.path.display());
        self.load(settings);
        true
    }
}
