use crate::{
    error::{Error, Result},
    hwmon::{self, SysfsValue},
    monitor::{Sampler, Sub},
    sensors::SensorsCommand,
};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorSource {
    Sensors,
    GenericHwmon,
    ThinkpadHwmon,
    NvmeHwmon,
    Unknown,
}

/// Where CPU readings come from once probing is done
#[derive(Debug)]
enum CpuSource {
    Thinkpad {
        dir: PathBuf,
        cpu: SysfsValue,
        gpu: Option<SysfsValue>,
        fan: Option<SysfsValue>,
    },
    Generic {
        dir: PathBuf,
        /// bit N set for every `tempN_label` starting with "Core"
        mask: u64,
        cores: Vec<SysfsValue>,
    },
    Sensors(SensorsCommand),
}

struct Candidate {
    source: SensorSource,
    probe: fn(&Path) -> Option<CpuSource>,
}

/// CPU sources in order of preference, `sensors` comes after all of them
const CANDIDATES: &[Candidate] = &[
    Candidate {
        source: SensorSource::ThinkpadHwmon,
        probe: probe_thinkpad,
    },
    Candidate {
        source: SensorSource::GenericHwmon,
        probe: probe_generic,
    },
];

fn probe_thinkpad(root: &Path) -> Option<CpuSource> {
    let dir = hwmon::find_hwmon_dir(&root.join(hwmon::THINKPAD_HWMON))?;

    let mut cpu = None;
    let mut gpu = None;
    for idx in 1..=9 {
        let Some(label) = hwmon::read_label(&dir, idx) else {
            continue;
        };
        if cpu.is_none() && label.starts_with("CPU") {
            cpu = Some(idx);
        } else if gpu.is_none() && label.starts_with("GPU") {
            gpu = Some(idx);
        }
    }

    let cpu = hwmon::open_temp_input(&dir, cpu?)?;
    let gpu = gpu.and_then(|idx| hwmon::open_temp_input(&dir, idx));
    let fan = hwmon::open_input(&dir, "fan1_input").and_then(|mut fan| match fan.read() {
        Ok(raw) if raw >= 0 => Some(fan),
        Ok(raw) => {
            log::info!("fan reports {}, not showing the fan", raw);
            None
        }
        Err(err) => {
            log::info!("not showing the fan: {}", err);
            None
        }
    });

    Some(CpuSource::Thinkpad { dir, cpu, gpu, fan })
}

fn probe_generic(root: &Path) -> Option<CpuSource> {
    let dir = hwmon::find_hwmon_dir(&root.join(hwmon::CORETEMP_HWMON))?;

    let mut mask = 0u64;
    let mut cores = Vec::new();
    for idx in 1..64 {
        if !hwmon::read_label(&dir, idx).is_some_and(|l| l.starts_with("Core")) {
            continue;
        }
        if let Some(input) = hwmon::open_temp_input(&dir, idx) {
            mask |= 1 << idx;
            cores.push(input);
        }
    }

    if cores.is_empty() {
        return None;
    }
    Some(CpuSource::Generic { dir, mask, cores })
}

/// SSD temperature: the last "Comp"osite label, else the first "Sens"or label
fn probe_nvme(root: &Path) -> Option<SysfsValue> {
    let dir = hwmon::find_hwmon_dir(&root.join(hwmon::NVME_HWMON))?;

    let mut composite = None;
    let mut sensor = None;
    for idx in 1..=9 {
        let Some(label) = hwmon::read_label(&dir, idx) else {
            continue;
        };
        if label.starts_with("Comp") {
            composite = Some(idx);
        } else if sensor.is_none() && label.starts_with("Sens") {
            sensor = Some(idx);
        }
    }

    hwmon::open_temp_input(&dir, composite.or(sensor)?)
}

/// Decides once which sources to read; [`Prober::resolve`] consumes it
pub struct Prober {
    root: PathBuf,
    sensors: SensorsCommand,
}

impl Prober {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            sensors: SensorsCommand::system()?,
        })
    }

    #[cfg(test)]
    pub fn with_sensors(self, sensors: SensorsCommand) -> Self {
        Self { sensors, ..self }
    }

    /// Commits to the first candidate that works, falling back to `sensors`.
    /// Fails only when `sensors` is needed and cannot be started.
    pub fn resolve(self) -> Result<Sources> {
        let mut tried = Vec::new();

        let ssd = probe_nvme(&self.root);
        match &ssd {
            Some(v) => log::info!("ssd temperature from {}", v.path().display()),
            None => log::debug!("no nvme temperature found"),
        }

        for candidate in CANDIDATES {
            tried.push(candidate.source);
            if let Some(cpu) = (candidate.probe)(&self.root) {
                log::info!("using {:?}: {:?}", candidate.source, cpu);
                return Ok(Sources {
                    source: candidate.source,
                    cpu,
                    ssd,
                    tried,
                });
            }
            log::debug!("{:?} not available", candidate.source);
        }

        tried.push(SensorSource::Sensors);
        match self.sensors.read_max_core() {
            Ok(t) => log::info!("using sensors command, currently {}", t),
            Err(err @ Error::Spawn { .. }) => {
                log::error!("no temperature source left: {}", err);
                return Err(err);
            }
            Err(err) => log::warn!("using sensors command, first read failed: {}", err),
        }

        Ok(Sources {
            source: SensorSource::Sensors,
            cpu: CpuSource::Sensors(self.sensors),
            ssd,
            tried,
        })
    }
}

/// The committed sources, held for the process lifetime
#[derive(Debug)]
pub struct Sources {
    source: SensorSource,
    cpu: CpuSource,
    ssd: Option<SysfsValue>,
    tried: Vec<SensorSource>,
}

impl Sources {
    pub fn source(&self) -> SensorSource {
        self.source
    }

    pub fn ssd_source(&self) -> SensorSource {
        if self.ssd.is_some() {
            SensorSource::NvmeHwmon
        } else {
            SensorSource::Unknown
        }
    }

    /// Candidates probed before committing, in order
    pub fn tried(&self) -> &[SensorSource] {
        &self.tried
    }

    /// Indices of the generic hwmon core inputs
    pub fn core_mask(&self) -> u64 {
        match &self.cpu {
            CpuSource::Generic { mask, .. } => *mask,
            _ => 0,
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        match &self.cpu {
            CpuSource::Thinkpad { dir, .. } | CpuSource::Generic { dir, .. } => Some(dir),
            CpuSource::Sensors(_) => None,
        }
    }
}

fn read_temp(value: &mut SysfsValue) -> Option<i32> {
    match value.read() {
        Ok(raw) => Some(hwmon::millidegrees_to_c(raw)),
        Err(err) => {
            log::debug!("{}", err);
            None
        }
    }
}

impl Sampler for Sources {
    fn cpu_temp(&mut self) -> i32 {
        match &mut self.cpu {
            CpuSource::Thinkpad { cpu, .. } => read_temp(cpu).unwrap_or(0),
            CpuSource::Generic { cores, .. } => {
                cores.iter_mut().filter_map(read_temp).max().unwrap_or(0)
            }
            CpuSource::Sensors(cmd) => cmd.read_max_core().unwrap_or_else(|err| {
                log::warn!("{}", err);
                0
            }),
        }
    }

    fn supports(&self, sub: Sub) -> bool {
        match (sub, &self.cpu) {
            (Sub::Fan, CpuSource::Thinkpad { fan, .. }) => fan.is_some(),
            (Sub::Gpu, CpuSource::Thinkpad { gpu, .. }) => gpu.is_some(),
            (Sub::Ssd, _) => self.ssd.is_some(),
            _ => false,
        }
    }

    fn read_sub(&mut self, sub: Sub) -> Option<i32> {
        match (sub, &mut self.cpu) {
            (Sub::Fan, CpuSource::Thinkpad { fan: Some(fan), .. }) => match fan.read() {
                Ok(raw) if raw >= 0 => Some(hwmon::fan_units(raw)),
                Ok(_) => None,
                Err(err) => {
                    log::debug!("{}", err);
                    None
                }
            },
            (Sub::Gpu, CpuSource::Thinkpad { gpu: Some(gpu), .. }) => read_temp(gpu),
            (Sub::Ssd, _) => self.ssd.as_mut().and_then(read_temp),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::SysfsTree;

    const THINKPAD: &str = "sys/devices/platform/thinkpad_hwmon/hwmon/hwmon4";
    const CORETEMP: &str = "sys/devices/platform/coretemp.0/hwmon/hwmon2";
    const NVME: &str = "sys/class/nvme/nvme0/hwmon1";

    fn fake_sensors(output: &str) -> SensorsCommand {
        SensorsCommand::new("sh", &["-c", &format!("printf '{}'", output)]).unwrap()
    }

    fn resolve(tree: &SysfsTree) -> Sources {
        Prober::new(tree.root())
            .unwrap()
            .with_sensors(fake_sensors("Core 0: +45.0°C\\nCore 1: +52.0°C\\n"))
            .resolve()
            .unwrap()
    }

    #[test]
    fn prefers_thinkpad() {
        let tree = SysfsTree::new();
        tree.temp(THINKPAD, 1, "CPU", 61000);
        tree.temp(THINKPAD, 2, "GPU", 48000);
        tree.write(&format!("{}/fan1_input", THINKPAD), "3149\n");
        tree.temp(CORETEMP, 1, "Package id 0", 70000);
        tree.temp(CORETEMP, 2, "Core 0", 70000);

        let mut sources = resolve(&tree);
        assert_eq!(sources.source(), SensorSource::ThinkpadHwmon);
        assert_eq!(sources.tried(), &[SensorSource::ThinkpadHwmon]);
        assert_eq!(sources.dir(), Some(tree.path(THINKPAD).as_path()));
        assert_eq!(sources.cpu_temp(), 61);
        assert!(sources.supports(Sub::Fan));
        assert_eq!(sources.read_sub(Sub::Fan), Some(31));
        assert_eq!(sources.read_sub(Sub::Gpu), Some(48));
        assert!(!sources.supports(Sub::Ssd));
        assert_eq!(sources.ssd_source(), SensorSource::Unknown);
    }

    #[test]
    fn thinkpad_label_order() {
        let tree = SysfsTree::new();
        tree.temp(THINKPAD, 1, "ambient", 30000);
        tree.temp(THINKPAD, 3, "GPU", 40000);
        tree.temp(THINKPAD, 5, "CPU", 55000);
        tree.temp(THINKPAD, 6, "CPU", 99000);

        let mut sources = resolve(&tree);
        assert_eq!(sources.cpu_temp(), 55);
        assert_eq!(sources.read_sub(Sub::Gpu), Some(40));
        assert!(!sources.supports(Sub::Fan));
    }

    #[test]
    fn broken_fan_is_disabled() {
        let tree = SysfsTree::new();
        tree.temp(THINKPAD, 1, "CPU", 50000);
        tree.write(&format!("{}/fan1_input", THINKPAD), "n/a\n");

        let sources = resolve(&tree);
        assert!(!sources.supports(Sub::Fan));
        assert!(!sources.supports(Sub::Gpu));
    }

    #[test]
    fn thinkpad_without_cpu_falls_through() {
        let tree = SysfsTree::new();
        tree.temp(THINKPAD, 1, "GPU", 50000);
        tree.temp(CORETEMP, 1, "Package id 0", 70000);
        tree.temp(CORETEMP, 2, "Core 0", 58000);
        tree.temp(CORETEMP, 3, "Core 1", 63000);

        let mut sources = resolve(&tree);
        assert_eq!(sources.source(), SensorSource::GenericHwmon);
        assert_eq!(
            sources.tried(),
            &[SensorSource::ThinkpadHwmon, SensorSource::GenericHwmon]
        );
        assert_eq!(sources.core_mask(), 0b1100);
        assert_eq!(sources.cpu_temp(), 63);
        assert!(!sources.supports(Sub::Gpu));
    }

    #[test]
    fn generic_beyond_nine_cores() {
        let tree = SysfsTree::new();
        tree.temp(CORETEMP, 1, "Package id 0", 40000);
        for idx in 2..=17 {
            tree.temp(CORETEMP, idx, &format!("Core {}", idx - 2), 40000 + idx as i64 * 100);
        }
        tree.temp(CORETEMP, 14, "Core 12", 77500);

        let mut sources = resolve(&tree);
        assert_eq!(sources.core_mask(), 0x3fffc);
        assert_eq!(sources.cpu_temp(), 77);
    }

    #[test]
    fn generic_unreadable_core_is_skipped() {
        let tree = SysfsTree::new();
        tree.temp(CORETEMP, 2, "Core 0", 58000);
        tree.temp(CORETEMP, 3, "Core 1", 60000);
        let mut sources = resolve(&tree);
        std::fs::write(tree.path(&format!("{}/temp3_input", CORETEMP)), "").unwrap();
        assert_eq!(sources.cpu_temp(), 58);
    }

    #[test]
    fn falls_back_to_sensors() {
        let tree = SysfsTree::new();
        tree.write(&format!("{}/temp1_label", CORETEMP), "Package id 0\n");

        let mut sources = resolve(&tree);
        assert_eq!(sources.source(), SensorSource::Sensors);
        assert_eq!(
            sources.tried(),
            &[
                SensorSource::ThinkpadHwmon,
                SensorSource::GenericHwmon,
                SensorSource::Sensors
            ]
        );
        assert_eq!(sources.dir(), None);
        assert_eq!(sources.cpu_temp(), 52);
    }

    #[test]
    fn missing_sensors_is_fatal() {
        let tree = SysfsTree::new();
        let res = Prober::new(tree.root())
            .unwrap()
            .with_sensors(SensorsCommand::new("/nonexistent/sensors", &[]).unwrap())
            .resolve();
        assert!(matches!(res, Err(Error::Spawn { .. })));
    }

    #[test]
    fn nvme_prefers_last_composite() {
        let tree = SysfsTree::new();
        tree.temp(THINKPAD, 1, "CPU", 50000);
        tree.temp(NVME, 1, "Sensor 1", 31000);
        tree.temp(NVME, 2, "Composite", 38000);
        tree.temp(NVME, 3, "Sensor 2", 33000);
        tree.temp(NVME, 4, "Composite", 41000);

        let mut sources = resolve(&tree);
        assert_eq!(sources.ssd_source(), SensorSource::NvmeHwmon);
        assert_eq!(sources.read_sub(Sub::Ssd), Some(41));
    }

    #[test]
    fn nvme_first_sensor_without_composite() {
        let tree = SysfsTree::new();
        tree.temp(NVME, 1, "Sensor 1", 36000);
        tree.temp(NVME, 2, "Sensor 2", 44000);

        let mut sources = resolve(&tree);
        assert_eq!(sources.source(), SensorSource::Sensors);
        assert!(sources.supports(Sub::Ssd));
        assert_eq!(sources.read_sub(Sub::Ssd), Some(36));
    }
}
