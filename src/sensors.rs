use crate::{config, error::Result, util};
use regex::Regex;
use std::time::Duration;

/// The `sensors` command plus the pattern for its per-core lines
#[derive(Debug)]
pub struct SensorsCommand {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    core_re: Regex,
}

impl SensorsCommand {
    pub fn new(program: &str, args: &[&str]) -> Result<Self> {
        // "Core 0:        +59.0°C  (high = +86.0°C, crit = +100.0°C)"
        let core_re = Regex::new(r"^\s*Core\s*\d*:?\s*(?<t>[+-]?\d+)")?;
        Ok(Self {
            program: program.to_owned(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout: Duration::from_secs(config::SENSORS_TIMEOUT_S),
            core_re,
        })
    }

    pub fn system() -> Result<Self> {
        Self::new("sensors", &[])
    }

    pub fn read_max_core(&self) -> Result<i32> {
        let out = util::make_call("sensors", &self.program, &self.args, self.timeout)?;
        Ok(self.max_core_temp(&out))
    }

    /// Hottest `Core N:` line, 0 when there is none
    pub fn max_core_temp(&self, output: &str) -> i32 {
        let mut result = 0;
        for line in output.lines() {
            let Some(t) = self.core_re.captures(line).and_then(|c| c["t"].parse::<i32>().ok())
            else {
                continue;
            };
            result = result.max(t);
            log::trace!("Got temp {} new max {}", t, result);
        }
        result
    }
}
