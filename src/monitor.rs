//! Poll policy: which sensors to read this cycle, when to warn, and when the
//! label is worth rebuilding.

use crate::config::{self, Settings};
use std::time::{Duration, Instant};

/// Readings besides the CPU temperature, each on its own check interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sub {
    Fan,
    Gpu,
    Ssd,
}

pub trait Sampler {
    /// Current CPU temperature in °C, 0 when unknown
    fn cpu_temp(&mut self) -> i32;
    fn supports(&self, sub: Sub) -> bool;
    /// `None` when the read failed
    fn read_sub(&mut self, sub: Sub) -> Option<i32>;
}

pub trait Alarm {
    fn warn(&mut self, temp: i32, settings: &Settings);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub at: Instant,
    pub temp: i32,
    pub fan: Option<i32>,
    pub gpu: Option<i32>,
    pub ssd: Option<i32>,
}

impl Reading {
    fn same_values(&self, other: &Reading) -> bool {
        self.temp == other.temp && self.same_subs(other)
    }

    fn same_subs(&self, other: &Reading) -> bool {
        self.fan == other.fan && self.gpu == other.gpu && self.ssd == other.ssd
    }

    pub fn label(&self, unicode: bool) -> String {
        let mut label = match (self.temp, unicode) {
            (0, false) => "Temp ?".to_owned(),
            (0, true) => "--°C".to_owned(),
            (t, false) => format!("Temp {}", t),
            (t, true) => format!("{}°C", t),
        };
        if let Some(fan) = self.fan {
            label += &if unicode {
                format!(" ⟳{}", fan)
            } else {
                format!(" Fan {}", fan)
            };
        }
        for (name, value) in [("GPU", self.gpu), ("SSD", self.ssd)] {
            match value {
                Some(t) if t > 0 && unicode => label += &format!(" {} {}°C", name, t),
                Some(t) if t > 0 => label += &format!(" {} {}", name, t),
                _ => {}
            }
        }
        label
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayState {
    pub label: String,
    pub changed: bool,
}

#[derive(Debug, Default)]
struct SubState {
    value: i32,
    checked: Option<Instant>,
}

pub struct Monitor<S, A> {
    sampler: S,
    alarm: A,
    last_temp: i32,
    last_warning: Option<Instant>,
    fan: SubState,
    gpu: SubState,
    ssd: SubState,
    shown: Option<Reading>,
    label: String,
    /// format of `label`
    unicode: bool,
}

fn secs(s: u32) -> Duration {
    Duration::from_secs(s.into())
}

impl<S: Sampler, A: Alarm> Monitor<S, A> {
    pub fn new(sampler: S, alarm: A) -> Self {
        Self {
            sampler,
            alarm,
            last_temp: 0,
            last_warning: None,
            fan: SubState::default(),
            gpu: SubState::default(),
            ssd: SubState::default(),
            shown: None,
            label: String::new(),
            unicode: false,
        }
    }

    #[cfg(test)]
    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    #[cfg(test)]
    pub fn alarm(&self) -> &A {
        &self.alarm
    }

    /// One read-and-maybe-update cycle. `force` skips the check throttling
    /// and repaint hysteresis, not the warning throttle.
    pub fn poll(&mut self, settings: &Settings, now: Instant, force: bool) -> DisplayState {
        let temp = self.sampler.cpu_temp();
        let temp_changed = temp != self.last_temp;
        let idle = self.sampler.supports(Sub::Fan)
            && settings.fan_interval > 0
            && self.fan.value == 0
            && temp <= config::IDLE_TEMP_C;
        log::debug!("old temp {} new temp {} idle {}", self.last_temp, temp, idle);

        let recheck = force || temp_changed;
        let fan = check_sub(
            &mut self.sampler,
            &mut self.fan,
            Sub::Fan,
            settings.fan_interval,
            now,
            recheck,
            idle,
        );
        let gpu = check_sub(
            &mut self.sampler,
            &mut self.gpu,
            Sub::Gpu,
            settings.gpu_interval,
            now,
            recheck,
            idle,
        );
        let ssd = check_sub(
            &mut self.sampler,
            &mut self.ssd,
            Sub::Ssd,
            settings.ssd_interval,
            now,
            recheck,
            idle,
        )
        .filter(|&t| t > settings.ssd_hide_below);

        self.maybe_warn(settings, temp, now);
        self.last_temp = temp;

        let reading = Reading {
            at: now,
            temp,
            fan,
            gpu,
            ssd,
        };

        let repaint = match &self.shown {
            None => true,
            Some(_) if self.unicode != settings.unicode => true,
            Some(shown) if shown.same_values(&reading) => false,
            Some(shown) => {
                let hot = |t: i32| t >= settings.warn_at;
                force
                    || (reading.temp - shown.temp).abs() > config::MIN_DELTA_TEMP_C
                    || hot(reading.temp) != hot(shown.temp)
                    || !shown.same_subs(&reading)
                    || now.saturating_duration_since(shown.at) >= secs(settings.repaint_interval)
            }
        };

        if repaint {
            self.label = reading.label(settings.unicode);
            self.unicode = settings.unicode;
            self.shown = Some(reading);
            log::debug!("new label {:?}", self.label);
        }

        DisplayState {
            label: self.label.clone(),
            changed: repaint,
        }
    }

    fn maybe_warn(&mut self, settings: &Settings, temp: i32, now: Instant) {
        let warn_at = settings.warn_at;
        if warn_at == 0 || temp < warn_at {
            return;
        }
        let crossed = self.last_temp < warn_at;
        let repeat_due = self
            .last_warning
            .map_or(true, |t| now.saturating_duration_since(t) >= secs(settings.warn_interval));
        if !crossed && !repeat_due {
            return;
        }

        log::info!("high temp {}, last temp {}", temp, self.last_temp);
        self.last_warning = Some(now);
        self.alarm.warn(temp, settings);
    }
}

/// Value to show for `sub`, re-reading it when due; `None` when disabled or unsupported
fn check_sub<S: Sampler>(
    sampler: &mut S,
    state: &mut SubState,
    sub: Sub,
    interval: u32,
    now: Instant,
    recheck: bool,
    idle: bool,
) -> Option<i32> {
    if interval == 0 || !sampler.supports(sub) {
        return None;
    }

    let period = secs(interval) * if idle { config::IDLE_INTERVAL_FACTOR } else { 1 };
    let due = recheck
        || state
            .checked
            .map_or(true, |t| now.saturating_duration_since(t) >= period);
    if due {
        match sampler.read_sub(sub) {
            Some(v) => state.value = v,
            // the fan keeps its last good value
            None if sub == Sub::Fan => {}
            None => state.value = 0,
        }
        state.checked = Some(now);
        log::trace!("checked {:?}: {}", sub, state.value);
    }
    Some(state.value)
}
