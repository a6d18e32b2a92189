use crate::{config, config::Settings, monitor::Alarm, util};
use std::{
    io::{self, Write as _},
    time::Duration,
};

/// Terminal bell and/or the configured sound file
#[derive(Debug, Default)]
pub struct Warning;

impl Alarm for Warning {
    fn warn(&mut self, temp: i32, settings: &Settings) {
        if settings.beep {
            let mut out = io::stdout().lock();
            if let Err(err) = out.write_all(b"\x07").and_then(|_| out.flush()) {
                log::debug!("beep failed: {}", err);
            }
        }

        let Some(sound) = &settings.sound else {
            return;
        };
        log::debug!("playing {} for {} degrees", sound.display(), temp);
        if let Err(err) = util::spawn_detached(
            "play sound",
            config::SOUND_PLAYER,
            &[sound],
            Duration::from_secs(config::SOUND_TIMEOUT_S),
        ) {
            log::warn!("{}", err);
        }
    }
}
