/// How a setup file value is interpreted before it reaches its setter
pub enum Kind<T> {
    /// Leading digit run, saturated, then clamped into `[min, max]`
    Int {
        min: i32,
        max: i32,
        set: fn(&mut T, i32),
    },
    /// Permissive boolean, see [`parse_flag`]
    Flag(fn(&mut T, bool)),
    /// Raw text; the setter validates it and returns the line to log, or a warning
    Text(fn(&mut T, &str) -> Result<String, String>),
}

pub struct Entry<T> {
    pub key: &'static str,
    pub kind: Kind<T>,
}

/// Applies every `key value` line of `text` to `target` using `table`.
/// `name` is only used in log lines. Never fails: bad lines are logged and skipped.
pub fn parse<T>(name: &str, text: &str, table: &[Entry<T>], target: &mut T) {
    for line in text.lines() {
        let Some((id, value)) = split_line(line) else {
            continue;
        };

        let Some(entry) = table.iter().find(|e| e.key == id) else {
            log::warn!("Setup file '{}' has unknown option '{}'.", name, id);
            continue;
        };

        match &entry.kind {
            Kind::Int { min, max, set } => match parse_int(value) {
                Some(v) => {
                    let v = v.clamp(i64::from(*min), i64::from(*max)) as i32;
                    set(target, v);
                    log::info!("Set '{}' to {}.", id, v);
                }
                None => log::warn!(
                    "Setup file '{}' has '{}' without numeric value.",
                    name,
                    id
                ),
            },
            Kind::Flag(set) => {
                let v = parse_flag(value);
                set(target, v);
                log::info!("Set '{}' to {}.", id, v);
            }
            Kind::Text(set) => match set(target, value) {
                Ok(msg) => log::info!("{}", msg),
                Err(msg) => log::warn!("Setup file '{}': {}", name, msg),
            },
        }
    }
}

/// Splits a line into identifier and remainder; `None` for blank lines and comments
fn split_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start_matches([' ', '\t']);
    let (id, rest) = match line.find([' ', '\t']) {
        Some(at) => line.split_at(at),
        None => (line, ""),
    };
    if id.is_empty() || id.starts_with('#') {
        return None;
    }
    Some((id, rest.trim_start_matches([' ', '\t']).trim_end()))
}

/// Leading digit run of `value`; `None` when it does not start with a digit
fn parse_int(value: &str) -> Option<i64> {
    let digits: &str = &value[..value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len())];
    if digits.is_empty() {
        return None;
    }
    Some(digits.parse().unwrap_or(i64::MAX))
}

/// Empty, a positive number, or anything starting with `t`/`y` is true
pub fn parse_flag(value: &str) -> bool {
    match value.chars().next() {
        None => true,
        Some(c) if c.is_ascii_digit() => parse_int(value).map_or(false, |v| v > 0),
        Some(c) => matches!(c.to_ascii_lowercase(), 't' | 'y'),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug, PartialEq)]
    struct Target {
        n: i32,
        on: bool,
        name: String,
    }

    const TABLE: &[Entry<Target>] = &[
        Entry {
            key: "n",
            kind: Kind::Int {
                min: 1,
                max: 10,
                set: |t, v| t.n = v,
            },
        },
        Entry {
            key: "on",
            kind: Kind::Flag(|t, v| t.on = v),
        },
        Entry {
            key: "name",
            kind: Kind::Text(|t, v| {
                if v.contains('!') {
                    return Err(format!("bad name '{}'", v));
                }
                t.name = v.to_owned();
                Ok(format!("Set 'name' to '{}'.", v))
            }),
        },
    ];

    fn parsed(text: &str) -> Target {
        let mut t = Target::default();
        parse("test", text, TABLE, &mut t);
        t
    }

    #[test]
    fn skips_comments_blanks_and_unknown_keys() {
        let t = parsed("# n 3\n\n   \n\tbogus 7\nn 4\n");
        assert_eq!(
            t,
            Target {
                n: 4,
                ..Default::default()
            }
        );
    }

    #[test]
    fn clamps_and_takes_leading_digits() {
        assert_eq!(parsed("n 0").n, 1);
        assert_eq!(parsed("n 99999999999999999999999").n, 10);
        assert_eq!(parsed("n 7seconds").n, 7);
        assert_eq!(parsed("  n\t\t 5  ").n, 5);
    }

    #[test]
    fn non_numeric_leaves_value() {
        assert_eq!(parsed("n 3\nn abc\nn\nn -4").n, 3);
    }

    #[test]
    fn flags() {
        for (input, expected) in [
            ("", true),
            ("1", true),
            ("12", true),
            ("0", false),
            ("true", true),
            ("Yes", true),
            ("t", true),
            ("no", false),
            ("false", false),
            ("off", false),
        ] {
            assert_eq!(parse_flag(input), expected, "input {:?}", input);
        }
        assert!(parsed("on").on);
        assert!(!parsed("on\non nope").on);
    }

    #[test]
    fn text_validation() {
        assert_eq!(parsed("name  my file.wav ").name, "my file.wav");
        assert_eq!(parsed("name ok\nname no!").name, "ok");
    }
}
