use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Placeholder replaced by the source file path in a compiler template.
pub const SOURCE_PLACEHOLDER: &str = "{source}";
/// Placeholder replaced by the output file path in a compiler template.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";
/// Placeholder replaced by the requirements file path in an installer template.
pub const REQUIREMENTS_PLACEHOLDER: &str = "{requirements}";

pub const DEFAULT_MAP_FILE: &str = ".github/kfp-pipelines-map.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jobs {
    Auto,
    Fixed(usize),
}

impl Jobs {
    pub fn resolve(self) -> usize {
        match self {
            Jobs::Fixed(n) => n.max(1),
            Jobs::Auto => std::thread::available_parallelism()
                .map(|n| n.get().min(4))
                .unwrap_or(1),
        }
    }
}

impl FromStr for Jobs {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Jobs::Auto);
        }
        match s.parse::<usize>() {
            Ok(0) | Err(_) => Err(format!(
                "jobs must be \"auto\" or a positive integer, got {s:?}"
            )),
            Ok(n) => Ok(Jobs::Fixed(n)),
        }
    }
}

impl Serialize for Jobs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Jobs::Auto => serializer.serialize_str("auto"),
            Jobs::Fixed(n) => serializer.serialize_u64(*n as u64),
        }
    }
}

impl<'de> Deserialize<'de> for Jobs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct JobsVisitor;

        impl<'de> Visitor<'de> for JobsVisitor {
            type Value = Jobs;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("\"auto\" or a positive integer")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Jobs, E> {
                if value == 0 {
                    return Err(E::custom("jobs must be a positive integer"));
                }
                Ok(Jobs::Fixed(value as usize))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Jobs, E> {
                if value <= 0 {
                    return Err(E::custom("jobs must be a positive integer"));
                }
                Ok(Jobs::Fixed(value as usize))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Jobs, E> {
                if value.eq_ignore_ascii_case("auto") {
                    Ok(Jobs::Auto)
                } else {
                    Err(E::custom("jobs must be \"auto\" or a positive integer"))
                }
            }
        }

        deserializer.deserialize_any(JobsVisitor)
    }
}

/// Settings read from `.kfpcheck`. Every field has a default, so an absent
/// or partial file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub map_file: PathBuf,
    /// Compiler command template. `{source}` and `{output}` are substituted
    /// per entry; extra compile args are appended after the last element.
    pub compiler: Vec<String>,
    /// Package installer template, run only with `--install`.
    pub installer: Vec<String>,
    /// Per-process timeout in seconds. `0` disables it.
    pub timeout: u64,
    pub jobs: Jobs,
}

impl Config {
    pub fn process_timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            map_file: PathBuf::from(DEFAULT_MAP_FILE),
            compiler: [
                "kfp",
                "dsl",
                "compile",
                "--py",
                SOURCE_PLACEHOLDER,
                "--output",
                OUTPUT_PLACEHOLDER,
            ]
            .map(String::from)
            .to_vec(),
            installer: ["pip", "install", "-r", REQUIREMENTS_PLACEHOLDER]
                .map(String::from)
                .to_vec(),
            timeout: 300,
            jobs: Jobs::Fixed(1),
        }
    }
}
