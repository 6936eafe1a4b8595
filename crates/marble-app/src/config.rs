use std::path::PathBuf;

use marble_gpu::{DEFAULT_FRAGMENT_SHADER, DEFAULT_VERTEX_SHADER};
use thiserror::Error;

pub const SEED_ENV: &str = "MARBLE_SEED";
pub const SHADER_DIR_ENV: &str = "MARBLE_SHADER_DIR";

/// The 6000×4000 print canvas scaled by 1/6.
pub const DEFAULT_SIZE: (u32, u32) = (1000, 667);

pub const USAGE: &str = "\
Usage: marble [OPTIONS]

Renders one seeded marble image into a window.

Options:
  --seed <TEXT>        seed for the parameter set [env: MARBLE_SEED]
  --shaders <DIR>      directory holding the shaders [env: MARBLE_SHADER_DIR]
  --vertex <FILE>      vertex shader file [default: basic.vert.wgsl]
  --fragment <FILE>    fragment shader file [default: marble.frag.wgsl]
  --size <W>x<H>       window size in pixels [default: 1000x667]
  --validate           run program validation (default in debug builds)
  --no-validate        skip program validation
  --log <FILTER>       log filter, env_logger syntax [env: RUST_LOG]
  --help               print this message

Press Escape or Q to quit.
";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown option `{0}`")]
    UnknownFlag(String),

    #[error("option `{0}` needs a value")]
    MissingValue(String),

    #[error("invalid window size `{0}`, expected <W>x<H> with both sides at least 1")]
    BadSize(String),
}

/// Settings for one run of the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Operator-supplied seed; `None` means draw a fresh one.
    pub seed: Option<String>,
    pub shader_dir: PathBuf,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    pub width: u32,
    pub height: u32,
    pub validate: bool,
    pub log_filter: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            seed: None,
            shader_dir: default_shader_dir(),
            vertex_shader: DEFAULT_VERTEX_SHADER.into(),
            fragment_shader: DEFAULT_FRAGMENT_SHADER.into(),
            width: DEFAULT_SIZE.0,
            height: DEFAULT_SIZE.1,
            validate: cfg!(debug_assertions),
            log_filter: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(AppConfig),
    Help,
}

fn default_shader_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../../shaders"))
}

impl AppConfig {
    /// Process arguments and environment.
    pub fn from_env() -> Result<Command, ConfigError> {
        Self::parse(std::env::args().skip(1), |key| std::env::var(key).ok())
    }

    /// Flags win over environment variables, which win over defaults.
    /// `args` excludes the program name.
    pub fn parse(
        args: impl IntoIterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Command, ConfigError> {
        let mut config = AppConfig {
            seed: env(SEED_ENV),
            ..AppConfig::default()
        };
        if let Some(dir) = env(SHADER_DIR_ENV).filter(|d| !d.is_empty()) {
            config.shader_dir = dir.into();
        }

        let mut args = args.into_iter();
        while let Some(flag) = args.next() {
            let mut value = || args.next().ok_or_else(|| ConfigError::MissingValue(flag.clone()));
            match flag.as_str() {
                "--seed" => config.seed = Some(value()?),
                "--shaders" => config.shader_dir = value()?.into(),
                "--vertex" => config.vertex_shader = value()?.into(),
                "--fragment" => config.fragment_shader = value()?.into(),
                "--size" => {
                    let text = value()?;
                    (config.width, config.height) = parse_size(&text)?;
                }
                "--log" => config.log_filter = Some(value()?),
                "--validate" => config.validate = true,
                "--no-validate" => config.validate = false,
                "--help" | "-h" => return Ok(Command::Help),
                _ => return Err(ConfigError::UnknownFlag(flag.clone())),
            }
        }
        Ok(Command::Run(config))
    }
}

fn parse_size(text: &str) -> Result<(u32, u32), ConfigError> {
    let bad = || ConfigError::BadSize(text.to_owned());
    let (w, h) = text.split_once(['x', 'X']).ok_or_else(bad)?;
    let w: u32 = w.trim().parse().map_err(|_| bad())?;
    let h: u32 = h.trim().parse().map_err(|_| bad())?;
    if w == 0 || h == 0 {
        return Err(bad());
    }
    Ok((w, h))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn parse(args: &[&str], env: &[(&str, &str)]) -> Result<Command, ConfigError> {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::parse(args.iter().map(|s| s.to_string()), |k| env.get(k).cloned())
    }

    fn run_config(args: &[&str], env: &[(&str, &str)]) -> AppConfig {
        match parse(args, env).unwrap() {
            Command::Run(config) => config,
            Command::Help => panic!("unexpected help"),
        }
    }

    #[test]
    fn no_arguments_gives_defaults() {
        let config = run_config(&[], &[]);
        assert_eq!(config, AppConfig::default());
        assert_eq!((config.width, config.height), (1000, 667));
        assert_eq!(config.vertex_shader, PathBuf::from("basic.vert.wgsl"));
        assert_eq!(config.fragment_shader, PathBuf::from("marble.frag.wgsl"));
        assert!(config.shader_dir.ends_with("shaders"));
        assert_eq!(config.seed, None);
    }

    #[test]
    fn flag_seed_beats_environment_seed() {
        assert_eq!(
            run_config(&["--seed", "MARBLE1"], &[(SEED_ENV, "other")]).seed.as_deref(),
            Some("MARBLE1")
        );
        assert_eq!(
            run_config(&[], &[(SEED_ENV, "other")]).seed.as_deref(),
            Some("other")
        );
    }

    #[test]
    fn shader_dir_from_environment() {
        let config = run_config(&[], &[(SHADER_DIR_ENV, "/opt/marble")]);
        assert_eq!(config.shader_dir, PathBuf::from("/opt/marble"));
        let config = run_config(&["--shaders", "here"], &[(SHADER_DIR_ENV, "/opt/marble")]);
        assert_eq!(config.shader_dir, PathBuf::from("here"));
    }

    #[test]
    fn size_and_shader_files() {
        let config = run_config(
            &["--size", "640x480", "--vertex", "v.wgsl", "--fragment", "f.wgsl"],
            &[],
        );
        assert_eq!((config.width, config.height), (640, 480));
        assert_eq!(config.vertex_shader, PathBuf::from("v.wgsl"));
        assert_eq!(config.fragment_shader, PathBuf::from("f.wgsl"));
    }

    #[test]
    fn validation_toggles_last_one_wins() {
        assert!(run_config(&["--no-validate", "--validate"], &[]).validate);
        assert!(!run_config(&["--validate", "--no-validate"], &[]).validate);
    }

    #[test]
    fn help_short_circuits() {
        assert_eq!(parse(&["--help", "--bogus"], &[]), Ok(Command::Help));
    }

    #[test]
    fn unknown_flag_is_an_error() {
        assert_eq!(
            parse(&["--colour"], &[]),
            Err(ConfigError::UnknownFlag("--colour".into()))
        );
    }

    #[test]
    fn flag_without_value_is_an_error() {
        assert_eq!(
            parse(&["--seed"], &[]),
            Err(ConfigError::MissingValue("--seed".into()))
        );
    }

    #[test]
    fn malformed_sizes_are_rejected() {
        for bad in ["1000", "x667", "10x0", "axb", "-1x5"] {
            assert_eq!(
                parse(&["--size", bad], &[]),
                Err(ConfigError::BadSize(bad.into())),
                "{bad}"
            );
        }
    }
}
