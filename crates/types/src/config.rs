use serde::{Deserialize, Serialize};

/// Which backend drives the transformation (§4.8). Mirrors the XSLT 1.0 vs
/// 2.0/3.0 backend split described in §4.8, selected by name in the launch
/// config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Legacy,
    Modern,
}

/// Diagnostic verbosity, gating log output only — never instrumentation
/// decisions (§9). Maps onto an `env_logger` filter at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogLevel {
    None,
    Log,
    Trace,
    TraceAll,
}

impl LogLevel {
    /// The `log::LevelFilter` this launch option maps to, for initializing
    /// `env_logger` once at process startup.
    pub fn as_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::None => log::LevelFilter::Off,
            LogLevel::Log => log::LevelFilter::Info,
            LogLevel::Trace => log::LevelFilter::Debug,
            LogLevel::TraceAll => log::LevelFilter::Trace,
        }
    }
}

/// The dynamic named launch parameters of §9, modeled as a small
/// `serde`-deserializable, `Clone` config struct consumed at the
/// engine/session boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOptions {
    pub stylesheet_path: String,
    pub input_path: String,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default = "default_engine")]
    pub engine: EngineKind,
    #[serde(default)]
    pub stop_on_entry: bool,
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
}

fn default_engine() -> EngineKind {
    EngineKind::Modern
}

fn default_log_level() -> LogLevel {
    LogLevel::None
}

impl StartOptions {
    /// The convention-based output path: `<outDir>/<stylesheetName>.out.xml`,
    /// used only when the caller didn't supply one explicitly (§4.8).
    pub fn resolved_output_path(&self) -> String {
        if let Some(p) = &self.output_path {
            return p.clone();
        }
        let stem = std::path::Path::new(&self.stylesheet_path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("stylesheet");
        let dir = std::path::Path::new(&self.stylesheet_path)
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."));
        dir.join(format!("{stem}.out.xml"))
            .to_string_lossy()
            .into_owned()
    }
}
