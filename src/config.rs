use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

/// Settings file, every section optional.
///
/// ```yaml
/// catalog: src/feniks-data/wines.json
/// images_dir: src/feniks-data/images
/// normalize:
///   target_size: 800
/// ```
#[derive(Deserialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub catalog: PathBuf,
    pub images_dir: PathBuf,
    pub fetch: FetchSettings,
    pub normalize: NormalizeSettings,
    pub link: LinkSettings,
    pub translation: TranslationSettings,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct FetchSettings {
    pub user_agent: String,
    pub timeout_secs: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizeSettings {
    pub target_size: u32,
    pub quality: u8,
    /// Defaults to `<images_dir>/optimized`.
    pub output_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct LinkSettings {
    /// Directory scanned for normalized files. Defaults to `images_dir`.
    pub source_dir: Option<PathBuf>,
    pub path_prefix: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct TranslationSettings {
    pub export_path: PathBuf,
    pub import_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog: PathBuf::from("src/feniks-data/wines.json"),
            images_dir: PathBuf::from("src/feniks-data/images"),
            fetch: Default::default(),
            normalize: Default::default(),
            link: Default::default(),
            translation: Default::default(),
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)".to_owned(),
            timeout_secs: 10,
        }
    }
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        Self {
            target_size: 600,
            quality: 85,
            output_dir: None,
        }
    }
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            source_dir: None,
            path_prefix: "feniks-data/images".to_owned(),
        }
    }
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            export_path: PathBuf::from("scripts/output/nl_translations.csv"),
            import_path: PathBuf::from("scripts/input/nl_translations.csv"),
        }
    }
}

impl Settings {
    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }

    pub fn optimized_dir(&self) -> PathBuf {
        self.normalize
            .output_dir
            .clone()
            .unwrap_or_else(|| self.images_dir.join("optimized"))
    }

    pub fn link_source_dir(&self) -> PathBuf {
        self.link
            .source_dir
            .clone()
            .unwrap_or_else(|| self.images_dir.clone())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.normalize.target_size == 0 {
            return Err("normalize.target_size must be positive".to_owned());
        }
        if !(1..=100).contains(&self.normalize.quality) {
            return Err(format!(
                "normalize.quality must be within 1..=100, got {}",
                self.normalize.quality
            ));
        }
        if self.fetch.timeout_secs == 0 {
            return Err("fetch.timeout_secs must be positive".to_owned());
        }
        Ok(())
    }
}

impl FetchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
