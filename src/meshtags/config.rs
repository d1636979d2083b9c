use anyhow::{anyhow, bail};
use log::debug;

/// Settings for [`write_tagged_entities`](super::write_tagged_entities)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterConfig {
    /// check that local indices are sorted with owned entities first
    pub validate_input: bool,
    /// group that every named tag set is written below
    pub root: String,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            validate_input: cfg!(debug_assertions),
            root: Self::DEFAULT_ROOT.to_string(),
        }
    }
}

impl WriterConfig {
    pub const DEFAULT_ROOT: &'static str = "/MeshTags";
    pub const VALIDATE_ENV: &'static str = "MESHTAGS_VALIDATE";
    pub const ROOT_ENV: &'static str = "MESHTAGS_ROOT";

    /// Defaults, overridden by `MESHTAGS_VALIDATE` and `MESHTAGS_ROOT`
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(value) = lookup(Self::VALIDATE_ENV) {
            config.validate_input = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => true,
                "0" | "false" | "off" | "no" => false,
                other => bail!("{}: cannot parse {:?} as a flag", Self::VALIDATE_ENV, other),
            };
        }

        if let Some(value) = lookup(Self::ROOT_ENV) {
            config = config.with_root(&value)?;
        }

        debug!("Writer configuration: {:?}", config);
        Ok(config)
    }

    pub fn with_validation(mut self, validate_input: bool) -> Self {
        self.validate_input = validate_input;
        self
    }

    pub fn with_root(mut self, root: &str) -> anyhow::Result<Self> {
        let root = root.trim().trim_end_matches('/');
        if !root.starts_with('/') {
            return Err(anyhow!("group root {:?} must be an absolute path", root));
        }
        self.root = root.to_string();
        Ok(self)
    }

    /// `<root>/<name>`, shared by the values and the topology of a tag set
    pub fn path_prefix(&self, name: &str) -> String {
        format!("{}/{}", self.root, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = WriterConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, WriterConfig::default());
        assert_eq!(config.path_prefix("material"), "/MeshTags/material");
    }

    #[test]
    fn test_overrides() {
        let config = WriterConfig::from_lookup(lookup(&[
            ("MESHTAGS_VALIDATE", "off"),
            ("MESHTAGS_ROOT", "/Tags/"),
        ]))
        .unwrap();
        assert!(!config.validate_input);
        assert_eq!(config.path_prefix("bc"), "/Tags/bc");

        let config = WriterConfig::from_lookup(lookup(&[("MESHTAGS_VALIDATE", "TRUE")])).unwrap();
        assert!(config.validate_input);
    }

    #[test]
    fn test_bad_values() {
        assert!(WriterConfig::from_lookup(lookup(&[("MESHTAGS_VALIDATE", "maybe")])).is_err());
        assert!(WriterConfig::from_lookup(lookup(&[("MESHTAGS_ROOT", "Tags")])).is_err());
    }
}
