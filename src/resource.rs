//! SQL text sources: compiled-in scripts, key/value bundles and plain files.
//!
//! Scripts and bundles live in an explicit [`ResourceRegistry`] keyed by a
//! fully-qualified identifier such as `app.sql.CreateTables.sql`. A registry
//! can be filled by hand or from a [`RustEmbed`] folder.

use std::collections::HashMap;
use std::io;
use std::path::Path;

use rust_embed::RustEmbed;
use tracing::debug;

use crate::error::{DbError, DbResult};

const BUNDLE_EXTENSION: &str = ".json";

#[derive(Debug, Default, Clone)]
pub struct ResourceRegistry {
    scripts: HashMap<String, String>,
    bundles: HashMap<String, HashMap<String, String>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from every file of an embedded folder.
    ///
    /// `*.json` files become bundles, named without the extension; every
    /// other file becomes a script. Identifiers are `namespace.path` with
    /// `/` turned into `.`.
    pub fn from_embedded<E: RustEmbed>(namespace: &str) -> DbResult<Self> {
        let mut registry = Self::new();
        registry.load_embedded::<E>(namespace)?;
        Ok(registry)
    }

    pub fn load_embedded<E: RustEmbed>(&mut self, namespace: &str) -> DbResult<()> {
        for path in E::iter() {
            let Some(file) = E::get(&path) else {
                continue;
            };
            let id = qualified_id(namespace, &path);
            let text = String::from_utf8(file.data.into_owned()).map_err(|_| {
                DbError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("embedded resource '{id}' is not valid UTF-8"),
                ))
            })?;
            match id.strip_suffix(BUNDLE_EXTENSION).map(str::to_string) {
                Some(bundle) => self.register_bundle_json(&bundle, &text)?,
                None => self.register_script(id, text),
            }
        }
        debug!(
            namespace,
            scripts = self.scripts.len(),
            bundles = self.bundles.len(),
            "loaded embedded resources"
        );
        Ok(())
    }

    pub fn register_script(&mut self, id: impl Into<String>, text: impl Into<String>) {
        self.scripts.insert(id.into(), text.into());
    }

    pub fn register_bundle<I, K, V>(&mut self, id: impl Into<String>, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.bundles.insert(id.into(), entries);
    }

    /// Register a bundle given as a JSON object of strings.
    pub fn register_bundle_json(&mut self, id: &str, json: &str) -> DbResult<()> {
        let entries: HashMap<String, String> =
            serde_json::from_str(json).map_err(|err| DbError::InvalidBundle {
                bundle: id.to_string(),
                message: err.to_string(),
            })?;
        self.bundles.insert(id.to_string(), entries);
        Ok(())
    }

    /// Text of the script registered under `id`.
    pub fn read_embedded(&self, id: &str) -> DbResult<String> {
        self.scripts
            .get(id)
            .cloned()
            .ok_or_else(|| DbError::ScriptNotFound(id.to_string()))
    }

    /// Value of `key` inside the bundle registered under `bundle`.
    pub fn read_resource(&self, bundle: &str, key: &str) -> DbResult<String> {
        let entries = self
            .bundles
            .get(bundle)
            .ok_or_else(|| DbError::ResourceFileNotFound(bundle.to_string()))?;
        entries
            .get(key)
            .cloned()
            .ok_or_else(|| DbError::ResourceKeyNotFound {
                bundle: bundle.to_string(),
                key: key.to_string(),
            })
    }
}

/// Read a text file, mapping a missing file to [`DbError::FileNotFound`].
pub fn read_file(path: impl AsRef<Path>) -> DbResult<String> {
    let path = path.as_ref();
    std::fs::read_to_string(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => DbError::FileNotFound(path.display().to_string()),
        _ => DbError::Io(err),
    })
}

fn qualified_id(namespace: &str, path: &str) -> String {
    let path = path.replace(['/', '\\'], ".");
    if namespace.is_empty() {
        path
    } else {
        format!("{namespace}.{path}")
    }
}
