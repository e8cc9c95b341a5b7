//! Engine options derived from the page layout.
//!
//! The safety entries (no JavaScript, no link navigation) are not
//! configurable: documents are untrusted input and the engine must never run
//! their scripts.

use crate::config::PageLayout;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Value of one engine option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// Switch without an argument, e.g. `--disable-javascript`.
    Flag,
    Value(String),
    Path(PathBuf),
}

/// Option name (without leading dashes) → value, in deterministic order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    entries: BTreeMap<&'static str, OptionValue>,
}

impl RenderOptions {
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// String value of an option, if it has one.
    pub fn value(&self, name: &str) -> Option<&str> {
        match self.entries.get(name)? {
            OptionValue::Value(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &OptionValue)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Command-line form: `--name` for flags, `--name value` otherwise.
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args = Vec::with_capacity(self.entries.len() * 2);
        for (name, value) in &self.entries {
            args.push(OsString::from(format!("--{name}")));
            match value {
                OptionValue::Flag => {}
                OptionValue::Value(v) => args.push(OsString::from(v)),
                OptionValue::Path(p) => args.push(p.clone().into_os_string()),
            }
        }
        args
    }

    fn flag(&mut self, name: &'static str) {
        self.entries.insert(name, OptionValue::Flag);
    }

    fn set(&mut self, name: &'static str, value: impl Into<String>) {
        self.entries.insert(name, OptionValue::Value(value.into()));
    }
}

/// Map layout settings and per-file fragment paths to engine options.
///
/// `header-html` / `footer-html` appear only when the matching path is given.
pub fn build_render_options(
    layout: &PageLayout,
    header_path: Option<&Path>,
    footer_path: Option<&Path>,
) -> RenderOptions {
    let mut o = RenderOptions::default();

    o.set("page-size", layout.page_size.as_str());
    o.set("margin-top", format!("{}mm", layout.margins.top));
    o.set("margin-right", format!("{}mm", layout.margins.right));
    o.set("margin-bottom", format!("{}mm", layout.margins.bottom));
    o.set("margin-left", format!("{}mm", layout.margins.left));
    o.set("encoding", layout.encoding.as_str());

    // Fragments are loaded from local temp files.
    o.flag("enable-local-file-access");
    o.flag("disable-external-links");
    o.flag("disable-internal-links");
    o.flag("disable-javascript");
    o.flag("quiet");

    o.set("header-spacing", "5");
    o.set("footer-spacing", "5");
    o.set("footer-right", "[page]/[toPage]");
    o.set("footer-font-size", "10");

    if let Some(p) = header_path {
        o.entries.insert("header-html", OptionValue::Path(p.to_path_buf()));
    }
    if let Some(p) = footer_path {
        o.entries.insert("footer-html", OptionValue::Path(p.to_path_buf()));
    }
    o
}
