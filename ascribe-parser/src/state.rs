use std::sync::Arc;

use ascribe_core::{Doctype, SafeMode};

use crate::{
    Options,
    attributes::{AttributeStore, AttributeValue},
    constants::{default_attributes, is_protected},
    diagnostic::{Diagnostic, Diagnostics},
    error::Error,
    inline::{Html5Converter, InlineConverter},
    model::Catalog,
    substitution::{Substitution, Substitutor},
};

/// Everything one parse mutates, threaded through the reader, lexer and substitutor.
#[derive(Debug)]
pub(crate) struct ParserState<'o> {
    pub(crate) options: &'o Options,
    pub(crate) attributes: AttributeStore,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) catalog: Catalog,
    pub(crate) converter: Arc<dyn InlineConverter>,
    /// Set once a condition aborts the parse; the reader stops yielding lines.
    pub(crate) fatal: Option<Error>,
}

impl<'o> ParserState<'o> {
    pub(crate) fn new(options: &'o Options) -> Self {
        let converter = options
            .inline_converter
            .clone()
            .unwrap_or_else(|| Arc::new(Html5Converter));
        Self {
            attributes: seed_attributes(options),
            options,
            diagnostics: Diagnostics::default(),
            catalog: Catalog::default(),
            converter,
            fatal: None,
        }
    }

    /// Record a recoverable problem. In strict mode an error-severity diagnostic aborts.
    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        self.collect_attribute_diagnostics();
        let escalate = self.options.strict
            && diagnostic.severity == crate::diagnostic::Severity::Error
            && self.fatal.is_none();
        if escalate {
            self.fatal = Some(diagnostic.clone().into_error());
        }
        self.diagnostics.push(diagnostic);
    }

    /// Abort the parse. Only the first fatal error is kept.
    pub(crate) fn abort(&mut self, error: Error) {
        tracing::error!(%error, "aborting parse");
        if self.fatal.is_none() {
            self.fatal = Some(error);
        }
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.fatal.is_some()
    }

    /// Move diagnostics raised while resolving attribute references into the parse's
    /// diagnostic list.
    pub(crate) fn collect_attribute_diagnostics(&mut self) {
        let pending = self.attributes.take_diagnostics();
        self.diagnostics.extend(pending);
    }

    /// The effective doctype: the `doctype` attribute when it names one, the option
    /// otherwise.
    pub(crate) fn doctype(&self) -> Doctype {
        self.attributes
            .get("doctype")
            .and_then(|name| name.parse().ok())
            .unwrap_or(self.options.doctype)
    }

    pub(crate) fn safe_mode(&self) -> SafeMode {
        self.options.safe_mode
    }

    /// Run `subs` over `text`.
    pub(crate) fn substitute(&mut self, text: &str, subs: &[Substitution]) -> String {
        Substitutor::new(self).apply(text, subs)
    }
}

/// Build the initial attribute set: universal defaults (soft), the safe mode and
/// doctype, the source name and finally the caller's attributes.
fn seed_attributes(options: &Options) -> AttributeStore {
    let mut store = AttributeStore::new();
    for (name, value) in default_attributes() {
        store.set(name, value, false);
    }
    store.set(
        "attribute-missing",
        options.compliance.attribute_missing.as_str(),
        false,
    );
    store.set(
        "attribute-undefined",
        options.compliance.attribute_undefined.as_str(),
        false,
    );

    let safe_mode = options.safe_mode;
    store.set("safe-mode-name", safe_mode.name(), true);
    store.set("safe-mode-level", safe_mode.level().to_string(), true);
    store.set(&format!("safe-mode-{}", safe_mode.name()), "", true);
    let doctype = options.doctype.name();
    store.set("doctype", doctype, is_protected("doctype", safe_mode));
    store.set(&format!("doctype-{doctype}"), "", false);
    if is_protected("backend", safe_mode) {
        store.lock("backend");
    }

    if let Some(source) = &options.source_name {
        let file = source.rsplit('/').next().unwrap_or(source);
        let (name, suffix) = match file.rsplit_once('.') {
            Some((name, suffix)) if !name.is_empty() => (name, format!(".{suffix}")),
            Some(_) | None => (file, String::new()),
        };
        store.set("docname", name, true);
        store.set("docfilesuffix", suffix, true);
        if safe_mode < SafeMode::Server {
            store.set("docfile", source.as_str(), true);
        }
    }

    for (name, value) in &options.attributes {
        let (name, soft) = match name.strip_suffix('@') {
            Some(name) => (name, true),
            None => (name.as_str(), false),
        };
        let (name, unset) = match name.strip_suffix('!') {
            Some(name) => (name, true),
            None => (name, false),
        };
        if unset || matches!(value, AttributeValue::Bool(false)) {
            store.unset(name);
            if !soft {
                store.lock(name);
            }
            continue;
        }
        match value {
            AttributeValue::Bool(_) => store.set(name, "", !soft),
            AttributeValue::String(value) => match value.strip_suffix('@') {
                Some(value) => store.set(name, value, false),
                None => store.set(name, value.as_str(), !soft),
            },
        }
    }
    store
}
