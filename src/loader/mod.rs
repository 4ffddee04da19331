//! Script loader over an in-memory document.
//!
//! [`Document::load_script`] builds a `text/javascript` script tag and puts
//! it in the body, ahead of any script already there so it is fetched first.
//! While the document is still loading (no body yet) the tag is held back
//! until [`Document::dom_content_loaded`].
//!
//! The host reports the outcome through [`Document::fire_load`] or
//! [`Document::fire_error`], which hand it to the caller's callback once.
//! A callback whose tag is removed from the body before it settles is
//! dropped by [`Document::prune_detached_callbacks`], which also runs on
//! every [`Document::load_script`].
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use telemetry_sanitizer::loader::{Document, LoadEvent};
//!
//! let mut document = Document::with_body();
//! let seen = Arc::new(Mutex::new(None));
//! let sink = Arc::clone(&seen);
//! let id = document
//!     .load_script("https://cdn.example.com", move |error, event| {
//!         *sink.lock().unwrap() = Some((error, event));
//!     })
//!     .unwrap();
//!
//! assert_eq!(document.scripts()[0].src, "https://cdn.example.com/");
//! document.fire_load(id, LoadEvent::new("load")).unwrap();
//! assert!(seen.lock().unwrap().is_some());
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;

use thiserror::Error;

use crate::error::LoaderError;

/// MIME type set on every loaded script.
pub const SCRIPT_TYPE: &str = "text/javascript";

/// Completion callback: `(None, Some(event))` on load, `(Some(error), None)`
/// on failure.
pub type ScriptCallback = Box<dyn FnOnce(Option<ScriptError>, Option<LoadEvent>) + Send>;

/// Handle for a script inserted by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptId(u64);

impl ScriptId {
    /// Raw numeric id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event delivered to the callback when a script loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadEvent {
    /// Event type, usually `load`.
    pub kind: String,
}

impl LoadEvent {
    /// Create an event of the given type.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }
}

/// Failure delivered to the callback when a script does not load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScriptError {
    /// Host supplied failure description.
    pub message: String,
}

impl ScriptError {
    /// Create an error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A `<script>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTag {
    /// Set for tags created by [`Document::load_script`].
    pub id: Option<ScriptId>,
    /// Normalised source URL.
    pub src: String,
    /// MIME type.
    pub script_type: String,
    /// Whether the script loads asynchronously.
    pub is_async: bool,
}

impl ScriptTag {
    /// A script already on the page, not managed by the loader.
    #[must_use]
    pub fn external(src: impl Into<String>) -> Self {
        Self {
            id: None,
            src: src.into(),
            script_type: SCRIPT_TYPE.to_string(),
            is_async: false,
        }
    }
}

/// A child of the document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    /// A script tag.
    Script(ScriptTag),
    /// Any other element, identified by tag name.
    Other(String),
}

/// In-memory document with an optional body.
#[derive(Default)]
pub struct Document {
    body: Option<Vec<Element>>,
    deferred: Vec<ScriptTag>,
    callbacks: HashMap<ScriptId, ScriptCallback>,
    next_id: u64,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("body", &self.body)
            .field("deferred", &self.deferred)
            .field("pending_callbacks", &self.callbacks.len())
            .finish_non_exhaustive()
    }
}

impl Document {
    /// A document that is still loading and has no body.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A document with an empty body.
    #[must_use]
    pub fn with_body() -> Self {
        Self {
            body: Some(Vec::new()),
            ..Self::default()
        }
    }

    /// Body children, or `None` while the document is loading.
    #[must_use]
    pub fn body(&self) -> Option<&[Element]> {
        self.body.as_deref()
    }

    /// Mutable body children, or `None` while the document is loading.
    ///
    /// Removing a pending script tag here leaves its callback registered
    /// until the next [`prune_detached_callbacks`](Self::prune_detached_callbacks).
    pub fn body_mut(&mut self) -> Option<&mut Vec<Element>> {
        self.body.as_mut()
    }

    /// All script tags in the body, in document order.
    #[must_use]
    pub fn scripts(&self) -> Vec<&ScriptTag> {
        self.body
            .iter()
            .flatten()
            .filter_map(|element| match element {
                Element::Script(tag) => Some(tag),
                Element::Other(_) => None,
            })
            .collect()
    }

    /// Number of scripts waiting for the body to appear.
    #[must_use]
    pub fn deferred_count(&self) -> usize {
        self.deferred.len()
    }

    /// Create a script tag for `url` and insert it into the body.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::EmptyUrl`] if `url` is blank.
    pub fn load_script<F>(&mut self, url: &str, callback: F) -> Result<ScriptId, LoaderError>
    where
        F: FnOnce(Option<ScriptError>, Option<LoadEvent>) + Send + 'static,
    {
        let url = url.trim();
        if url.is_empty() {
            return Err(LoaderError::EmptyUrl);
        }

        self.prune_detached_callbacks();

        let id = ScriptId(self.next_id);
        self.next_id += 1;
        let tag = ScriptTag {
            id: Some(id),
            src: normalize_script_url(url),
            script_type: SCRIPT_TYPE.to_string(),
            is_async: true,
        };
        self.callbacks.insert(id, Box::new(callback));

        if self.body.is_some() {
            self.insert(tag);
        } else {
            tracing::debug!(script_id = %id, src = %tag.src, "Deferring script until body is ready");
            self.deferred.push(tag);
        }
        Ok(id)
    }

    /// Number of callbacks still waiting to fire.
    #[must_use]
    pub fn pending_callbacks(&self) -> usize {
        self.callbacks.len()
    }

    /// Drop callbacks whose script tag is neither in the body nor deferred.
    ///
    /// Returns the number of callbacks dropped. Dropped callbacks never fire.
    pub fn prune_detached_callbacks(&mut self) -> usize {
        let live: HashSet<ScriptId> = self
            .scripts()
            .into_iter()
            .chain(&self.deferred)
            .filter_map(|tag| tag.id)
            .collect();
        let before = self.callbacks.len();
        self.callbacks.retain(|id, _| live.contains(id));
        let dropped = before - self.callbacks.len();
        if dropped > 0 {
            tracing::debug!(dropped, "Dropped callbacks for detached scripts");
        }
        dropped
    }

    /// Mark the document as loaded: create the body if missing and insert
    /// every deferred script.
    pub fn dom_content_loaded(&mut self) {
        if self.body.is_none() {
            self.body = Some(Vec::new());
        }
        for tag in std::mem::take(&mut self.deferred) {
            self.insert(tag);
        }
    }

    /// Report a successful load of script `id`.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::UnknownScript`] if `id` is not in the body or
    /// has already settled.
    pub fn fire_load(&mut self, id: ScriptId, event: LoadEvent) -> Result<(), LoaderError> {
        let callback = self.take_callback(id)?;
        callback(None, Some(event));
        Ok(())
    }

    /// Report a failed load of script `id`.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::UnknownScript`] if `id` is not in the body or
    /// has already settled.
    pub fn fire_error(&mut self, id: ScriptId, error: ScriptError) -> Result<(), LoaderError> {
        let callback = self.take_callback(id)?;
        tracing::warn!(script_id = %id, error = %error, "Script failed to load");
        callback(Some(error), None);
        Ok(())
    }

    fn insert(&mut self, tag: ScriptTag) {
        let Some(body) = self.body.as_mut() else {
            self.deferred.push(tag);
            return;
        };
        let first_script = body
            .iter()
            .position(|element| matches!(element, Element::Script(_)));
        match first_script {
            Some(index) => body.insert(index, Element::Script(tag)),
            None => body.push(Element::Script(tag)),
        }
    }

    fn take_callback(&mut self, id: ScriptId) -> Result<ScriptCallback, LoaderError> {
        let in_body = self.scripts().iter().any(|tag| tag.id == Some(id));
        if !in_body {
            return Err(LoaderError::UnknownScript { id: id.get() });
        }
        self.callbacks
            .remove(&id)
            .ok_or(LoaderError::UnknownScript { id: id.get() })
    }
}

/// Append `/` to a bare origin such as `https://host` or `https://host?x=1`.
///
/// URLs with a path, and URLs without a scheme, are returned unchanged.
#[must_use]
pub fn normalize_script_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let authority_start = scheme_end + 3;
    let rest = &url[authority_start..];
    let authority_len = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    if rest[authority_len..].starts_with('/') {
        return url.to_string();
    }
    let split = authority_start + authority_len;
    format!("{}/{}", &url[..split], &url[split..])
}
