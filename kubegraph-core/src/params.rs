//! Request parameter types for list/watch/patch calls.
use crate::Error;

/// Common query parameters used in list and watch calls on collections
#[derive(Clone, Debug, Default)]
pub struct ListParams {
    /// A selector to restrict the list of returned objects by their labels.
    ///
    /// Defaults to everything if `None`.
    pub label_selector: Option<String>,

    /// A selector to restrict the list of returned objects by their fields.
    pub field_selector: Option<String>,

    /// Timeout for the list/watch call, seconds.
    ///
    /// Limited to 295s due to inherent watch limitations upstream.
    pub timeout: Option<u32>,
}

impl ListParams {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if let Some(to) = &self.timeout {
            if *to >= 295 {
                return Err(Error::Validation("ListParams::timeout must be < 295s".into()));
            }
        }
        Ok(())
    }

    pub(crate) fn populate_qp(&self, qp: &mut form_urlencoded::Serializer<String>) {
        if let Some(fields) = &self.field_selector {
            qp.append_pair("fieldSelector", fields);
        }
        if let Some(labels) = &self.label_selector {
            qp.append_pair("labelSelector", labels);
        }
        if let Some(to) = &self.timeout {
            qp.append_pair("timeoutSeconds", &to.to_string());
        }
    }

    /// Configure the selector to restrict returned objects by their labels.
    #[must_use]
    pub fn labels(mut self, label_selector: &str) -> Self {
        self.label_selector = Some(label_selector.to_string());
        self
    }

    /// Configure the selector to restrict returned objects by their fields.
    #[must_use]
    pub fn fields(mut self, field_selector: &str) -> Self {
        self.field_selector = Some(field_selector.to_string());
        self
    }

    /// Configure the timeout for list/watch calls.
    #[must_use]
    pub fn timeout(mut self, timeout_secs: u32) -> Self {
        self.timeout = Some(timeout_secs);
        self
    }
}

/// A patch body with its wire content type.
///
/// The gateway only issues RFC 7396 merge patches; the enum exists so the
/// request builder states the content type next to the body it belongs to.
#[derive(Debug, Clone)]
pub enum Patch<T> {
    /// An RFC 7396 JSON merge patch.
    Merge(T),
}

impl<T> Patch<T> {
    pub(crate) fn content_type(&self) -> &'static str {
        match self {
            Self::Merge(_) => "application/merge-patch+json",
        }
    }
}

impl<T: serde::Serialize> Patch<T> {
    pub(crate) fn serialize(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::Merge(p) => serde_json::to_vec(p),
        }
    }
}
