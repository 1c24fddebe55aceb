//! Secondary locations attached to a diagnostic.

use keel_source::Span;
use serde::Serialize;

/// Whether a label marks the diagnostic's own location or a related one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelStyle {
    /// The location the diagnostic is about.
    Primary,
    /// A related location, such as the import that pulled a file in.
    Related,
}

/// A location with an explanatory message.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct Label {
    /// The location this label annotates.
    pub span: Span,
    /// The message shown with the location.
    pub message: String,
    /// Whether this is the primary or a related location.
    pub style: LabelStyle,
}

impl Label {
    /// Creates a primary label.
    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            style: LabelStyle::Primary,
        }
    }

    /// Creates a label for a related location.
    pub fn related(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            style: LabelStyle::Related,
        }
    }
}
