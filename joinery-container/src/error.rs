//! Error types for container operations.
//!
//! Every failure names what was being built. A missing dependency deep in
//! a graph reports the whole chain, e.g.
//! `Checkout(payments) → Payments(gateway)`, not just the innermost miss.

use std::fmt;

use joinery_support::rendering::render_chain;

/// Main error type for all container operations.
#[derive(Debug, thiserror::Error)]
pub enum DiError {
    /// A build target has a signature the container cannot satisfy.
    #[error("{}", .0)]
    Configuration(ConfigurationError),

    /// No resolution strategy produced a value and no default exists.
    #[error("{}", .0)]
    MissingDependency(MissingDependencyError),

    /// A class or provider factory (indirectly) requires itself.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// A lazily-resolved attribute was read before its owner was activated.
    #[error("{}", .0)]
    NotActivated(NotActivatedError),

    /// A lazily-resolved attribute outlived the container it was activated
    /// with.
    #[error("Injected attribute ({attribute}) was activated with a container that has been dropped")]
    ContainerDropped { attribute: String },

    /// A resolved value is not of the type the target reads it as.
    #[error(
        "Type mismatch for `{parameter}` in {target}: expected {expected}, found {found}"
    )]
    TypeMismatch {
        target: String,
        parameter: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A constructor or factory body returned its own error.
    #[error("Failed to construct {target}: {source}")]
    ConstructionFailed {
        target: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl DiError {
    /// Wraps an error raised by user code while building `target`.
    pub fn construction_failed(
        target: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        DiError::ConstructionFailed {
            target: target.into(),
            source: source.into(),
        }
    }

    /// Records that this error happened while resolving `parameter` of
    /// `target`. Only missing-dependency errors keep a chain.
    pub(crate) fn within(self, target: &str, parameter: &str) -> Self {
        match self {
            DiError::MissingDependency(mut err) => {
                err.chain.insert(
                    0,
                    ChainLink {
                        target: target.to_string(),
                        parameter: parameter.to_string(),
                    },
                );
                DiError::MissingDependency(err)
            }
            other => other,
        }
    }

    /// Returns `true` for missing-dependency failures.
    pub fn is_missing_dependency(&self) -> bool {
        matches!(self, DiError::MissingDependency(_))
    }
}

/// Which catch-all parameter a signature declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchAll {
    /// An open-ended positional list (`*args`).
    Positional,
    /// An open-ended keyword map (`**kwargs`).
    Keyword,
}

/// Error when a build target declares catch-all parameters.
#[derive(Debug)]
pub struct ConfigurationError {
    pub target: String,
    pub catch_all: CatchAll,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.catch_all {
            CatchAll::Positional => "*args",
            CatchAll::Keyword => "**kwargs",
        };
        write!(
            f,
            "Invalid build target: {} has {what} in its constructor",
            self.target
        )?;
        write!(
            f,
            "\n  Hint: The container cannot know what an open-ended parameter list expects; declare each dependency explicitly"
        )
    }
}

/// One step of a resolution chain: `target` needed `parameter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink {
    pub target: String,
    pub parameter: String,
}

impl fmt::Display for ChainLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.target, self.parameter)
    }
}

/// Error when nothing satisfies a required parameter.
#[derive(Debug)]
pub struct MissingDependencyError {
    /// The parameter (or requested name) that could not be resolved.
    pub parameter: String,
    /// The class or function that declared it, if any.
    pub target: Option<String>,
    /// Outermost first.
    pub chain: Vec<ChainLink>,
    /// Why a global-module path failed, when that is the cause.
    pub detail: Option<String>,
    /// Known names that look like the requested one.
    pub suggestions: Vec<String>,
}

impl MissingDependencyError {
    pub fn new(parameter: impl Into<String>, target: Option<String>) -> Self {
        Self {
            parameter: parameter.into(),
            target,
            chain: Vec::new(),
            detail: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }
}

impl fmt::Display for MissingDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Missing dependency: `{}`", self.parameter)?;

        if let Some(ref target) = self.target {
            write!(f, " required by {target}")?;
        }

        if let Some(ref detail) = self.detail {
            write!(f, "\n  Detail: {detail}")?;
        }

        if self.chain.len() > 1 {
            write!(f, "\n  Resolution chain: {}", render_chain(&self.chain_strings()))?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        write!(
            f,
            "\n  Hint: Add a binding named `{0}`, a provider factory `provide_{0}`, or register a class for it",
            self.parameter
        )
    }
}

impl MissingDependencyError {
    fn chain_strings(&self) -> Vec<String> {
        self.chain.iter().map(ToString::to_string).collect()
    }
}

/// Error when a class or provider factory requires itself.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// Example: ["A", "B", "A"]
    pub chain: Vec<String>,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Circular dependency detected:\n  {}", render_chain(&self.chain))?;
        write!(
            f,
            "\n  Hint: Consider an `Inject` attribute, which resolves on first read instead of at construction"
        )
    }
}

/// Error when an `Inject` attribute is read before activation.
#[derive(Debug)]
pub struct NotActivatedError {
    /// Description of the attribute's source, e.g. `by name "mailer"`.
    pub attribute: String,
    pub type_name: &'static str,
}

impl fmt::Display for NotActivatedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Injected attribute ({}) of type {} is not initialized",
            self.attribute, self.type_name
        )?;
        write!(
            f,
            "\n  Hint: Build the owner through the container, or call `activate` with a container first"
        )
    }
}

/// Convenient Result type for container operations.
pub type Result<T> = std::result::Result<T, DiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_display() {
        let err = DiError::Configuration(ConfigurationError {
            target: "MyClass".into(),
            catch_all: CatchAll::Positional,
        });
        let msg = format!("{err}");
        assert!(msg.contains("has *args in its constructor"));

        let err = DiError::Configuration(ConfigurationError {
            target: "MyClass".into(),
            catch_all: CatchAll::Keyword,
        });
        assert!(format!("{err}").contains("has **kwargs in its constructor"));
    }

    #[test]
    fn missing_dependency_chain_is_outermost_first() {
        let err = DiError::MissingDependency(MissingDependencyError::new(
            "gateway",
            Some("Payments".into()),
        ))
        .within("Payments", "gateway")
        .within("Checkout", "payments");

        let msg = format!("{err}");
        assert!(msg.contains("`gateway` required by Payments"));
        assert!(msg.contains("Checkout(payments) → Payments(gateway)"));
    }

    #[test]
    fn within_leaves_other_errors_alone() {
        let err = DiError::TypeMismatch {
            target: "A".into(),
            parameter: "b".into(),
            expected: "u16",
            found: "alloc::string::String",
        }
        .within("Outer", "a");
        assert!(matches!(err, DiError::TypeMismatch { .. }));
    }

    #[test]
    fn missing_dependency_suggestions() {
        let err = MissingDependencyError::new("mailr", None)
            .with_suggestions(vec!["mailer".into()]);
        let msg = format!("{err}");
        assert!(msg.contains("Did you mean"));
        assert!(msg.contains("- mailer"));
    }

    #[test]
    fn circular_dependency_error_display() {
        let err = DiError::CircularDependency(CircularDependencyError {
            chain: vec!["A".into(), "B".into(), "A".into()],
        });
        let msg = format!("{err}");
        assert!(msg.contains("Circular"));
        assert!(msg.contains("A → B → A"));
    }

    #[test]
    fn construction_failed_keeps_source() {
        let err = DiError::construction_failed("Mailer", "smtp host is empty");
        assert!(format!("{err}").contains("Failed to construct Mailer: smtp host is empty"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
