/*  §7's taxonomy realized as one concrete type. Hand-rolled Display, no
    external error-derive crate -- matches the teacher's own BuildError/
    SystemError/InitDirectoryError enums in build.rs/system/mod.rs. */
#[derive(Debug, Clone)]
pub enum EngineError
{
    UnresolvedTarget { label: String },
    DependencyCycle { label: String, stack: Vec<String> },
    BuilderFailure { label: String, reason: String },
    PatternMalformed { pattern: String, reason: String },
    SubBuildFailure { subdir: String, inner: Box<EngineError> },
    ScriptError { path: String, reason: String },
}

impl std::fmt::Display for EngineError
{
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result
    {
        match self
        {
            EngineError::UnresolvedTarget { label } =>
                write!(formatter, "no rule produces requested target: {}", label),

            EngineError::DependencyCycle { label, stack } =>
                write!(formatter, "dependency cycle detected at {}: {}", label, stack.join(" -> ")),

            EngineError::BuilderFailure { label, reason } =>
                write!(formatter, "build failed for {}: {}", label, reason),

            EngineError::PatternMalformed { pattern, reason } =>
                write!(formatter, "malformed pattern {}: {}", pattern, reason),

            EngineError::SubBuildFailure { subdir, inner } =>
                write!(formatter, "sub-build in {} failed: {}", subdir, inner),

            EngineError::ScriptError { path, reason } =>
                write!(formatter, "error evaluating {}: {}", path, reason),
        }
    }
}

impl std::error::Error for EngineError {}

/*  AmbiguousRule (§7) is deliberately not a variant here: spec.md says
    two rules producing the same target is observed source behavior
    ("last wins"), never fatal. It surfaces only as a Printer warning at
    registration time -- see Context::register_rule callers in script/mod.rs. */
