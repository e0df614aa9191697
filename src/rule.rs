use crate::artifact::Artifact;
use crate::action::{Builder, Kwargs};
use crate::runner::CommandRunner;
use crate::printer::Printer;

/*  C3: a bound (targets, deps, builder) unit producing concrete artifacts.
    Validated at construction time rather than left to fail later at
    resolution; a malformed Rule never makes it into a registry. */
#[derive(Clone)]
pub struct Rule
{
    pub targets: Vec<Artifact>,
    pub deps: Vec<Artifact>,
    pub builder: Builder,
    pub kwargs: Kwargs,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleError
{
    NoTargets,
    DuplicateTarget(String),
    DepIsNotADep(String),
    TargetIsNotATarget(String),
}

impl std::fmt::Display for RuleError
{
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result
    {
        match self
        {
            RuleError::NoTargets => write!(formatter, "a rule must have at least one target"),
            RuleError::DuplicateTarget(label) => write!(formatter, "duplicate target in rule: {}", label),
            RuleError::DepIsNotADep(label) => write!(formatter, "dep list contains a target-role artifact: {}", label),
            RuleError::TargetIsNotATarget(label) => write!(formatter, "target list contains a dep-role artifact: {}", label),
        }
    }
}

impl Rule
{
    pub fn new(
        targets: Vec<Artifact>,
        deps: Vec<Artifact>,
        builder: Builder,
        kwargs: Kwargs,
        name: Option<String>,
    ) -> Result<Rule, RuleError>
    {
        if targets.is_empty()
        {
            return Err(RuleError::NoTargets);
        }

        let mut seen = std::collections::HashSet::new();
        for target in targets.iter()
        {
            if !target.is_target()
            {
                return Err(RuleError::TargetIsNotATarget(target.label().to_string()));
            }
            if !seen.insert(target.resolution_key())
            {
                return Err(RuleError::DuplicateTarget(target.label().to_string()));
            }
        }

        for dep in deps.iter()
        {
            if dep.is_target()
            {
                return Err(RuleError::DepIsNotADep(dep.label().to_string()));
            }
        }

        Ok(Rule { targets, deps, builder, kwargs, name })
    }

    /*  True when `artifact` (a target-role artifact, per §4.6 step 2) is
        among this rule's targets, by resolution identity rather than
        strict equality -- a FileDep looked up via `as_target()` matches
        the FileTarget a rule actually declares. */
    pub fn produces(&self, artifact: &Artifact) -> bool
    {
        let key = artifact.resolution_key();
        self.targets.iter().any(|target| target.resolution_key() == key)
    }

    pub fn dep_labels(&self) -> Vec<String>
    {
        self.deps.iter().map(|dep| dep.label().to_string()).collect()
    }

    pub fn target_labels(&self) -> Vec<String>
    {
        self.targets.iter().map(|target| target.label().to_string()).collect()
    }

    /*  Delegates straight to the Builder with this rule's own (deps,
        targets, kwargs) -- C3 carries no execution logic of its own. */
    pub fn apply(
        &self,
        runner: &mut dyn CommandRunner,
        printer: &mut dyn Printer,
    ) -> Result<(), String>
    {
        let deps = self.dep_labels();
        let targets = self.target_labels();
        self.builder.run_with_rule_kwargs(&self.kwargs, &deps, &targets, runner, printer)
    }

    pub fn describe(&self) -> String
    {
        self.builder.describe(&self.dep_labels(), &self.target_labels())
    }
}
