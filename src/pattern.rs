use std::collections::HashSet;
use std::path::Path;

use regex::Regex;

use crate::artifact::Artifact;
use crate::action::{Builder, Kwargs};
use crate::rule::{Rule, RuleError};
use crate::system::System;

#[derive(Debug, Clone, PartialEq)]
pub enum PatternRuleError
{
    NoDeps,
    TargetPatternMalformed(String),
    DepPatternMalformed(String),
}

impl std::fmt::Display for PatternRuleError
{
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result
    {
        match self
        {
            PatternRuleError::NoDeps => write!(formatter, "a pattern rule needs at least one dep pattern"),
            PatternRuleError::TargetPatternMalformed(pattern) =>
                write!(formatter, "target pattern must contain exactly one wildcard (* or %): {}", pattern),
            PatternRuleError::DepPatternMalformed(pattern) =>
                write!(formatter, "dep pattern must contain exactly one wildcard (* or %): {}", pattern),
        }
    }
}

fn is_wildcard(c: char) -> bool
{
    c == '*' || c == '%'
}

fn wildcard_index(pattern: &str) -> Option<usize>
{
    pattern.find(is_wildcard)
}

/*  Compiles a pattern containing exactly one wildcard into a regex with a
    single capturing group standing for the (non-empty) stem. */
fn compile(pattern: &str) -> Result<Regex, ()>
{
    let count = pattern.chars().filter(|c| is_wildcard(*c)).count();
    if count != 1
    {
        return Err(());
    }

    let index = wildcard_index(pattern).unwrap();
    let prefix = &pattern[..index];
    let suffix = &pattern[index + 1..];
    let source = format!("^{}(.+){}$", regex::escape(prefix), regex::escape(suffix));
    Regex::new(&source).map_err(|_| ())
}

fn substitute(pattern: &str, stem: &str) -> String
{
    let index = wildcard_index(pattern).expect("pattern already validated to contain one wildcard");
    let mut result = String::with_capacity(pattern.len() + stem.len());
    result.push_str(&pattern[..index]);
    result.push_str(stem);
    result.push_str(&pattern[index + 1..]);
    result
}

fn join_pattern(cwd: &str, pattern: &str) -> String
{
    if Path::new(pattern).is_absolute()
    {
        pattern.to_string()
    }
    else
    {
        format!("{}/{}", cwd.trim_end_matches('/'), pattern)
    }
}

fn relative_to(dir: &str, path: &str) -> String
{
    let prefix = format!("{}/", dir.trim_end_matches('/'));
    match path.strip_prefix(&prefix)
    {
        Some(rest) => rest.to_string(),
        None => path.to_string(),
    }
}

/*  C4: a templated rule whose target bears a single wildcard. Deliberately
    file-only -- spec.md §4.4 calls out that virtual patterns aren't
    supported by `allTargets` enumeration, and the two example scenarios
    (§8.2/§8.3) are both plain filename globs, so there is no virtual-kind
    variant here. */
#[derive(Clone)]
pub struct PatternRule
{
    pub target_pattern: String,
    pub dep_patterns: Vec<String>,
    pub builder: Builder,
    pub kwargs: Kwargs,
    pub name: Option<String>,
    pub exclude: HashSet<String>,
}

impl PatternRule
{
    /*  `exclude` arrives as the raw relative names the caller wrote (e.g.
        "x.bar", see script/mod.rs's `exclude` option) -- normalized here
        against `cwd` into the same absolute-label form every Artifact
        carries, so both `matches` (absolute candidates) and `all_targets`
        (globbed then re-anchored) key off one consistent representation
        instead of silently comparing relative names to absolute paths. */
    pub fn new(
        cwd: &str,
        target_pattern: String,
        dep_patterns: Vec<String>,
        builder: Builder,
        kwargs: Kwargs,
        name: Option<String>,
        exclude: HashSet<String>,
    ) -> Result<PatternRule, PatternRuleError>
    {
        if compile(&target_pattern).is_err()
        {
            return Err(PatternRuleError::TargetPatternMalformed(target_pattern));
        }

        if dep_patterns.is_empty()
        {
            return Err(PatternRuleError::NoDeps);
        }

        for dep_pattern in dep_patterns.iter()
        {
            if compile(dep_pattern).is_err()
            {
                return Err(PatternRuleError::DepPatternMalformed(dep_pattern.clone()));
            }
        }

        let exclude = exclude.iter()
            .map(|raw| Artifact::file_target(cwd, raw).label().to_string())
            .collect();

        Ok(PatternRule { target_pattern, dep_patterns, builder, kwargs, name, exclude })
    }

    /*  §4.4 matching: a non-empty-stem wildcard match against the target
        pattern, and not excluded. Returns the captured stem on success. */
    pub fn matches(&self, cwd: &str, candidate: &Artifact) -> Option<String>
    {
        if candidate.is_virtual() || self.exclude.contains(candidate.label())
        {
            return None;
        }

        let full_pattern = join_pattern(cwd, &self.target_pattern);
        let regex = compile(&full_pattern).ok()?;
        regex.captures(candidate.label()).map(|captures| captures[1].to_string())
    }

    /*  Synthesizes the ephemeral Rule this stem would produce. Never
        registered in any registry -- the caller (the resolver) owns it. */
    pub fn synthesize(&self, cwd: &str, stem: &str) -> Result<Rule, RuleError>
    {
        let target = Artifact::file_target(cwd, &substitute(&self.target_pattern, stem));
        let deps: Vec<Artifact> = self.dep_patterns.iter()
            .map(|pattern| Artifact::file_dep(cwd, &substitute(pattern, stem)))
            .collect();

        Rule::new(vec![target], deps, self.builder.clone(), self.kwargs.clone(), self.name.clone())
    }

    /*  §4.4 allTargets: globs the first dep pattern against `cwd`
        (non-recursive, per System::list_files_in_dir), substitutes each
        matched stem into the target pattern, subtracts `exclude`, and
        sorts for deterministic build order. */
    pub fn all_targets<S: System>(&self, system: &S, cwd: &str) -> Result<Vec<Artifact>, PatternRuleError>
    {
        let first_dep_pattern = self.dep_patterns.first()
            .ok_or(PatternRuleError::NoDeps)?;

        let dep_regex = compile(first_dep_pattern)
            .map_err(|_| PatternRuleError::DepPatternMalformed(first_dep_pattern.clone()))?;

        let mut targets = Vec::new();
        for path in system.list_files_in_dir(cwd)
        {
            let file_name = relative_to(cwd, &path);
            if let Some(captures) = dep_regex.captures(&file_name)
            {
                let stem = &captures[1];
                let target_name = substitute(&self.target_pattern, stem);
                let target = Artifact::file_target(cwd, &target_name);
                if !self.exclude.contains(target.label())
                {
                    targets.push(target);
                }
            }
        }

        targets.sort_by(|a, b| a.label().cmp(b.label()));
        targets.dedup();
        Ok(targets)
    }
}
