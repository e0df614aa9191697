use std::collections::HashMap;

use crate::artifact::{Artifact, Kind};
use crate::context::Context;
use crate::error::EngineError;
use crate::rule::Rule;
use crate::system::System;

/*  A node in the union DAG (C6/C8): one per distinct (registry, artifact
    identity). `rule` is None for a leaf source (an existing FileDep with
    no producing rule) -- it has no action and is never stale. */
pub struct ResolvedNode
{
    pub artifact: Artifact,
    pub registry_id: usize,
    pub rule: Option<Rule>,
    pub deps: Vec<usize>,
}

pub struct Dag
{
    pub nodes: Vec<ResolvedNode>,
}

type MemoKey = (usize, Kind, String);

pub struct Resolver<'a, S: System>
{
    system: &'a S,
    contexts: &'a [Context],
    memo: HashMap<MemoKey, usize>,
    stack: Vec<MemoKey>,
    nodes: Vec<ResolvedNode>,
}

impl<'a, S: System> Resolver<'a, S>
{
    pub fn new(system: &'a S, contexts: &'a [Context]) -> Resolver<'a, S>
    {
        Resolver { system, contexts, memo: HashMap::new(), stack: Vec::new(), nodes: Vec::new() }
    }

    fn memo_key(registry_id: usize, artifact: &Artifact) -> MemoKey
    {
        let (kind, label) = artifact.resolution_key();
        (registry_id, kind, label)
    }

    /*  §4.6 algorithm. `artifact` may arrive in either target or dep
        role; rule/pattern lookup always happens by its target-role
        identity (a dep resolving against the rule that produces it). */
    pub fn resolve(&mut self, registry_id: usize, artifact: &Artifact) -> Result<usize, EngineError>
    {
        let key = Self::memo_key(registry_id, artifact);

        if let Some(&index) = self.memo.get(&key)
        {
            return Ok(index);
        }

        if self.stack.contains(&key)
        {
            let mut trail: Vec<String> = self.stack.iter().map(|(_, _, label)| label.clone()).collect();
            trail.push(key.2.clone());
            return Err(EngineError::DependencyCycle { label: key.2.clone(), stack: trail });
        }

        self.stack.push(key.clone());
        let result = self.resolve_uncached(registry_id, artifact);
        self.stack.pop();

        let index = result?;
        self.memo.insert(key, index);
        Ok(index)
    }

    fn resolve_uncached(&mut self, registry_id: usize, artifact: &Artifact) -> Result<usize, EngineError>
    {
        let context = &self.contexts[registry_id];
        let target_form = artifact.as_target();

        let named_match = context.rules.iter()
            .find(|rule| rule.produces(&target_form))
            .cloned();

        let rule = match named_match
        {
            Some(rule) => Some(rule),
            None =>
            {
                let pattern_match = context.patterns.iter()
                    .find_map(|pattern| pattern.matches(&context.cwd, &target_form).map(|stem| (pattern, stem)));

                match pattern_match
                {
                    Some((pattern, stem)) =>
                    {
                        let synthesized = pattern.synthesize(&context.cwd, &stem)
                            .map_err(|error| EngineError::PatternMalformed
                            {
                                pattern: pattern.target_pattern.clone(),
                                reason: error.to_string(),
                            })?;
                        Some(synthesized)
                    },
                    None => None,
                }
            },
        };

        let rule = match rule
        {
            Some(rule) => rule,
            None =>
            {
                /*  §4.8: a parent references a child-produced file only by
                    the artifact it names, never by the child's Rule --
                    so before falling back to "existing source or error",
                    check whether some other registry in this build
                    produces it and, if so, let that registry's own
                    resolution own the node. This is what makes the union
                    DAG's post-order pass actually wait on the sub-build's
                    action instead of racing it. */
                if !artifact.is_virtual()
                {
                    if let Some(other_id) = self.find_cross_registry_producer(registry_id, &target_form)
                    {
                        return self.resolve(other_id, artifact);
                    }
                }

                /*  An unproduced virtual artifact is still a legal leaf --
                    §4.7 treats a virtual dep's effective mtime as always
                    newer than any file, which presumes it's a node, not
                    an error. Only an unproduced *file* dep that doesn't
                    exist on disk is actually unresolved. */
                if artifact.is_virtual() || self.system.is_file(artifact.label())
                {
                    let node = ResolvedNode
                    {
                        artifact: target_form,
                        registry_id,
                        rule: None,
                        deps: Vec::new(),
                    };
                    let index = self.nodes.len();
                    self.nodes.push(node);
                    return Ok(index);
                }
                else
                {
                    return Err(EngineError::UnresolvedTarget { label: artifact.label().to_string() });
                }
            },
        };

        let mut dep_indices = Vec::with_capacity(rule.deps.len());
        for dep in rule.deps.iter()
        {
            dep_indices.push(self.resolve(registry_id, dep)?);
        }

        let node = ResolvedNode { artifact: target_form, registry_id, rule: Some(rule), deps: dep_indices };
        let index = self.nodes.len();
        self.nodes.push(node);
        Ok(index)
    }

    fn find_cross_registry_producer(&self, own_registry_id: usize, target_form: &Artifact) -> Option<usize>
    {
        self.contexts.iter().enumerate()
            .find(|(other_id, other_context)| {
                *other_id != own_registry_id
                    && (other_context.rules.iter().any(|rule| rule.produces(target_form))
                        || other_context.patterns.iter().any(|pattern| pattern.matches(&other_context.cwd, target_form).is_some()))
            })
            .map(|(other_id, _)| other_id)
    }

    pub fn into_dag(self) -> Dag
    {
        Dag { nodes: self.nodes }
    }
}

/*  Resolves every requested target across every context (parent first,
    then children in the order C8 evaluated them), in their own
    registration order, returning the union DAG plus the root node index
    per request -- this is the "single post-order pass across the union
    DAG" spec.md §4.8 requires. */
pub fn resolve_all<S: System>(
    system: &S,
    contexts: &[Context],
) -> Result<(Dag, Vec<usize>), EngineError>
{
    let mut resolver = Resolver::new(system, contexts);
    let mut roots = Vec::new();

    for (registry_id, context) in contexts.iter().enumerate()
    {
        for artifact in context.requested.iter()
        {
            roots.push(resolver.resolve(registry_id, artifact)?);
        }
    }

    Ok((resolver.into_dag(), roots))
}
