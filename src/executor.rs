use std::collections::HashSet;

use crate::artifact::Artifact;
use crate::error::EngineError;
use crate::printer::{Outcome, Printer};
use crate::resolve::Dag;
use crate::runner::CommandRunner;
use crate::system::System;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode
{
    Build,
    DryRun,
    Clean,
}

/*  Deps strictly before dependents, roots in the order they were
    requested, within-rule deps in declaration order (§5) -- a single
    DFS with a visited guard gives all three for free, and a node shared
    by two roots is only ever processed once. */
fn post_order(dag: &Dag, roots: &[usize]) -> Vec<usize>
{
    fn visit(dag: &Dag, index: usize, visited: &mut Vec<bool>, order: &mut Vec<usize>)
    {
        if visited[index]
        {
            return;
        }
        visited[index] = true;

        for &dep in dag.nodes[index].deps.iter()
        {
            visit(dag, dep, visited, order);
        }
        order.push(index);
    }

    let mut visited = vec![false; dag.nodes.len()];
    let mut order = Vec::new();
    for &root in roots
    {
        visit(dag, root, &mut visited, &mut order);
    }
    order
}

/*  §4.7 staleness rule for a file-targeted node in Build mode: missing
    target, or a dep whose "effective mtime" is newer than the oldest
    existing target (virtual dep effective mtime always counts as
    newer). `ran` already holds every node that executed earlier in this
    post-order pass, so rule (d) ("a dep ran this build") is just a
    set lookup. */
fn is_stale<S: System>(dag: &Dag, index: usize, system: &S, ran: &HashSet<usize>) -> bool
{
    let node = &dag.nodes[index];

    if node.artifact.is_virtual()
    {
        return true;
    }

    let rule = match &node.rule
    {
        None => return false,
        Some(rule) => rule,
    };

    if node.deps.iter().any(|dep| ran.contains(dep))
    {
        return true;
    }

    let file_targets: Vec<&Artifact> = rule.targets.iter().filter(|t| !t.is_virtual()).collect();

    let missing = file_targets.iter().any(|target| !system.is_file(target.label()));
    if missing
    {
        return true;
    }

    let oldest_target_mtime = file_targets.iter()
        .filter_map(|target| system.get_modified(target.label()).ok())
        .min();

    let oldest_target_mtime = match oldest_target_mtime
    {
        Some(mtime) => mtime,
        None => return true,
    };

    for &dep_index in node.deps.iter()
    {
        let dep_artifact = &dag.nodes[dep_index].artifact;
        if dep_artifact.is_virtual()
        {
            return true;
        }

        match system.get_modified(dep_artifact.label())
        {
            Ok(dep_mtime) if dep_mtime > oldest_target_mtime => return true,
            _ => {},
        }
    }

    false
}

/*  Build mode: executes each stale node's action, aborting the whole
    build on the first failure (§4.7/§7 -- already-completed actions are
    not rolled back). */
pub fn build<S: System>(
    dag: &Dag,
    roots: &[usize],
    system: &mut S,
    runner: &mut dyn CommandRunner,
    printer: &mut dyn Printer,
    verbose: bool,
) -> Result<(), EngineError>
{
    let order = post_order(dag, roots);
    let mut ran: HashSet<usize> = HashSet::new();

    for index in order
    {
        let node = &dag.nodes[index];
        let label = node.artifact.label().to_string();

        let rule = match &node.rule
        {
            None =>
            {
                continue;
            },
            Some(rule) => rule,
        };

        if !is_stale(dag, index, system, &ran)
        {
            printer.report(Outcome::UpToDate, &label);
            continue;
        }

        if verbose
        {
            printer.print(&rule.describe());
        }

        printer.report(Outcome::Building, &label);

        match rule.apply(runner, printer)
        {
            Ok(()) =>
            {
                ran.insert(index);
                printer.report(if node.artifact.is_virtual() { Outcome::AlwaysRuns } else { Outcome::Built }, &label);
            },
            Err(reason) =>
            {
                printer.report(Outcome::BuildFailed, &label);
                return Err(EngineError::BuilderFailure { label, reason });
            },
        }
    }

    Ok(())
}

/*  Dry-run: same traversal and the same staleness predicate, but the
    predicate is fed a simulated `ran` set (a node "would run" if it's
    stale, and that's propagated to dependents exactly as a real run
    would) instead of ever invoking the builder. */
pub fn dry_run<S: System>(
    dag: &Dag,
    roots: &[usize],
    system: &S,
    printer: &mut dyn Printer,
)
{
    let order = post_order(dag, roots);
    let mut would_run: HashSet<usize> = HashSet::new();

    for index in order
    {
        let node = &dag.nodes[index];
        let label = node.artifact.label().to_string();

        let rule = match &node.rule
        {
            None => continue,
            Some(rule) => rule,
        };

        if is_stale(dag, index, system, &would_run)
        {
            would_run.insert(index);
            printer.report(Outcome::WouldBuild, &format!("{}: {}", label, rule.describe()));
        }
        else
        {
            printer.report(Outcome::UpToDate, &label);
        }
    }
}

/*  Clean: delete every existing FileTarget reachable from the roots,
    regardless of staleness. Virtual targets are skipped (no filesystem
    trace to remove). Deletion order is unconstrained by §4.7; failures
    are reported and do not abort the rest of the traversal. */
pub fn clean<S: System>(
    dag: &Dag,
    roots: &[usize],
    system: &mut S,
    printer: &mut dyn Printer,
)
{
    let order = post_order(dag, roots);

    for index in order
    {
        let node = &dag.nodes[index];
        let rule = match &node.rule
        {
            None => continue,
            Some(rule) => rule,
        };

        for target in rule.targets.iter().filter(|t| !t.is_virtual())
        {
            if !system.is_file(target.label())
            {
                continue;
            }

            match system.remove_file(target.label())
            {
                Ok(()) => printer.report(Outcome::Removed, target.label()),
                Err(error) => printer.report(Outcome::RemoveFailed, &format!("{}: {}", target.label(), error)),
            }
        }
    }
}

/*  `--explain TARGET` (SPEC_FULL.md §14): a read-only diagnostic that
    states which rule of the staleness predicate fired for a single node,
    without running or simulating anything else in the graph. */
pub fn explain<S: System>(dag: &Dag, index: usize, system: &S) -> String
{
    let node = &dag.nodes[index];
    let label = node.artifact.label().to_string();

    if node.artifact.is_virtual()
    {
        return format!("{} is virtual: always rebuilds", label);
    }

    let rule = match &node.rule
    {
        None => return format!("{} has no producing rule: treated as an existing source, never rebuilt", label),
        Some(rule) => rule,
    };

    let file_targets: Vec<&Artifact> = rule.targets.iter().filter(|t| !t.is_virtual()).collect();

    for target in file_targets.iter()
    {
        if !system.is_file(target.label())
        {
            return format!("{} is stale: target {} does not exist", label, target.label());
        }
    }

    let oldest_target_mtime = file_targets.iter()
        .filter_map(|target| system.get_modified(target.label()).ok())
        .min();

    let oldest_target_mtime = match oldest_target_mtime
    {
        Some(mtime) => mtime,
        None => return format!("{} is stale: could not read a target's modified time", label),
    };

    for &dep_index in node.deps.iter()
    {
        let dep_artifact = &dag.nodes[dep_index].artifact;
        if dep_artifact.is_virtual()
        {
            return format!("{} is stale: dependency {} is virtual and always reruns", label, dep_artifact.label());
        }

        if let Ok(dep_mtime) = system.get_modified(dep_artifact.label())
        {
            if dep_mtime > oldest_target_mtime
            {
                return format!("{} is stale: dependency {} is newer than {}", label, dep_artifact.label(), label);
            }
        }
    }

    format!("{} is up to date", label)
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::action::{Builder, Kwargs};
    use crate::context::Context;
    use crate::printer::EmptyPrinter;
    use crate::resolve::resolve_all;
    use crate::runner::FakeCommandRunner;
    use crate::rule::Rule;
    use crate::system::fake::FakeSystem;

    fn simple_rebuild_context() -> (FakeSystem, Context)
    {
        let mut system = FakeSystem::new();
        system.write_str("/proj/b", "content").unwrap();

        let mut context = Context::new("/proj");
        let rule = Rule::new(
            vec![Artifact::file_target("/proj", "a")],
            vec![Artifact::file_dep("/proj", "b")],
            Builder::template("cp $< $@"),
            Kwargs::new(),
            None,
        ).unwrap();
        context.register_rule(rule);
        context.add_target(Artifact::file_target("/proj", "a"));

        (system, context)
    }

    #[test]
    fn scenario_1_simple_rebuild_then_idempotent()
    {
        let (mut system, context) = simple_rebuild_context();
        let contexts = vec![context];
        let (dag, roots) = resolve_all(&system, &contexts).unwrap();

        let mut runner = FakeCommandRunner::new(system.clone());
        let mut printer = EmptyPrinter::new();
        build(&dag, &roots, &mut system, &mut runner, &mut printer, false).unwrap();

        assert!(system.is_file("/proj/a"));
        assert!(printer.lines.iter().any(|line| line.contains("Built") && line.contains("/proj/a")));

        let mut printer2 = EmptyPrinter::new();
        let mut runner2 = FakeCommandRunner::new(system.clone());
        build(&dag, &roots, &mut system, &mut runner2, &mut printer2, false).unwrap();
        assert!(printer2.lines.iter().all(|line| !line.contains("Built")));
    }

    #[test]
    fn scenario_4_virtual_target_always_reruns()
    {
        let mut system = FakeSystem::new();
        let mut context = Context::new("/proj");
        let rule = Rule::new(
            vec![Artifact::virtual_target("init")],
            vec![Artifact::virtual_dep("zsh"), Artifact::virtual_dep("nvim")],
            Builder::template("echo $<"),
            Kwargs::new(),
            None,
        ).unwrap();
        context.register_rule(rule);
        context.add_virtual_target("init");

        let contexts = vec![context];
        let (dag, roots) = resolve_all(&system, &contexts).unwrap();

        let mut runner = FakeCommandRunner::new(system.clone());
        let mut printer = EmptyPrinter::new();
        build(&dag, &roots, &mut system, &mut runner, &mut printer, false).unwrap();
        let first_count = printer.lines.iter().filter(|l| l.contains("Virtual") || l.contains("init")).count();

        let mut runner2 = FakeCommandRunner::new(system.clone());
        let mut printer2 = EmptyPrinter::new();
        build(&dag, &roots, &mut system, &mut runner2, &mut printer2, false).unwrap();
        let second_count = printer2.lines.iter().filter(|l| l.contains("Virtual") || l.contains("init")).count();

        assert_eq!(first_count, second_count);
        assert!(first_count > 0);
    }

    #[test]
    fn scenario_5_dry_run_does_not_touch_disk()
    {
        let (system, context) = simple_rebuild_context();
        let contexts = vec![context];
        let (dag, roots) = resolve_all(&system, &contexts).unwrap();

        let mut printer = EmptyPrinter::new();
        dry_run(&dag, &roots, &system, &mut printer);

        assert!(!system.is_file("/proj/a"));
        assert!(printer.lines.iter().any(|line| line.contains("cp /proj/b /proj/a")));
    }

    #[test]
    fn scenario_6_clean_removes_targets_leaves_sources()
    {
        let (mut system, context) = simple_rebuild_context();
        let contexts = vec![context];
        let (dag, roots) = resolve_all(&system, &contexts).unwrap();

        let mut runner = FakeCommandRunner::new(system.clone());
        let mut printer = EmptyPrinter::new();
        build(&dag, &roots, &mut system, &mut runner, &mut printer, false).unwrap();
        assert!(system.is_file("/proj/a"));

        let mut clean_printer = EmptyPrinter::new();
        clean(&dag, &roots, &mut system, &mut clean_printer);

        assert!(!system.is_file("/proj/a"));
        assert!(system.is_file("/proj/b"));
    }

    #[test]
    fn minimal_rebuild_only_touches_transitive_dependents()
    {
        let mut system = FakeSystem::new();
        system.write_str("/proj/leaf", "1").unwrap();

        let mut context = Context::new("/proj");
        context.register_rule(Rule::new(
            vec![Artifact::file_target("/proj", "mid")],
            vec![Artifact::file_dep("/proj", "leaf")],
            Builder::template("cp $< $@"),
            Kwargs::new(),
            None,
        ).unwrap());
        context.register_rule(Rule::new(
            vec![Artifact::file_target("/proj", "top")],
            vec![Artifact::file_dep("/proj", "mid")],
            Builder::template("cp $< $@"),
            Kwargs::new(),
            None,
        ).unwrap());
        context.add_target(Artifact::file_target("/proj", "top"));

        let contexts = vec![context];
        let (dag, roots) = resolve_all(&system, &contexts).unwrap();

        let mut runner = FakeCommandRunner::new(system.clone());
        let mut printer = EmptyPrinter::new();
        build(&dag, &roots, &mut system, &mut runner, &mut printer, false).unwrap();

        system.set_modified("/proj/leaf", 9999);

        let mut runner2 = FakeCommandRunner::new(system.clone());
        let mut printer2 = EmptyPrinter::new();
        build(&dag, &roots, &mut system, &mut runner2, &mut printer2, false).unwrap();

        let built: Vec<&String> = printer2.lines.iter().filter(|l| l.contains("Built")).collect();
        assert_eq!(built.len(), 2);
    }

    #[test]
    fn explain_reports_missing_target_before_a_build()
    {
        let (system, context) = simple_rebuild_context();
        let contexts = vec![context];
        let (dag, roots) = resolve_all(&system, &contexts).unwrap();

        let explanation = explain(&dag, roots[0], &system);
        assert!(explanation.contains("does not exist"));
    }

    #[test]
    fn explain_reports_up_to_date_after_a_build()
    {
        let (mut system, context) = simple_rebuild_context();
        let contexts = vec![context];
        let (dag, roots) = resolve_all(&system, &contexts).unwrap();

        let mut runner = FakeCommandRunner::new(system.clone());
        let mut printer = EmptyPrinter::new();
        build(&dag, &roots, &mut system, &mut runner, &mut printer, false).unwrap();

        let explanation = explain(&dag, roots[0], &system);
        assert!(explanation.contains("up to date"));
    }
}
