use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};

use rhai::{Array, Dynamic, Engine, EvalAltResult, FnPtr, Map, Position, Scope, AST};

use crate::action::{Builder as EngineBuilder, KwargValue, Kwargs};
use crate::artifact::Artifact;
use crate::context::Context;
use crate::error::EngineError;
use crate::file::read_file_to_string;
use crate::pattern::PatternRule;
use crate::rule::Rule;
use crate::system::System;

/*  §9's host mechanism: a build file is a `.rhai` script. This is the name
    looked for inside a directory entered via `SubReMakeFile`, and the CLI's
    default for the root script (see cli.rs). */
pub const DEFAULT_BUILD_FILE_NAME: &str = "ReMakeFile.rhai";

fn to_rhai_err<E: std::fmt::Display>(error: E) -> Box<EvalAltResult>
{
    Box::new(EvalAltResult::ErrorRuntime(Dynamic::from(error.to_string()), Position::NONE))
}

/*  A handle to a Builder constructed from script: just the real Builder,
    wrapped so it can be passed around as a Rhai value and handed back to
    `Rule`/`PatternRule`. */
#[derive(Clone)]
struct ScriptBuilderHandle(EngineBuilder);

/*  A handle to a VirtualTarget/VirtualDep constructed from script. File
    artifacts never need a handle -- a plain string already identifies
    them, coerced according to position per spec.md §9. */
#[derive(Clone)]
struct ScriptArtifact(Artifact);

/*  A handle to a registered PatternRule, carrying what `all_targets`
    needs to touch the filesystem at query time (spec.md §4.4/§9: this is
    observable, script-evaluation-time filesystem coupling, not a pure
    operation). */
#[derive(Clone)]
struct PatternRuleHandle<S: System>
{
    pattern: PatternRule,
    cwd: String,
    system: S,
}

fn dynamic_to_kwarg(value: &Dynamic) -> KwargValue
{
    if let Ok(b) = value.as_bool()
    {
        return KwargValue::Bool(b);
    }
    if let Ok(i) = value.as_int()
    {
        return KwargValue::Int(i);
    }
    if let Ok(f) = value.as_float()
    {
        return KwargValue::Float(f);
    }
    KwargValue::Str(value.to_string())
}

fn map_to_kwargs(map: &Map) -> Kwargs
{
    let mut kwargs = Kwargs::new();
    for (key, value) in map.iter()
    {
        kwargs.insert(key.to_string(), dynamic_to_kwarg(value));
    }
    kwargs
}

/*  §9's note on normalizing scalar-or-list at the boundary: a single
    string/Artifact or a Rhai array of those, flattened one level. */
fn dynamic_to_artifacts(cwd: &str, value: &Dynamic, as_target: bool) -> Result<Vec<Artifact>, String>
{
    if let Some(array) = value.clone().try_cast::<Array>()
    {
        let mut result = Vec::new();
        for item in array.iter()
        {
            result.extend(dynamic_to_artifacts(cwd, item, as_target)?);
        }
        return Ok(result);
    }

    if let Some(artifact) = value.clone().try_cast::<ScriptArtifact>()
    {
        return Ok(vec![if as_target { artifact.0.as_target() } else { artifact.0.as_dep() }]);
    }

    if let Ok(text) = value.clone().into_string()
    {
        return Ok(vec![if as_target { Artifact::file_target(cwd, &text) } else { Artifact::file_dep(cwd, &text) }]);
    }

    Err(format!("expected a string, Artifact, or array of those, got {}", value.type_name()))
}

fn dynamic_to_pattern_list(value: &Dynamic) -> Result<Vec<String>, String>
{
    if let Some(array) = value.clone().try_cast::<Array>()
    {
        let mut result = Vec::new();
        for item in array.iter()
        {
            result.extend(dynamic_to_pattern_list(item)?);
        }
        return Ok(result);
    }

    if let Ok(text) = value.clone().into_string()
    {
        return Ok(vec![text]);
    }

    Err(format!("expected a pattern string or array of pattern strings, got {}", value.type_name()))
}

fn apply_builder_opts(mut builder: EngineBuilder, opts: &Map) -> EngineBuilder
{
    let mut kwargs = Kwargs::new();
    for (key, value) in opts.iter()
    {
        if key.to_string() == "ephemeral"
        {
            if let Ok(true) = value.as_bool()
            {
                builder = builder.ephemeral();
            }
            continue;
        }
        kwargs.insert(key.to_string(), dynamic_to_kwarg(value));
    }
    builder.with_kwargs(kwargs)
}

fn build_builder(
    action: Dynamic,
    engine_cell: &Arc<OnceLock<Arc<Engine>>>,
    ast_cell: &Arc<OnceLock<Arc<AST>>>,
    opts: &Map,
) -> Result<ScriptBuilderHandle, Box<EvalAltResult>>
{
    let base = if let Ok(text) = action.clone().into_string()
    {
        EngineBuilder::template(&text)
    }
    else if let Some(func) = action.clone().try_cast::<FnPtr>()
    {
        let engine_arc = engine_cell.get().cloned()
            .ok_or_else(|| to_rhai_err("builder action resolved before the script engine was ready"))?;
        let ast_arc = ast_cell.get().cloned()
            .ok_or_else(|| to_rhai_err("builder action resolved before the script AST was ready"))?;
        EngineBuilder::script(engine_arc, ast_arc, func)
    }
    else
    {
        return Err(to_rhai_err(format!("Builder action must be a string or function pointer, got {}", action.type_name())));
    };

    Ok(ScriptBuilderHandle(apply_builder_opts(base, opts)))
}

fn register_builder_api(engine: &mut Engine, engine_cell: Arc<OnceLock<Arc<Engine>>>, ast_cell: Arc<OnceLock<Arc<AST>>>)
{
    engine.register_type_with_name::<ScriptBuilderHandle>("Builder");

    let ec = engine_cell.clone();
    let ac = ast_cell.clone();
    engine.register_fn("Builder", move |action: Dynamic| -> Result<ScriptBuilderHandle, Box<EvalAltResult>> {
        build_builder(action, &ec, &ac, &Map::new())
    });

    let ec2 = engine_cell;
    let ac2 = ast_cell;
    engine.register_fn("Builder", move |action: Dynamic, opts: Map| -> Result<ScriptBuilderHandle, Box<EvalAltResult>> {
        build_builder(action, &ec2, &ac2, &opts)
    });
}

fn register_rule_impl(
    context: &Arc<Mutex<Context>>,
    targets: Dynamic,
    deps: Dynamic,
    builder: EngineBuilder,
    kwargs: Kwargs,
    name: Option<String>,
) -> Result<(), Box<EvalAltResult>>
{
    let mut ctx = context.lock().unwrap();
    let cwd = ctx.cwd.clone();

    let target_artifacts = dynamic_to_artifacts(&cwd, &targets, true).map_err(to_rhai_err)?;
    let dep_artifacts = dynamic_to_artifacts(&cwd, &deps, false).map_err(to_rhai_err)?;
    let rule = Rule::new(target_artifacts, dep_artifacts, builder, kwargs, name).map_err(to_rhai_err)?;

    let shadowed = ctx.register_rule(rule);
    for label in shadowed
    {
        eprintln!("warning: a later rule shadows the earlier rule producing {}", label);
    }

    Ok(())
}

fn register_rule_api(engine: &mut Engine, context: Arc<Mutex<Context>>)
{
    let ctx = context.clone();
    engine.register_fn("Rule", move |targets: Dynamic, deps: Dynamic, builder: ScriptBuilderHandle| -> Result<(), Box<EvalAltResult>> {
        register_rule_impl(&ctx, targets, deps, builder.0, Kwargs::new(), None)
    });

    let ctx2 = context;
    engine.register_fn("Rule", move |targets: Dynamic, deps: Dynamic, builder: ScriptBuilderHandle, opts: Map| -> Result<(), Box<EvalAltResult>> {
        let name = opts.get("name").and_then(|v| v.clone().into_string().ok());
        let kwargs = opts.get("kwargs")
            .and_then(|v| v.clone().try_cast::<Map>())
            .map(|m| map_to_kwargs(&m))
            .unwrap_or_default();
        register_rule_impl(&ctx2, targets, deps, builder.0, kwargs, name)
    });
}

fn register_pattern_impl<S: System + 'static>(
    context: &Arc<Mutex<Context>>,
    system: &S,
    target: Dynamic,
    deps: Dynamic,
    builder: EngineBuilder,
    kwargs: Kwargs,
    name: Option<String>,
    exclude: HashSet<String>,
) -> Result<PatternRuleHandle<S>, Box<EvalAltResult>>
{
    let mut target_patterns = dynamic_to_pattern_list(&target).map_err(to_rhai_err)?;
    if target_patterns.len() != 1
    {
        return Err(to_rhai_err("PatternRule target must be a single pattern string"));
    }
    let target_pattern = target_patterns.remove(0);
    let dep_patterns = dynamic_to_pattern_list(&deps).map_err(to_rhai_err)?;

    let mut ctx = context.lock().unwrap();
    let cwd = ctx.cwd.clone();

    let pattern = PatternRule::new(&cwd, target_pattern, dep_patterns, builder, kwargs, name, exclude).map_err(to_rhai_err)?;
    ctx.register_pattern(pattern.clone());

    Ok(PatternRuleHandle { pattern, cwd, system: system.clone() })
}

fn register_pattern_api<S: System + 'static>(engine: &mut Engine, context: Arc<Mutex<Context>>, system: S)
{
    engine.register_type_with_name::<PatternRuleHandle<S>>("PatternRule");

    engine.register_get("allTargets", |handle: &mut PatternRuleHandle<S>| -> Result<Array, Box<EvalAltResult>> {
        let targets = handle.pattern.all_targets(&handle.system, &handle.cwd).map_err(to_rhai_err)?;
        Ok(targets.into_iter().map(|artifact| Dynamic::from(artifact.label().to_string())).collect())
    });

    let ctx = context.clone();
    let sys = system.clone();
    engine.register_fn("PatternRule", move |target: Dynamic, deps: Dynamic, builder: ScriptBuilderHandle| -> Result<PatternRuleHandle<S>, Box<EvalAltResult>> {
        register_pattern_impl(&ctx, &sys, target, deps, builder.0, Kwargs::new(), None, HashSet::new())
    });

    let ctx2 = context;
    let sys2 = system;
    engine.register_fn("PatternRule", move |target: Dynamic, deps: Dynamic, builder: ScriptBuilderHandle, opts: Map| -> Result<PatternRuleHandle<S>, Box<EvalAltResult>> {
        let name = opts.get("name").and_then(|v| v.clone().into_string().ok());
        let kwargs = opts.get("kwargs")
            .and_then(|v| v.clone().try_cast::<Map>())
            .map(|m| map_to_kwargs(&m))
            .unwrap_or_default();
        let exclude: HashSet<String> = opts.get("exclude")
            .and_then(|v| v.clone().try_cast::<Array>())
            .map(|array| array.into_iter().filter_map(|item| item.into_string().ok()).collect())
            .unwrap_or_default();
        register_pattern_impl(&ctx2, &sys2, target, deps, builder.0, kwargs, name, exclude)
    });
}

fn register_target_api(engine: &mut Engine, context: Arc<Mutex<Context>>)
{
    engine.register_type_with_name::<ScriptArtifact>("Artifact");
    engine.register_fn("VirtualTarget", |name: &str| -> ScriptArtifact { ScriptArtifact(Artifact::virtual_target(name)) });
    engine.register_fn("VirtualDep", |name: &str| -> ScriptArtifact { ScriptArtifact(Artifact::virtual_dep(name)) });

    let ctx = context.clone();
    engine.register_fn("AddTarget", move |value: Dynamic| -> Result<(), Box<EvalAltResult>> {
        let mut ctx = ctx.lock().unwrap();
        let cwd = ctx.cwd.clone();
        let artifacts = dynamic_to_artifacts(&cwd, &value, true).map_err(to_rhai_err)?;
        for artifact in artifacts
        {
            ctx.add_target(artifact);
        }
        Ok(())
    });

    let ctx2 = context;
    engine.register_fn("AddVirtualTarget", move |name: &str| {
        ctx2.lock().unwrap().add_virtual_target(name);
    });
}

/*  §4.8: push a child Context anchored at `cwd/subdir`, evaluate its own
    `ReMakeFile.rhai` there with a fresh Engine (a child inherits nothing,
    per spec.md §4.5/§9), then fold the finished child Context and
    everything *it* pushed in turn into the accumulator the top-level
    caller assembles into the union DAG's context list. */
fn register_subbuild_api<S: System + 'static>(
    engine: &mut Engine,
    system: S,
    context: Arc<Mutex<Context>>,
    descendants: Arc<Mutex<Vec<Context>>>,
)
{
    engine.register_fn("SubReMakeFile", move |subdir: &str| -> Result<(), Box<EvalAltResult>> {
        let child_cwd = context.lock().unwrap().push_subdir(subdir).cwd;
        let child_script_path = format!("{}/{}", child_cwd, DEFAULT_BUILD_FILE_NAME);

        let mut local_descendants = Vec::new();
        let child_context = evaluate_one(&system, &child_cwd, &child_script_path, &mut local_descendants)
            .map_err(|error| to_rhai_err(EngineError::SubBuildFailure
            {
                subdir: subdir.to_string(),
                inner: Box::new(error),
            }))?;

        let mut accumulated = descendants.lock().unwrap();
        accumulated.push(child_context);
        accumulated.append(&mut local_descendants);
        Ok(())
    });
}

/*  Evaluates one `.rhai` build file against a fresh Context anchored at
    `cwd`, returning that Context. Any nested `SubReMakeFile` calls append
    their own finished Contexts (and theirs, recursively) to `descendants`
    in the order they were evaluated. The script Engine is deliberately
    never torn down: a Builder constructed from a script function keeps
    its own `Arc<Engine>`/`Arc<AST>` so the callable can still run later,
    during the build phase, long after this function returns. */
fn evaluate_one<S: System + 'static>(
    system: &S,
    cwd: &str,
    script_path: &str,
    descendants: &mut Vec<Context>,
) -> Result<Context, EngineError>
{
    let context = Arc::new(Mutex::new(Context::new(cwd)));
    let descendants_accum: Arc<Mutex<Vec<Context>>> = Arc::new(Mutex::new(Vec::new()));
    let engine_cell: Arc<OnceLock<Arc<Engine>>> = Arc::new(OnceLock::new());
    let ast_cell: Arc<OnceLock<Arc<AST>>> = Arc::new(OnceLock::new());

    let mut engine = Engine::new();
    register_builder_api(&mut engine, engine_cell.clone(), ast_cell.clone());
    register_rule_api(&mut engine, context.clone());
    register_pattern_api(&mut engine, context.clone(), system.clone());
    register_target_api(&mut engine, context.clone());
    register_subbuild_api(&mut engine, system.clone(), context.clone(), descendants_accum.clone());

    let source = read_file_to_string(system, script_path)
        .map_err(|error| EngineError::ScriptError { path: script_path.to_string(), reason: error.to_string() })?;

    let ast = engine.compile(&source)
        .map_err(|error| EngineError::ScriptError { path: script_path.to_string(), reason: error.to_string() })?;

    let engine_arc = Arc::new(engine);
    let _ = engine_cell.set(engine_arc.clone());
    let ast_arc = Arc::new(ast);
    let _ = ast_cell.set(ast_arc.clone());

    let mut scope = Scope::new();
    engine_arc.run_ast_with_scope(&mut scope, &ast_arc)
        .map_err(|error| EngineError::ScriptError { path: script_path.to_string(), reason: error.to_string() })?;

    let mut own_descendants = descendants_accum.lock().unwrap().clone();
    descendants.append(&mut own_descendants);

    let final_context = context.lock().unwrap().clone();
    Ok(final_context)
}

/*  Public entry point: evaluates `script_path` as the root build file and
    returns the full context list (root first, then every sub-build's
    Context in evaluation order) ready for `resolve::resolve_all`. */
pub fn evaluate_script<S: System + 'static>(system: &S, cwd: &str, script_path: &str) -> Result<Vec<Context>, EngineError>
{
    let mut descendants = Vec::new();
    let root = evaluate_one(system, cwd, script_path, &mut descendants)?;

    let mut contexts = vec![root];
    contexts.append(&mut descendants);
    Ok(contexts)
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::system::fake::FakeSystem;

    fn write_script(system: &mut FakeSystem, path: &str, source: &str)
    {
        system.write_str(path, source).unwrap();
    }

    #[test]
    fn simple_rebuild_via_template_action()
    {
        let mut system = FakeSystem::new();
        system.write_str("/proj/b", "content").unwrap();
        write_script(&mut system, "/proj/ReMakeFile.rhai", r#"
            let b = Builder("cp $< $@");
            Rule("a", "b", b);
            AddTarget("a");
        "#);

        let contexts = evaluate_script(&system, "/proj", "/proj/ReMakeFile.rhai").unwrap();
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].rules.len(), 1);
        assert_eq!(contexts[0].requested, vec![Artifact::file_target("/proj", "a")]);
    }

    #[test]
    fn pattern_rule_all_targets_is_queryable_from_script()
    {
        let mut system = FakeSystem::new();
        system.write_str("/proj/x.foo", "").unwrap();
        system.write_str("/proj/y.foo", "").unwrap();
        write_script(&mut system, "/proj/ReMakeFile.rhai", r#"
            let b = Builder("touch $@");
            let r = PatternRule("*.bar", "*.foo", b);
            AddTarget(r.allTargets);
        "#);

        let contexts = evaluate_script(&system, "/proj", "/proj/ReMakeFile.rhai").unwrap();
        assert_eq!(contexts[0].patterns.len(), 1);
        let mut requested: Vec<String> = contexts[0].requested.iter().map(|a| a.label().to_string()).collect();
        requested.sort();
        assert_eq!(requested, vec!["/proj/x.bar".to_string(), "/proj/y.bar".to_string()]);
    }

    #[test]
    fn virtual_targets_round_trip_through_script()
    {
        let mut system = FakeSystem::new();
        write_script(&mut system, "/proj/ReMakeFile.rhai", r#"
            let b = Builder("echo $<");
            Rule(VirtualTarget("init"), [VirtualDep("zsh"), VirtualDep("nvim")], b);
            AddVirtualTarget("init");
        "#);

        let contexts = evaluate_script(&system, "/proj", "/proj/ReMakeFile.rhai").unwrap();
        assert_eq!(contexts[0].rules.len(), 1);
        assert_eq!(contexts[0].rules[0].deps.len(), 2);
        assert_eq!(contexts[0].requested, vec![Artifact::virtual_target("init")]);
    }

    #[test]
    fn sub_build_folds_child_context_into_descendants()
    {
        let mut system = FakeSystem::new();
        write_script(&mut system, "/proj/ReMakeFile.rhai", r#"
            SubReMakeFile("lib");
        "#);
        write_script(&mut system, "/proj/lib/ReMakeFile.rhai", r#"
            let b = Builder("touch $@");
            Rule("out", [], b);
            AddTarget("out");
        "#);

        let contexts = evaluate_script(&system, "/proj", "/proj/ReMakeFile.rhai").unwrap();
        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts[1].cwd, "/proj/lib");
        assert_eq!(contexts[1].rules.len(), 1);
        assert_eq!(contexts[1].requested, vec![Artifact::file_target("/proj/lib", "out")]);
    }

    #[test]
    fn unresolvable_sub_build_is_wrapped_as_sub_build_failure()
    {
        let mut system = FakeSystem::new();
        write_script(&mut system, "/proj/ReMakeFile.rhai", r#"
            SubReMakeFile("missing");
        "#);

        let result = evaluate_script(&system, "/proj", "/proj/ReMakeFile.rhai");
        assert!(result.is_err());
    }

    #[test]
    fn exclude_removes_a_target_from_pattern_enumeration()
    {
        let mut system = FakeSystem::new();
        system.write_str("/proj/x.foo", "").unwrap();
        system.write_str("/proj/y.foo", "").unwrap();
        write_script(&mut system, "/proj/ReMakeFile.rhai", r#"
            let b = Builder("touch $@");
            let r = PatternRule("*.bar", "*.foo", b, #{ exclude: ["x.bar"] });
            AddTarget(r.allTargets);
        "#);

        let contexts = evaluate_script(&system, "/proj", "/proj/ReMakeFile.rhai").unwrap();
        let requested: Vec<String> = contexts[0].requested.iter().map(|a| a.label().to_string()).collect();
        assert_eq!(requested, vec!["/proj/y.bar".to_string()]);
    }

    #[test]
    fn excluded_target_does_not_resolve_via_the_pattern_it_was_excluded_from()
    {
        use crate::artifact::Artifact;
        use crate::error::EngineError;
        use crate::resolve::resolve_all;

        let mut system = FakeSystem::new();
        system.write_str("/proj/x.foo", "").unwrap();
        write_script(&mut system, "/proj/ReMakeFile.rhai", r#"
            let b = Builder("touch $@");
            PatternRule("*.bar", "*.foo", b, #{ exclude: ["x.bar"] });
            AddTarget("x.bar");
        "#);

        let contexts = evaluate_script(&system, "/proj", "/proj/ReMakeFile.rhai").unwrap();
        let result = resolve_all(&system, &contexts);
        match result
        {
            Err(EngineError::UnresolvedTarget { label }) => assert_eq!(label, Artifact::file_target("/proj", "x.bar").label()),
            other => panic!("expected UnresolvedTarget, got {:?}", other.map(|_| ())),
        }
    }
}
