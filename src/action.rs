use std::collections::BTreeMap;
use std::sync::Arc;
use rhai::{Engine, AST, FnPtr, Dynamic};

use crate::printer::Printer;
use crate::runner::CommandRunner;

/*  A kwarg value as forwarded to callable builders. Small and tagged
    rather than a single string, since a script-defined builder can pass
    rhai ints/bools/floats straight through. */
#[derive(Debug, Clone, PartialEq)]
pub enum KwargValue
{
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl KwargValue
{
    fn to_dynamic(&self) -> Dynamic
    {
        match self
        {
            KwargValue::Str(s) => Dynamic::from(s.clone()),
            KwargValue::Int(i) => Dynamic::from(*i),
            KwargValue::Float(f) => Dynamic::from(*f),
            KwargValue::Bool(b) => Dynamic::from(*b),
        }
    }
}

pub type Kwargs = BTreeMap<String, KwargValue>;

/*  A native Rust callable builder: the embedding path for consumers who
    construct a Context by hand instead of going through the script
    frontend. Mirrors the three positional inputs spec.md §4.2 describes
    (deps, targets, a console handle) plus kwargs. */
pub type NativeCallable = Arc<
    dyn Fn(&[String], &[String], &Kwargs, &mut dyn Printer) -> Result<(), String> + Send + Sync
>;

/*  A builder registered from a .rhai script: a named function in the
    script's own AST, invoked through the same Engine that compiled it.
    Grounded on asterism-labs-hadron's `gluon` crate (tools/gluon/src/engine.rs),
    which keeps an Arc<Engine> + compiled AST around and calls back into
    script-defined functions the same way. */
#[derive(Clone)]
pub struct ScriptCallable
{
    pub engine: Arc<Engine>,
    pub ast: Arc<AST>,
    pub func: FnPtr,
}

#[derive(Clone)]
pub enum Callable
{
    Native(NativeCallable),
    Script(ScriptCallable),
}

/*  C2: the action a Builder wraps. Tagged once, up front -- no runtime
    type inspection at dispatch time (spec.md §9's "remove the source's
    implicit reliance on runtime type inspection"). */
#[derive(Clone)]
pub enum Action
{
    Template(String),
    Callable(Callable),
}

/*  A reusable action spec plus optional default kwargs. A non-ephemeral
    Builder is expected to be registered exactly once in a Context;
    ephemeral builders (used ad hoc, e.g. by a PatternRule's synthesized
    Rule) leave no registry trace -- Context simply never stores them. */
#[derive(Clone)]
pub struct Builder
{
    pub action: Action,
    pub ephemeral: bool,
    pub kwargs: Kwargs,
}

impl Builder
{
    pub fn template(action: &str) -> Builder
    {
        Builder { action: Action::Template(action.to_string()), ephemeral: false, kwargs: Kwargs::new() }
    }

    pub fn native<F>(callable: F) -> Builder
    where
        F: Fn(&[String], &[String], &Kwargs, &mut dyn Printer) -> Result<(), String> + Send + Sync + 'static,
    {
        Builder { action: Action::Callable(Callable::Native(Arc::new(callable))), ephemeral: false, kwargs: Kwargs::new() }
    }

    pub fn script(engine: Arc<Engine>, ast: Arc<AST>, func: FnPtr) -> Builder
    {
        Builder { action: Action::Callable(Callable::Script(ScriptCallable { engine, ast, func })), ephemeral: false, kwargs: Kwargs::new() }
    }

    pub fn ephemeral(mut self) -> Builder
    {
        self.ephemeral = true;
        self
    }

    pub fn with_kwargs(mut self, kwargs: Kwargs) -> Builder
    {
        self.kwargs = kwargs;
        self
    }

    /*  $@ / $^ / $< substitution. Literal, no shell quoting: missing deps
        expand to empty string, per spec.md §4.2. */
    pub fn expand_template(template: &str, deps: &[String], targets: &[String]) -> String
    {
        let all_targets = targets.join(" ");
        let all_deps = deps.join(" ");
        let first_dep = deps.first().map(|s| s.as_str()).unwrap_or("");

        template
            .replace("$@", &all_targets)
            .replace("$^", &all_deps)
            .replace("$<", first_dep)
    }

    /*  Human-readable description of what running this builder would do,
        used for dry-run output and verbose logging of skipped nodes. */
    pub fn describe(&self, deps: &[String], targets: &[String]) -> String
    {
        match &self.action
        {
            Action::Template(template) => Builder::expand_template(template, deps, targets),
            Action::Callable(Callable::Native(_)) =>
                format!("<native builder>({} -> {})", deps.join(", "), targets.join(", ")),
            Action::Callable(Callable::Script(script)) =>
                format!("{}({} -> {})", script.func.fn_name(), deps.join(", "), targets.join(", ")),
        }
    }

    /*  Executes the action for real (Build mode only -- dry-run never
        calls this, clean never calls this; see executor.rs). Uses this
        Builder's own default kwargs; a Rule carrying its own kwargs
        should go through `run_with_rule_kwargs` instead. */
    pub fn run(
        &self,
        deps: &[String],
        targets: &[String],
        runner: &mut dyn CommandRunner,
        printer: &mut dyn Printer,
    ) -> Result<(), String>
    {
        self.run_with_kwargs(&self.kwargs.clone(), deps, targets, runner, printer)
    }

    /*  Rule-supplied kwargs are layered over the Builder's own defaults,
        rule wins on conflict -- mirrors spec.md §3's "kwargs: extra
        parameters forwarded to callable builders" living on the Rule
        while a Builder keeps its own defaults. */
    pub fn run_with_rule_kwargs(
        &self,
        rule_kwargs: &Kwargs,
        deps: &[String],
        targets: &[String],
        runner: &mut dyn CommandRunner,
        printer: &mut dyn Printer,
    ) -> Result<(), String>
    {
        let mut merged = self.kwargs.clone();
        for (key, value) in rule_kwargs.iter()
        {
            merged.insert(key.clone(), value.clone());
        }
        self.run_with_kwargs(&merged, deps, targets, runner, printer)
    }

    fn run_with_kwargs(
        &self,
        kwargs: &Kwargs,
        deps: &[String],
        targets: &[String],
        runner: &mut dyn CommandRunner,
        printer: &mut dyn Printer,
    ) -> Result<(), String>
    {
        match &self.action
        {
            Action::Template(template) =>
            {
                let expanded = Builder::expand_template(template, deps, targets);
                let argv: Vec<String> = expanded.split_whitespace().map(|s| s.to_string()).collect();
                let output = runner.run(argv)?;

                if !output.out.is_empty()
                {
                    printer.print(&output.out);
                }
                if !output.err.is_empty()
                {
                    printer.error(&output.err);
                }

                if output.success
                {
                    Ok(())
                }
                else
                {
                    Err(match output.code
                    {
                        Some(code) => format!("command exited with status {}: {}", code, expanded),
                        None => format!("command terminated by signal: {}", expanded),
                    })
                }
            },

            Action::Callable(Callable::Native(callable)) =>
                callable(deps, targets, kwargs, printer),

            Action::Callable(Callable::Script(script)) =>
            {
                let deps_dynamic: Dynamic = Dynamic::from(deps.iter().map(|s| Dynamic::from(s.clone())).collect::<Vec<_>>());
                let targets_dynamic: Dynamic = Dynamic::from(targets.iter().map(|s| Dynamic::from(s.clone())).collect::<Vec<_>>());

                let mut kwargs_map = rhai::Map::new();
                for (key, value) in kwargs.iter()
                {
                    kwargs_map.insert(key.clone().into(), value.to_dynamic());
                }

                script.func
                    .call::<Dynamic>(&script.engine, &script.ast, (deps_dynamic, targets_dynamic, Dynamic::from_map(kwargs_map)))
                    .map(|_| ())
                    .map_err(|error| error.to_string())
            },
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn expand_template_roundtrip()
    {
        let deps = vec!["d1".to_string(), "d2".to_string()];
        let targets = vec!["t1".to_string(), "t2".to_string()];
        let expanded = Builder::expand_template("$< $@ $^", &deps, &targets);
        assert_eq!(expanded, "d1 t1 t2 d1 d2");
    }

    #[test]
    fn expand_template_missing_deps_is_empty()
    {
        let deps: Vec<String> = vec![];
        let targets = vec!["t1".to_string()];
        assert_eq!(Builder::expand_template("[$<][$^]", &deps, &targets), "[][]");
    }
}
