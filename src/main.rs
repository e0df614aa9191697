extern crate clap;
extern crate clap_derive;

use clap::Parser;

use crate::artifact::Artifact;
use crate::cli::CommandLineParser;
use crate::context::Context;
use crate::error::EngineError;
use crate::executor::Mode;
use crate::printer::StandardPrinter;
use crate::resolve::Resolver;
use crate::runner::OsCommandRunner;
use crate::system::real::RealSystem;
use crate::system::System;

mod action;
mod artifact;
mod cli;
mod context;
mod error;
mod executor;
mod file;
mod pattern;
mod printer;
mod resolve;
mod rule;
mod runner;
mod script;
mod system;

/*  A positional TARGET on the command line names either a file or a
    virtual target; disambiguate by checking whether any registered rule
    already produces a VirtualTarget of that exact name, else assume a
    file path relative to the root context's cwd. */
fn artifact_for_target_arg(contexts: &[Context], name: &str) -> Artifact
{
    let root_cwd = &contexts[0].cwd;

    let names_a_virtual_target = contexts.iter().any(|context| {
        context.rules.iter().any(|rule| rule.targets.iter().any(|target| {
            target.is_virtual() && target.label() == name
        }))
    });

    if names_a_virtual_target
    {
        Artifact::virtual_target(name)
    }
    else
    {
        Artifact::file_target(root_cwd, name)
    }
}

fn run() -> Result<(), EngineError>
{
    let command_line = CommandLineParser::parse();
    let mut system = RealSystem::new();
    let _ = system.create_dir_all(&command_line.directory);

    let contexts = script::evaluate_script(&system, ".", &command_line.file)?;

    let mut resolver = Resolver::new(&system, &contexts);

    let roots = match &command_line.target
    {
        Some(name) =>
        {
            let artifact = artifact_for_target_arg(&contexts, name);
            vec![resolver.resolve(0, &artifact)?]
        },
        None =>
        {
            let mut roots = Vec::new();
            for (registry_id, context) in contexts.iter().enumerate()
            {
                for artifact in context.requested.iter()
                {
                    roots.push(resolver.resolve(registry_id, artifact)?);
                }
            }
            roots
        },
    };

    let explain_artifact = command_line.explain.as_ref().map(|name| artifact_for_target_arg(&contexts, name));
    let explain_index = match &explain_artifact
    {
        Some(artifact) => Some(resolver.resolve(0, artifact)?),
        None => None,
    };

    let dag = resolver.into_dag();

    if let Some(index) = explain_index
    {
        println!("{}", executor::explain(&dag, index, &system));
        return Ok(());
    }

    let mode = if command_line.clean { Mode::Clean } else if command_line.dry_run { Mode::DryRun } else { Mode::Build };
    let mut printer = StandardPrinter::new();

    match mode
    {
        Mode::Clean =>
        {
            executor::clean(&dag, &roots, &mut system, &mut printer);
            Ok(())
        },
        Mode::DryRun =>
        {
            executor::dry_run(&dag, &roots, &system, &mut printer);
            Ok(())
        },
        Mode::Build =>
        {
            let mut runner = OsCommandRunner::new();
            executor::build(&dag, &roots, &mut system, &mut runner, &mut printer, command_line.verbose)
        },
    }
}

fn main()
{
    match run()
    {
        Ok(()) => {},
        Err(error) =>
        {
            eprintln!("{}", error);
            std::process::exit(1);
        },
    }
}
