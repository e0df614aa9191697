use std::str::from_utf8;
use std::collections::VecDeque;
use std::process::{Command, Output};

#[cfg(test)]
use crate::system::fake::FakeSystem;
#[cfg(test)]
use crate::system::System;

pub struct CommandLineOutput
{
    pub out : String,
    pub err : String,
    pub code : Option<i32>,
    pub success : bool,
}

impl CommandLineOutput
{
    pub fn new() -> CommandLineOutput
    {
        CommandLineOutput
        {
            out : "".to_string(),
            err : "".to_string(),
            code : Some(0),
            success : true,
        }
    }

    #[cfg(test)]
    pub fn error(message : String) -> CommandLineOutput
    {
        CommandLineOutput
        {
            out : "".to_string(),
            err : message,
            code : Some(1),
            success : false,
        }
    }

    pub fn from_output(output : Output) -> CommandLineOutput
    {
        CommandLineOutput
        {
            out : match from_utf8(&output.stdout)
            {
                Ok(text) => text,
                Err(_) => "<non-utf8 data>",
            }.to_string(),

            err : match from_utf8(&output.stderr)
            {
                Ok(text) => text,
                Err(_) => "<non-utf8 data>",
            }.to_string(),

            code : output.status.code(),
            success : output.status.success(),
        }
    }
}

/*  The "injected command runner" spec.md §1 leaves as an external
    collaborator: the engine never calls std::process directly, only
    through this trait, so tests can run a whole build without spawning a
    real subprocess. A Builder's expanded template, already split on
    whitespace into argv form, is handed to `run` verbatim. */
pub trait CommandRunner
{
    fn run(&mut self, command_list: Vec<String>) -> Result<CommandLineOutput, String>;
}

#[derive(Clone)]
pub struct OsCommandRunner
{
}

impl OsCommandRunner
{
    pub fn new() -> OsCommandRunner
    {
        OsCommandRunner{}
    }
}

impl CommandRunner for OsCommandRunner
{
    fn run(&mut self, command_list: Vec<String>) -> Result<CommandLineOutput, String>
    {
        let mut command_queue = VecDeque::from(command_list);
        let command_opt = match command_queue.pop_front()
        {
            Some(first) =>
            {
                let mut command = Command::new(first);
                while let Some(argument) = command_queue.pop_front()
                {
                    command.arg(argument);
                }
                Some(command)
            },
            None => None
        };

        match command_opt
        {
            Some(mut command) =>
            {
                match command.output()
                {
                    Ok(out) => Ok(CommandLineOutput::from_output(out)),
                    Err(why) => Err(why.to_string()),
                }
            },
            None => Ok(CommandLineOutput::new()),
        }
    }
}

/*  A scripted runner for tests: understands a handful of toy commands
    against a FakeSystem rather than touching the real filesystem or
    spawning a real process, mirroring the teacher's own FakeExecutor. */
#[cfg(test)]
#[derive(Clone)]
pub struct FakeCommandRunner
{
    system : FakeSystem,
}

#[cfg(test)]
impl FakeCommandRunner
{
    pub fn new(system: FakeSystem) -> FakeCommandRunner
    {
        FakeCommandRunner { system }
    }
}

#[cfg(test)]
impl CommandRunner for FakeCommandRunner
{
    fn run(&mut self, command_list: Vec<String>) -> Result<CommandLineOutput, String>
    {
        let n = command_list.len();
        if n == 0
        {
            return Ok(CommandLineOutput::new());
        }

        match command_list[0].as_str()
        {
            "error" => Ok(CommandLineOutput::error("command failed".to_string())),

            /*  cp SRC DST */
            "cp" if n == 3 =>
            {
                match self.system.read_to_string(&command_list[1])
                {
                    Ok(content) =>
                    {
                        match self.system.write_str(&command_list[2], &content)
                        {
                            Ok(_) => Ok(CommandLineOutput::new()),
                            Err(error) => Err(error.to_string()),
                        }
                    },
                    Err(error) => Err(error.to_string()),
                }
            },

            /*  cat SRC... DST: concatenates every source into the final argument. */
            "cat" if n >= 2 =>
            {
                let mut output = String::new();
                for path in command_list[1..n-1].iter()
                {
                    match self.system.read_to_string(path)
                    {
                        Ok(content) => output.push_str(&content),
                        Err(error) => return Err(error.to_string()),
                    }
                }

                match self.system.write_str(&command_list[n-1], &output)
                {
                    Ok(_) => Ok(CommandLineOutput::new()),
                    Err(error) => Err(error.to_string()),
                }
            },

            /*  touch TARGET [TARGET...]: creates each target with empty content. */
            "touch" =>
            {
                for path in command_list[1..n].iter()
                {
                    match self.system.write_str(path, "")
                    {
                        Ok(_) => {},
                        Err(error) => return Err(error.to_string()),
                    }
                }
                Ok(CommandLineOutput::new())
            },

            "echo" =>
            {
                Ok(CommandLineOutput
                {
                    out : command_list[1..n].join(" "),
                    err : "".to_string(),
                    code : Some(0),
                    success : true,
                })
            },

            /*  rm TARGET [TARGET...] */
            "rm" =>
            {
                for path in command_list[1..n].iter()
                {
                    match self.system.remove_file(path)
                    {
                        Ok(_) => {},
                        Err(error) => return Err(error.to_string()),
                    }
                }
                Ok(CommandLineOutput::new())
            },

            other => Err(format!("no such fake command: {}", other)),
        }
    }
}
