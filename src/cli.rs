use clap_derive::Parser;

/*  §12's CLI surface. Flat rather than the teacher's subcommand-per-verb
    layout (Build/Run/Clean/Serve/List/Hash): this engine has exactly one
    verb, "resolve and execute a build file", and -n/-c pick the mode the
    same way the teacher's own BuildConfig picks a target. */
#[derive(Parser)]
#[command(version = "0.1.0",
    about = "A declarative, incremental build engine in the Makefile lineage",
    long_about = "Evaluates a build script and builds, dry-runs, or cleans the targets it names.
If no TARGET is given, builds everything the script itself requested via
AddTarget/AddVirtualTarget.")]
pub struct CommandLineParser
{
    #[arg(index=1, value_name = "TARGET", help =
"Build only this target (and its dependencies) instead of everything the
build file requested.")]
    pub target: Option<String>,

    #[arg(short='f', long="file", default_value="ReMakeFile.rhai", value_name = "BUILD_FILE", help =
"The root build script to evaluate.")]
    pub file: String,

    #[arg(short, long, help = "Print each node's expanded action as it runs.")]
    pub verbose: bool,

    #[arg(short='n', long="dry-run", help =
"Report what would build without running anything or touching disk.")]
    pub dry_run: bool,

    #[arg(short, long, help = "Remove every target reachable from the requested set.")]
    pub clean: bool,

    #[arg(short, long, default_value=".remake", value_name = "DIRECTORY", help =
"Scratch directory reserved for future engine-owned state.")]
    pub directory: String,

    #[arg(long, value_name = "TARGET", help =
"Print why TARGET would or wouldn't rebuild, without running anything.")]
    pub explain: Option<String>,
}
