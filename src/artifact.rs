use std::path::{Path, PathBuf, Component};

/*  C1: the tagged value denoting a target or dependency. File artifacts
    carry a path normalized to absolute form at construction time (no
    symlink resolution -- deferred, same as the teacher). Virtual
    artifacts are opaque names with no filesystem representation. */
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Artifact
{
    FileTarget(String),
    FileDep(String),
    VirtualTarget(String),
    VirtualDep(String),
}

/*  Resolution and the DAG don't care whether an artifact arrived as a
    dep or a target -- a rule's FileTarget("a") and another rule's
    FileDep("a") name the same node. `Kind`+name is that shared identity. */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind
{
    File,
    Virtual,
}

fn normalize(cwd: &str, raw: &str) -> String
{
    let joined = if Path::new(raw).is_absolute()
    {
        PathBuf::from(raw)
    }
    else
    {
        Path::new(cwd).join(raw)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components()
    {
        match component
        {
            Component::CurDir => {},
            Component::ParentDir =>
            {
                normalized.pop();
            },
            other => normalized.push(other.as_os_str()),
        }
    }

    let mut text = normalized.to_string_lossy().into_owned();
    while text.len() > 1 && text.ends_with('/')
    {
        text.pop();
    }
    text
}

impl Artifact
{
    pub fn file_target(cwd: &str, raw: &str) -> Artifact
    {
        Artifact::FileTarget(normalize(cwd, raw))
    }

    pub fn file_dep(cwd: &str, raw: &str) -> Artifact
    {
        Artifact::FileDep(normalize(cwd, raw))
    }

    pub fn virtual_target(name: &str) -> Artifact
    {
        Artifact::VirtualTarget(name.to_string())
    }

    pub fn virtual_dep(name: &str) -> Artifact
    {
        Artifact::VirtualDep(name.to_string())
    }

    pub fn is_virtual(&self) -> bool
    {
        matches!(self, Artifact::VirtualTarget(_) | Artifact::VirtualDep(_))
    }

    pub fn is_target(&self) -> bool
    {
        matches!(self, Artifact::FileTarget(_) | Artifact::VirtualTarget(_))
    }

    pub fn kind(&self) -> Kind
    {
        match self
        {
            Artifact::FileTarget(_) | Artifact::FileDep(_) => Kind::File,
            Artifact::VirtualTarget(_) | Artifact::VirtualDep(_) => Kind::Virtual,
        }
    }

    /*  The path (file artifact) or name (virtual artifact) -- what a
        template's $@/$^/$< substitute with. */
    pub fn label(&self) -> &str
    {
        match self
        {
            Artifact::FileTarget(path) | Artifact::FileDep(path) => path,
            Artifact::VirtualTarget(name) | Artifact::VirtualDep(name) => name,
        }
    }

    /*  Identity used for DAG-node memoization and rule/pattern matching:
        target-vs-dep role doesn't matter, only what it names. */
    pub fn resolution_key(&self) -> (Kind, String)
    {
        (self.kind(), self.label().to_string())
    }

    /*  The corresponding Target-role artifact naming the same thing --
        used to turn a dep into the key a rule's `targets` list is
        searched by. */
    pub fn as_target(&self) -> Artifact
    {
        match self
        {
            Artifact::FileTarget(path) | Artifact::FileDep(path) => Artifact::FileTarget(path.clone()),
            Artifact::VirtualTarget(name) | Artifact::VirtualDep(name) => Artifact::VirtualTarget(name.clone()),
        }
    }

    pub fn as_dep(&self) -> Artifact
    {
        match self
        {
            Artifact::FileTarget(path) | Artifact::FileDep(path) => Artifact::FileDep(path.clone()),
            Artifact::VirtualTarget(name) | Artifact::VirtualDep(name) => Artifact::VirtualDep(name.clone()),
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn normalizes_relative_paths_against_cwd()
    {
        let artifact = Artifact::file_target("/proj", "a.txt");
        assert_eq!(artifact.label(), "/proj/a.txt");
    }

    #[test]
    fn strips_trailing_separators()
    {
        let artifact = Artifact::file_target("/proj", "sub/");
        assert_eq!(artifact.label(), "/proj/sub");
    }

    #[test]
    fn resolves_parent_components()
    {
        let artifact = Artifact::file_target("/proj/sub", "../a.txt");
        assert_eq!(artifact.label(), "/proj/a.txt");
    }

    #[test]
    fn virtual_artifacts_are_never_touched_on_disk()
    {
        let artifact = Artifact::virtual_target("init");
        assert!(artifact.is_virtual());
        assert_eq!(artifact.label(), "init");
    }

    #[test]
    fn target_and_dep_share_resolution_key()
    {
        let target = Artifact::file_target("/proj", "a.txt");
        let dep = Artifact::file_dep("/proj", "a.txt");
        assert_eq!(target.resolution_key(), dep.resolution_key());
        assert_ne!(target, dep);
    }
}
