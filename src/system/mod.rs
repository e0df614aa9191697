use std::io;
use std::fmt;
use std::time::SystemTime;

#[cfg(test)]
pub mod fake;

pub mod real;

/*  A lot of these are only constructed by the fake filesystem. */
#[allow(dead_code)]
pub enum SystemError
{
    NotFound,
    FileInPlaceOfDirectory(String),
    DirectoryInPlaceOfFile(String),
    PathEmpty,
    RemoveNonExistentFile,
    MetadataNotFound,
    ModifiedNotFound,
    Weird,
}

impl fmt::Display for SystemError
{
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result
    {
        match self
        {
            SystemError::NotFound
                => write!(formatter, "No such file or directory"),

            SystemError::FileInPlaceOfDirectory(component)
                => write!(formatter, "Expected directory, found file: {}", component),

            SystemError::DirectoryInPlaceOfFile(component)
                => write!(formatter, "Expected file, found directory: {}", component),

            SystemError::PathEmpty
                => write!(formatter, "Invalid arguments: found empty path"),

            SystemError::RemoveNonExistentFile
                => write!(formatter, "Attempt to remove non-existent file"),

            SystemError::ModifiedNotFound
                => write!(formatter, "Attempt to access modified time for file failed"),

            SystemError::MetadataNotFound
                => write!(formatter, "Attempt to access metadata failed"),

            SystemError::Weird
                => write!(formatter, "Weird error, this happens when internal logic fails in a way the programmer didn't think was possible"),
        }
    }
}

/*  The engine's only window onto the outside world: file IO, mtimes, and
    command execution. RealSystem hits the OS; the test-only fake keeps
    everything in memory so staleness tests can set mtimes by hand. */
pub trait System: Clone + Send + Sync
{
    type File: io::Read + io::Write + fmt::Debug;

    fn open(&self, path: &str) -> Result<Self::File, SystemError>;
    fn create_file(&mut self, path: &str) -> Result<Self::File, SystemError>;
    fn create_dir_all(&mut self, path: &str) -> Result<(), SystemError>;
    fn is_dir(&self, path: &str) -> bool;
    fn is_file(&self, path: &str) -> bool;
    fn remove_file(&mut self, path: &str) -> Result<(), SystemError>;

    fn get_modified(&self, path: &str) -> Result<SystemTime, SystemError>;

    /*  Lists the immediate file children of `dir`, used for single-wildcard
        pattern-rule enumeration. Not recursive. Empty for a directory that
        does not exist. */
    fn list_files_in_dir(&self, dir: &str) -> Vec<String>;
}
